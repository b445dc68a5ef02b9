//! Combat event stream
//!
//! The engine pushes immutable events to observers over unbounded channels.
//! Sending never blocks and never calls back into the session; observers
//! whose receiver is gone are dropped on the next send. Every envelope carries
//! a per-session sequence number so downstream consumers can discard
//! redelivered duplicates.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::attack::AttackResult;
use super::conditions::Condition;
use super::damage::DamageType;

/// One slot in the initiative order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiativeEntry {
    pub creature_id: String,
    /// d20 + dexterity modifier
    pub total: i32,
    /// The raw d20, used to break ties
    pub tie_break: u32,
}

/// Something that happened at the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CombatEvent {
    Attack {
        attacker_id: String,
        target_id: String,
        result: AttackResult,
    },
    Damage {
        target_id: String,
        amount: u32,
        damage_type: DamageType,
        is_critical: bool,
        was_resisted: bool,
        was_vulnerable: bool,
        was_immune: bool,
    },
    Healing {
        target_id: String,
        amount: u32,
        new_hp: u32,
    },
    Death {
        creature_id: String,
        was_instant_death: bool,
    },
    Initiative {
        order: Vec<InitiativeEntry>,
    },
    Turn {
        creature_id: String,
        round: u32,
    },
    /// A new round begins; precedes that round's first turn event
    Round {
        round: u32,
    },
    DeathSave {
        creature_id: String,
        roll: u32,
        successes: u8,
        failures: u8,
        stabilized: bool,
    },
    Condition {
        creature_id: String,
        condition: Condition,
        applied: bool,
    },
    CombatEnded {
        rounds: u32,
    },
}

/// An event as delivered to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub session_id: Uuid,
    /// Strictly increasing within a session, starting at 1
    pub sequence: u64,
    pub at: DateTime<Utc>,
    pub event: CombatEvent,
}

/// Envelopes kept in memory per session unless configured otherwise
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// Fan-out of events to observers, plus a bounded window of recent history.
///
/// Only the newest `history_limit` envelopes are kept; anything that needs
/// the full record should subscribe.
#[derive(Debug)]
pub struct EventBus {
    session_id: Uuid,
    next_sequence: u64,
    observers: Vec<mpsc::UnboundedSender<EventEnvelope>>,
    history: VecDeque<EventEnvelope>,
    history_limit: usize,
}

impl EventBus {
    pub fn new(session_id: Uuid) -> Self {
        Self::with_history_limit(session_id, DEFAULT_HISTORY_LIMIT)
    }

    /// A limit of 0 keeps no history at all
    pub fn with_history_limit(session_id: Uuid, history_limit: usize) -> Self {
        Self {
            session_id,
            next_sequence: 1,
            observers: Vec::new(),
            history: VecDeque::new(),
            history_limit,
        }
    }

    pub fn set_history_limit(&mut self, history_limit: usize) {
        self.history_limit = history_limit;
        self.trim_history();
    }

    fn trim_history(&mut self) {
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }

    /// Register a new observer. It sees events emitted from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<EventEnvelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: CombatEvent) -> u64 {
        let envelope = EventEnvelope {
            session_id: self.session_id,
            sequence: self.next_sequence,
            at: Utc::now(),
            event,
        };
        self.next_sequence += 1;

        let before = self.observers.len();
        self.observers.retain(|tx| tx.send(envelope.clone()).is_ok());
        if self.observers.len() != before {
            debug!(
                "dropped {} closed observers from session {}",
                before - self.observers.len(),
                self.session_id
            );
        }

        let sequence = envelope.sequence;
        self.history.push_back(envelope);
        self.trim_history();
        sequence
    }

    /// Recent envelopes, oldest first
    pub fn history(&self) -> &VecDeque<EventEnvelope> {
        &self.history
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}
