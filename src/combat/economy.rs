//! Per-turn action economy
//!
//! Each creature gets one action, one bonus action, one reaction, one free
//! object interaction, and movement up to its speed. Everything refreshes at
//! the start of that creature's own turn, reactions included.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::CombatError;

/// Spendable per-turn resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Action,
    BonusAction,
    Reaction,
    ObjectInteraction,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionKind::Action => "action",
            ActionKind::BonusAction => "bonus action",
            ActionKind::Reaction => "reaction",
            ActionKind::ObjectInteraction => "object interaction",
        };
        write!(f, "{}", s)
    }
}

/// One creature's resources for the current turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEconomy {
    pub has_action: bool,
    pub has_bonus_action: bool,
    pub has_reaction: bool,
    pub has_used_object: bool,
    /// Feet moved this turn
    pub movement_used: u32,
    /// Feet available this turn, before condition limits
    pub movement_max: u32,
}

impl ActionEconomy {
    /// Fresh resources for a turn with the given movement
    pub fn new(movement_max: u32) -> Self {
        Self {
            has_action: true,
            has_bonus_action: true,
            has_reaction: true,
            has_used_object: false,
            movement_used: 0,
            movement_max,
        }
    }

    pub fn has(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Action => self.has_action,
            ActionKind::BonusAction => self.has_bonus_action,
            ActionKind::Reaction => self.has_reaction,
            ActionKind::ObjectInteraction => !self.has_used_object,
        }
    }

    /// Spend a resource, or reject without changing anything
    pub fn spend(&mut self, kind: ActionKind) -> Result<(), CombatError> {
        if !self.has(kind) {
            return Err(CombatError::ActionSpent(kind));
        }
        match kind {
            ActionKind::Action => self.has_action = false,
            ActionKind::BonusAction => self.has_bonus_action = false,
            ActionKind::Reaction => self.has_reaction = false,
            ActionKind::ObjectInteraction => self.has_used_object = true,
        }
        Ok(())
    }

    /// Movement left, given a cap from the creature's current conditions
    pub fn remaining_movement(&self, cap: u32) -> u32 {
        self.movement_max.min(cap).saturating_sub(self.movement_used)
    }

    /// Spend movement, returning what is left
    pub fn spend_movement(&mut self, feet: u32, cap: u32) -> Result<u32, CombatError> {
        let remaining = self.remaining_movement(cap);
        if feet > remaining {
            return Err(CombatError::InsufficientMovement {
                needed: feet,
                remaining,
            });
        }
        self.movement_used += feet;
        Ok(remaining - feet)
    }

    /// Dash: extra movement equal to speed for the rest of the turn
    pub fn add_movement(&mut self, feet: u32) {
        self.movement_max += feet;
    }
}

/// Action economy ledgers for every creature in the encounter
#[derive(Debug, Clone, Default)]
pub struct ActionEconomyTracker {
    ledgers: HashMap<String, ActionEconomy>,
}

impl ActionEconomyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start-of-turn reset
    pub fn reset(&mut self, creature_id: &str, speed: u32) {
        self.ledgers
            .insert(creature_id.to_string(), ActionEconomy::new(speed));
    }

    pub fn get(&self, creature_id: &str) -> Option<&ActionEconomy> {
        self.ledgers.get(creature_id)
    }

    pub fn get_mut(&mut self, creature_id: &str) -> Option<&mut ActionEconomy> {
        self.ledgers.get_mut(creature_id)
    }

    pub fn remove(&mut self, creature_id: &str) {
        self.ledgers.remove(creature_id);
    }

    pub fn clear(&mut self) {
        self.ledgers.clear();
    }
}
