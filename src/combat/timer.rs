//! Advisory turn timer
//!
//! Tracks how long the current creature has been deciding. The timer never
//! advances the turn itself: an expired status is a hint the caller turns
//! into an explicit `next_turn()`.

use std::time::{Duration, Instant};

use serde::Serialize;

/// A running per-turn deadline
#[derive(Debug, Clone)]
pub struct TurnTimer {
    /// Creature whose turn is being timed
    pub creature_id: String,
    /// When the turn started
    pub started: Instant,
    /// How long the turn may last
    pub limit: Duration,
}

impl TurnTimer {
    pub fn start(creature_id: &str, limit: Duration, now: Instant) -> Self {
        Self {
            creature_id: creature_id.to_string(),
            started: now,
            limit,
        }
    }

    /// Check if the turn has run out
    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.limit
    }

    /// Time remaining until expiry (zero if already due)
    pub fn time_remaining(&self, now: Instant) -> Duration {
        self.limit
            .saturating_sub(now.saturating_duration_since(self.started))
    }

    pub fn status(&self, now: Instant) -> TurnTimerStatus {
        if self.is_due(now) {
            TurnTimerStatus::Expired {
                creature_id: self.creature_id.clone(),
                overdue: now.saturating_duration_since(self.started) - self.limit,
            }
        } else {
            TurnTimerStatus::Running {
                creature_id: self.creature_id.clone(),
                remaining: self.time_remaining(now),
            }
        }
    }
}

/// What the turn timer reports on a tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TurnTimerStatus {
    /// No timer configured, or no combat
    Disabled,
    Running {
        creature_id: String,
        remaining: Duration,
    },
    Expired {
        creature_id: String,
        overdue: Duration,
    },
}
