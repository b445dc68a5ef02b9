//! Death saving throws
//!
//! A character at 0 HP rolls a d20 on each of its turns:
//! - 20: regains 1 HP and wakes up, counters reset
//! - 10-19: one success
//! - 2-9: one failure
//! - 1: two failures
//!
//! Three successes stabilize, three failures kill. Damage taken at 0 HP adds
//! failures directly and knocks a stable creature back into dying, without
//! zeroing the failures it already has.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::creature::Creature;
use super::dice::DiceRoller;

/// Successes or failures needed to end the ladder
pub const DEATH_SAVE_LIMIT: u8 = 3;

/// Lowest d20 result that counts as a success
pub const DEATH_SAVE_DC: u32 = 10;

/// Death save counters for one creature
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeathSaveState {
    pub successes: u8,
    pub failures: u8,
    pub is_stabilized: bool,
}

impl DeathSaveState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The third success stabilizes and freezes the counters at 3/0
    fn add_success(&mut self) {
        self.successes = (self.successes + 1).min(DEATH_SAVE_LIMIT);
        if self.successes == DEATH_SAVE_LIMIT {
            self.failures = 0;
            self.is_stabilized = true;
        }
    }

    fn add_failures(&mut self, count: u8) {
        self.failures = (self.failures + count).min(DEATH_SAVE_LIMIT);
    }

    pub fn is_fatal(&self) -> bool {
        self.failures >= DEATH_SAVE_LIMIT
    }
}

/// What a death save (or a failure from damage) did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeathSaveOutcome {
    pub creature_id: String,
    /// The d20 result; 0 when nothing was rolled
    pub roll: u32,
    pub successes: u8,
    pub failures: u8,
    pub stabilized: bool,
    /// Natural 20: back up with 1 HP
    pub regained_consciousness: bool,
    pub died: bool,
}

impl DeathSaveOutcome {
    fn snapshot(creature: &Creature, roll: u32) -> Self {
        Self {
            creature_id: creature.id.clone(),
            roll,
            successes: creature.death_saves.successes,
            failures: creature.death_saves.failures,
            stabilized: creature.death_saves.is_stabilized,
            regained_consciousness: false,
            died: false,
        }
    }
}

/// Roll a death save for a dying creature.
///
/// Creatures that are not dying (conscious, stable, dead) are left alone and
/// get an outcome with roll 0.
pub fn roll_death_save(creature: &mut Creature, roller: &mut dyn DiceRoller) -> DeathSaveOutcome {
    if !creature.is_dying() {
        debug!("{} is not dying, skipping death save", creature.id);
        return DeathSaveOutcome::snapshot(creature, 0);
    }

    let roll = roller.d20();
    match roll {
        20 => {
            creature.death_saves.reset();
            creature.hit_points = 1.min(creature.max_hit_points);
            creature.regain_consciousness();
            info!("{} rolls a natural 20 and regains consciousness", creature.id);
            let mut outcome = DeathSaveOutcome::snapshot(creature, roll);
            outcome.regained_consciousness = true;
            return outcome;
        }
        1 => creature.death_saves.add_failures(2),
        r if r >= DEATH_SAVE_DC => creature.death_saves.add_success(),
        _ => creature.death_saves.add_failures(1),
    }

    let died = settle_failures(creature);
    if creature.death_saves.is_stabilized {
        info!("{} is stable", creature.id);
    }

    let mut outcome = DeathSaveOutcome::snapshot(creature, roll);
    outcome.died = died;
    outcome
}

/// Add failures for damage taken while at 0 HP: one for a normal hit, two
/// for a critical. Clears stabilization and restarts the success count.
pub fn add_death_save_failure(creature: &mut Creature, is_critical: bool) -> DeathSaveOutcome {
    if creature.is_dead() || creature.hit_points > 0 {
        return DeathSaveOutcome::snapshot(creature, 0);
    }

    creature.death_saves.is_stabilized = false;
    creature.death_saves.successes = 0;
    creature
        .death_saves
        .add_failures(if is_critical { 2 } else { 1 });

    let died = settle_failures(creature);
    let mut outcome = DeathSaveOutcome::snapshot(creature, 0);
    outcome.died = died;
    outcome
}

/// Latch death once failures reach the limit
fn settle_failures(creature: &mut Creature) -> bool {
    if creature.death_saves.is_fatal() && !creature.dead {
        creature.dead = true;
        info!("{} has died", creature.id);
        return true;
    }
    false
}
