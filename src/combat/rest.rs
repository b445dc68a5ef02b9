//! Short and long rest recovery

use serde::{Deserialize, Serialize};

use super::creature::{Ability, Creature};
use super::dice::DiceRoller;

/// What a rest did for one creature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestOutcome {
    pub creature_id: String,
    pub hit_points_restored: u32,
    pub hit_dice_spent: u32,
    pub hit_dice_regained: u32,
    pub exhaustion: u8,
}

impl RestOutcome {
    fn new(creature: &Creature) -> Self {
        Self {
            creature_id: creature.id.clone(),
            hit_points_restored: 0,
            hit_dice_spent: 0,
            hit_dice_regained: 0,
            exhaustion: creature.conditions.exhaustion(),
        }
    }
}

/// Clear death-save counters. A stable creature still at 0 HP stays stable.
fn clear_death_saves(creature: &mut Creature) {
    let was_stable = creature.death_saves.is_stabilized;
    creature.death_saves.reset();
    if creature.hit_points == 0 && was_stable {
        creature.death_saves.is_stabilized = true;
    }
}

/// Spend hit dice to heal. Each die adds the constitution modifier and is
/// floored at 0 on its own, so a bad roll never subtracts from the total.
/// Death-save counters are cleared for every creature, the dead included;
/// the dead latch is what keeps them dead.
pub fn short_rest(
    creature: &mut Creature,
    hit_dice: u32,
    roller: &mut dyn DiceRoller,
) -> RestOutcome {
    let mut outcome = RestOutcome::new(creature);
    if creature.is_dead() {
        creature.death_saves.reset();
        return outcome;
    }

    let spend = hit_dice.min(creature.hit_dice_remaining);
    let con = creature.abilities.get(Ability::Constitution);
    let healing: u32 = (0..spend)
        .map(|_| (roller.roll_die(creature.hit_die) as i32 + con).max(0) as u32)
        .sum();

    creature.hit_dice_remaining -= spend;
    outcome.hit_dice_spent = spend;
    outcome.hit_points_restored = creature.restore_hit_points(healing);
    clear_death_saves(creature);
    if creature.hit_points > 0 {
        creature.regain_consciousness();
    }
    outcome
}

/// Full recovery: hit points to max, death saves cleared, half the hit dice
/// back (at least one), temporary hit points gone, and one exhaustion level
/// removed. Transient encounter markers are cleared by the session.
pub fn long_rest(creature: &mut Creature) -> RestOutcome {
    let mut outcome = RestOutcome::new(creature);
    if creature.is_dead() {
        creature.death_saves.reset();
        return outcome;
    }

    outcome.hit_points_restored = creature.restore_hit_points(creature.max_hit_points);
    creature.temporary_hit_points = 0;
    creature.death_saves.reset();
    creature.regain_consciousness();

    let regain = (creature.hit_dice_total / 2).max(1);
    let before = creature.hit_dice_remaining;
    creature.hit_dice_remaining = (before + regain).min(creature.hit_dice_total);
    outcome.hit_dice_regained = creature.hit_dice_remaining - before;

    outcome.exhaustion = creature.conditions.reduce_exhaustion();
    outcome
}
