//! Attack roll resolution
//!
//! Gathers every source of advantage and disadvantage, rolls the d20, and
//! compares against armor class. A natural 20 always hits and crits, a
//! natural 1 always misses, and a total equal to AC hits.

use serde::{Deserialize, Serialize};

use super::conditions::{effects_of, exhaustion_effects, Condition};
use super::creature::{Creature, FEET_PER_SQUARE};
use super::dice::{D20Roll, DiceRoller, RollMode};
use super::trackers::EncounterTrackers;

/// Caller-declared roll modifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttackModifiers {
    pub advantage: bool,
    pub disadvantage: bool,
}

impl AttackModifiers {
    pub fn advantage() -> Self {
        Self {
            advantage: true,
            disadvantage: false,
        }
    }

    pub fn disadvantage() -> Self {
        Self {
            advantage: false,
            disadvantage: true,
        }
    }
}

/// Why an attack roll gained advantage or disadvantage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RollInfluence {
    Declared,
    AttackerCondition(Condition),
    TargetCondition(Condition),
    Exhaustion,
    TargetDodging,
    AttackerHidden,
    Help,
}

/// Every advantage and disadvantage source for one attack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollSources {
    pub advantage: Vec<RollInfluence>,
    pub disadvantage: Vec<RollInfluence>,
}

impl RollSources {
    /// Any number of advantages and disadvantages cancel to a straight roll
    pub fn mode(&self) -> RollMode {
        RollMode::from_flags(!self.advantage.is_empty(), !self.disadvantage.is_empty())
    }
}

/// Outcome of an attack roll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackResult {
    pub attacker_id: String,
    pub target_id: String,
    /// The d20 that counted
    pub roll: u32,
    /// Both dice when rolled with advantage or disadvantage
    pub rolls: Vec<u32>,
    pub mode: RollMode,
    pub attack_bonus: i32,
    pub total: i32,
    pub target_ac: i32,
    pub hits: bool,
    pub is_critical: bool,
    pub is_fumble: bool,
    pub advantage_sources: Vec<RollInfluence>,
    pub disadvantage_sources: Vec<RollInfluence>,
    /// A help grant was spent on this roll
    pub help_used: bool,
}

/// Within 5 feet. Unknown positions count as adjacent.
fn is_adjacent(attacker: &Creature, target: &Creature) -> bool {
    attacker
        .distance_to(target)
        .is_none_or(|d| d <= FEET_PER_SQUARE)
}

/// Collect advantage and disadvantage sources for an attack
pub fn roll_sources(
    attacker: &Creature,
    target: &Creature,
    modifiers: AttackModifiers,
    trackers: &EncounterTrackers,
) -> RollSources {
    let mut sources = RollSources::default();

    if modifiers.advantage {
        sources.advantage.push(RollInfluence::Declared);
    }
    if modifiers.disadvantage {
        sources.disadvantage.push(RollInfluence::Declared);
    }

    for condition in attacker.conditions.tags() {
        let effects = effects_of(condition);
        if effects.own_attacks_have_advantage {
            sources
                .advantage
                .push(RollInfluence::AttackerCondition(condition));
        }
        if effects.own_attacks_have_disadvantage {
            sources
                .disadvantage
                .push(RollInfluence::AttackerCondition(condition));
        }
    }
    if exhaustion_effects(attacker.conditions.exhaustion()).own_attacks_have_disadvantage {
        sources.disadvantage.push(RollInfluence::Exhaustion);
    }

    let adjacent = is_adjacent(attacker, target);
    for condition in target.conditions.tags() {
        let effects = effects_of(condition);
        if effects.attacks_against_have_advantage {
            sources
                .advantage
                .push(RollInfluence::TargetCondition(condition));
        }
        if effects.attacks_against_have_disadvantage {
            sources
                .disadvantage
                .push(RollInfluence::TargetCondition(condition));
        }
        if effects.prone_range_rule {
            let side = if adjacent {
                &mut sources.advantage
            } else {
                &mut sources.disadvantage
            };
            side.push(RollInfluence::TargetCondition(condition));
        }
    }

    // dodging does nothing for a target that cannot act or move
    let target_effects = target.conditions.effects();
    if trackers.is_dodging(&target.id) && !target_effects.cannot_act && target.effective_speed() > 0
    {
        sources.disadvantage.push(RollInfluence::TargetDodging);
    }
    if trackers.is_hidden(&attacker.id) {
        sources.advantage.push(RollInfluence::AttackerHidden);
    }
    if trackers.has_help(&attacker.id, &target.id) {
        sources.advantage.push(RollInfluence::Help);
    }

    sources
}

/// Roll an attack. Does not mutate anything; the caller consumes help grants
/// and reveals hidden attackers based on the result.
pub fn resolve_attack(
    attacker: &Creature,
    target: &Creature,
    modifiers: AttackModifiers,
    trackers: &EncounterTrackers,
    roller: &mut dyn DiceRoller,
) -> AttackResult {
    let sources = roll_sources(attacker, target, modifiers, trackers);
    let d20 = D20Roll::roll(roller, sources.mode());
    let help_used = sources.advantage.contains(&RollInfluence::Help);

    let mut result = AttackResult::from_roll(d20, attacker.attack_bonus, target.armor_class);
    result.attacker_id = attacker.id.clone();
    result.target_id = target.id.clone();
    result.advantage_sources = sources.advantage;
    result.disadvantage_sources = sources.disadvantage;
    result.help_used = help_used;

    if result.hits
        && is_adjacent(attacker, target)
        && target.conditions.effects().melee_hits_are_critical
    {
        result.is_critical = true;
    }

    result
}

impl AttackResult {
    /// Score a d20 against armor class
    pub fn from_roll(d20: D20Roll, attack_bonus: i32, target_ac: i32) -> Self {
        let critical = d20.is_critical();
        let fumble = d20.is_fumble();
        let total = d20.kept as i32 + attack_bonus;

        // Critical always hits, fumble always misses
        let hits = critical || (!fumble && total >= target_ac);

        Self {
            attacker_id: String::new(),
            target_id: String::new(),
            roll: d20.kept,
            rolls: d20.rolls,
            mode: d20.mode,
            attack_bonus,
            total,
            target_ac,
            hits,
            is_critical: critical,
            is_fumble: fumble,
            advantage_sources: Vec::new(),
            disadvantage_sources: Vec::new(),
            help_used: false,
        }
    }
}
