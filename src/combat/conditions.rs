//! Status conditions and their mechanical effects
//!
//! The registry is a pure lookup over the closed [`Condition`] enum. Nothing
//! here caches: conditions come and go mid-turn, so callers ask
//! [`can_act`]/[`can_move`] every time they need an answer.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ParseTagError;

/// Highest exhaustion level; reaching it is death
pub const MAX_EXHAUSTION: u8 = 6;

/// The fixed condition vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Blinded,
    Charmed,
    Deafened,
    Frightened,
    Grappled,
    Incapacitated,
    Invisible,
    Paralyzed,
    Petrified,
    Poisoned,
    Prone,
    Restrained,
    Stunned,
    Unconscious,
    Exhaustion,
}

impl Condition {
    pub fn all() -> &'static [Condition] {
        &[
            Condition::Blinded,
            Condition::Charmed,
            Condition::Deafened,
            Condition::Frightened,
            Condition::Grappled,
            Condition::Incapacitated,
            Condition::Invisible,
            Condition::Paralyzed,
            Condition::Petrified,
            Condition::Poisoned,
            Condition::Prone,
            Condition::Restrained,
            Condition::Stunned,
            Condition::Unconscious,
            Condition::Exhaustion,
        ]
    }
}

impl FromStr for Condition {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "blinded" | "blind" => Ok(Condition::Blinded),
            "charmed" => Ok(Condition::Charmed),
            "deafened" | "deaf" => Ok(Condition::Deafened),
            "frightened" | "afraid" => Ok(Condition::Frightened),
            "grappled" => Ok(Condition::Grappled),
            "incapacitated" => Ok(Condition::Incapacitated),
            "invisible" | "invis" => Ok(Condition::Invisible),
            "paralyzed" | "paralysed" => Ok(Condition::Paralyzed),
            "petrified" => Ok(Condition::Petrified),
            "poisoned" => Ok(Condition::Poisoned),
            "prone" => Ok(Condition::Prone),
            "restrained" => Ok(Condition::Restrained),
            "stunned" => Ok(Condition::Stunned),
            "unconscious" => Ok(Condition::Unconscious),
            "exhaustion" | "exhausted" => Ok(Condition::Exhaustion),
            _ => Err(ParseTagError::new("condition", s)),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Condition::Blinded => "blinded",
            Condition::Charmed => "charmed",
            Condition::Deafened => "deafened",
            Condition::Frightened => "frightened",
            Condition::Grappled => "grappled",
            Condition::Incapacitated => "incapacitated",
            Condition::Invisible => "invisible",
            Condition::Paralyzed => "paralyzed",
            Condition::Petrified => "petrified",
            Condition::Poisoned => "poisoned",
            Condition::Prone => "prone",
            Condition::Restrained => "restrained",
            Condition::Stunned => "stunned",
            Condition::Unconscious => "unconscious",
            Condition::Exhaustion => "exhaustion",
        };
        write!(f, "{}", s)
    }
}

/// Mechanical consequences of one or more conditions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConditionEffects {
    pub cannot_move: bool,
    pub cannot_act: bool,
    pub cannot_react: bool,
    pub auto_fail_str_dex_saves: bool,
    pub attacks_against_have_advantage: bool,
    pub attacks_against_have_disadvantage: bool,
    pub own_attacks_have_advantage: bool,
    pub own_attacks_have_disadvantage: bool,
    pub speed_zero: bool,
    pub halves_speed: bool,
    /// Hits from within 5 feet are critical
    pub melee_hits_are_critical: bool,
    /// Attacks from within 5 feet have advantage, from farther away disadvantage
    pub prone_range_rule: bool,
    pub disadvantage_on_dex_saves: bool,
    pub disadvantage_on_saves: bool,
    pub resists_all_damage: bool,
}

impl ConditionEffects {
    pub const NONE: ConditionEffects = ConditionEffects {
        cannot_move: false,
        cannot_act: false,
        cannot_react: false,
        auto_fail_str_dex_saves: false,
        attacks_against_have_advantage: false,
        attacks_against_have_disadvantage: false,
        own_attacks_have_advantage: false,
        own_attacks_have_disadvantage: false,
        speed_zero: false,
        halves_speed: false,
        melee_hits_are_critical: false,
        prone_range_rule: false,
        disadvantage_on_dex_saves: false,
        disadvantage_on_saves: false,
        resists_all_damage: false,
    };

    const INCAPACITATED: ConditionEffects = ConditionEffects {
        cannot_act: true,
        cannot_react: true,
        ..ConditionEffects::NONE
    };

    /// Combine two effect bags; any flag set in either stays set
    pub fn union(self, other: ConditionEffects) -> ConditionEffects {
        ConditionEffects {
            cannot_move: self.cannot_move || other.cannot_move,
            cannot_act: self.cannot_act || other.cannot_act,
            cannot_react: self.cannot_react || other.cannot_react,
            auto_fail_str_dex_saves: self.auto_fail_str_dex_saves
                || other.auto_fail_str_dex_saves,
            attacks_against_have_advantage: self.attacks_against_have_advantage
                || other.attacks_against_have_advantage,
            attacks_against_have_disadvantage: self.attacks_against_have_disadvantage
                || other.attacks_against_have_disadvantage,
            own_attacks_have_advantage: self.own_attacks_have_advantage
                || other.own_attacks_have_advantage,
            own_attacks_have_disadvantage: self.own_attacks_have_disadvantage
                || other.own_attacks_have_disadvantage,
            speed_zero: self.speed_zero || other.speed_zero,
            halves_speed: self.halves_speed || other.halves_speed,
            melee_hits_are_critical: self.melee_hits_are_critical
                || other.melee_hits_are_critical,
            prone_range_rule: self.prone_range_rule || other.prone_range_rule,
            disadvantage_on_dex_saves: self.disadvantage_on_dex_saves
                || other.disadvantage_on_dex_saves,
            disadvantage_on_saves: self.disadvantage_on_saves || other.disadvantage_on_saves,
            resists_all_damage: self.resists_all_damage || other.resists_all_damage,
        }
    }
}

/// Effects of a single condition, per the rules-as-written table.
///
/// Exhaustion has no flat effect; see [`exhaustion_effects`].
pub fn effects_of(condition: Condition) -> ConditionEffects {
    match condition {
        Condition::Blinded => ConditionEffects {
            own_attacks_have_disadvantage: true,
            attacks_against_have_advantage: true,
            ..ConditionEffects::NONE
        },
        Condition::Charmed | Condition::Deafened | Condition::Exhaustion => ConditionEffects::NONE,
        Condition::Frightened | Condition::Poisoned => ConditionEffects {
            own_attacks_have_disadvantage: true,
            ..ConditionEffects::NONE
        },
        Condition::Grappled => ConditionEffects {
            cannot_move: true,
            speed_zero: true,
            ..ConditionEffects::NONE
        },
        Condition::Incapacitated => ConditionEffects::INCAPACITATED,
        Condition::Invisible => ConditionEffects {
            own_attacks_have_advantage: true,
            attacks_against_have_disadvantage: true,
            ..ConditionEffects::NONE
        },
        Condition::Paralyzed | Condition::Unconscious => ConditionEffects {
            cannot_move: true,
            speed_zero: true,
            auto_fail_str_dex_saves: true,
            attacks_against_have_advantage: true,
            melee_hits_are_critical: true,
            ..ConditionEffects::INCAPACITATED
        },
        Condition::Petrified => ConditionEffects {
            cannot_move: true,
            speed_zero: true,
            auto_fail_str_dex_saves: true,
            attacks_against_have_advantage: true,
            resists_all_damage: true,
            ..ConditionEffects::INCAPACITATED
        },
        Condition::Prone => ConditionEffects {
            own_attacks_have_disadvantage: true,
            prone_range_rule: true,
            ..ConditionEffects::NONE
        },
        Condition::Restrained => ConditionEffects {
            cannot_move: true,
            speed_zero: true,
            own_attacks_have_disadvantage: true,
            attacks_against_have_advantage: true,
            disadvantage_on_dex_saves: true,
            ..ConditionEffects::NONE
        },
        Condition::Stunned => ConditionEffects {
            cannot_move: true,
            auto_fail_str_dex_saves: true,
            attacks_against_have_advantage: true,
            ..ConditionEffects::INCAPACITATED
        },
    }
}

/// Cumulative effects of an exhaustion level
pub fn exhaustion_effects(level: u8) -> ConditionEffects {
    ConditionEffects {
        halves_speed: level >= 2,
        own_attacks_have_disadvantage: level >= 3,
        disadvantage_on_saves: level >= 3,
        speed_zero: level >= 5,
        cannot_move: level >= 5,
        ..ConditionEffects::NONE
    }
}

/// A condition applied to a creature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCondition {
    pub condition: Condition,
    /// Who or what applied it
    #[serde(default)]
    pub source: Option<String>,
    /// Rounds left, counted down at the start of the affected creature's turn.
    /// `None` lasts until removed.
    #[serde(default)]
    pub remaining_rounds: Option<u32>,
}

impl ActiveCondition {
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            source: None,
            remaining_rounds: None,
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn for_rounds(mut self, rounds: u32) -> Self {
        self.remaining_rounds = Some(rounds);
        self
    }
}

/// The conditions on one creature. Presence is boolean per tag; exhaustion
/// is tracked as a level instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionSet {
    active: Vec<ActiveCondition>,
    exhaustion: u8,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a condition. Returns true if the tag was not already present.
    ///
    /// Re-applying a present tag keeps one instance and extends its duration.
    /// Applying exhaustion raises the level by one.
    pub fn add(&mut self, condition: ActiveCondition) -> bool {
        if condition.condition == Condition::Exhaustion {
            let was_exhausted = self.exhaustion > 0;
            self.add_exhaustion();
            return !was_exhausted;
        }

        if let Some(existing) = self
            .active
            .iter_mut()
            .find(|c| c.condition == condition.condition)
        {
            existing.remaining_rounds = match (existing.remaining_rounds, condition.remaining_rounds)
            {
                (Some(a), Some(b)) => Some(a.max(b)),
                _ => None,
            };
            return false;
        }

        self.active.push(condition);
        true
    }

    /// Remove a condition tag. Removing exhaustion clears every level.
    /// Returns true if it was present.
    pub fn remove(&mut self, condition: Condition) -> bool {
        if condition == Condition::Exhaustion {
            let was = self.exhaustion > 0;
            self.exhaustion = 0;
            return was;
        }
        let before = self.active.len();
        self.active.retain(|c| c.condition != condition);
        self.active.len() != before
    }

    /// Remove a tag only if it was applied by the given source
    pub fn remove_from_source(&mut self, condition: Condition, source: &str) -> bool {
        let before = self.active.len();
        self.active
            .retain(|c| !(c.condition == condition && c.source.as_deref() == Some(source)));
        self.active.len() != before
    }

    pub fn has(&self, condition: Condition) -> bool {
        if condition == Condition::Exhaustion {
            return self.exhaustion > 0;
        }
        self.active.iter().any(|c| c.condition == condition)
    }

    pub fn get(&self, condition: Condition) -> Option<&ActiveCondition> {
        self.active.iter().find(|c| c.condition == condition)
    }

    /// Every tag present, exhaustion included
    pub fn tags(&self) -> Vec<Condition> {
        let mut tags: Vec<Condition> = self.active.iter().map(|c| c.condition).collect();
        if self.exhaustion > 0 {
            tags.push(Condition::Exhaustion);
        }
        tags
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.exhaustion == 0
    }

    pub fn exhaustion(&self) -> u8 {
        self.exhaustion
    }

    /// Raise exhaustion by one level, returning the new level
    pub fn add_exhaustion(&mut self) -> u8 {
        self.exhaustion = (self.exhaustion + 1).min(MAX_EXHAUSTION);
        self.exhaustion
    }

    /// Lower exhaustion by one level, returning the new level
    pub fn reduce_exhaustion(&mut self) -> u8 {
        self.exhaustion = self.exhaustion.saturating_sub(1);
        self.exhaustion
    }

    /// Union of every present condition's effects
    pub fn effects(&self) -> ConditionEffects {
        self.active
            .iter()
            .map(|c| effects_of(c.condition))
            .fold(exhaustion_effects(self.exhaustion), ConditionEffects::union)
    }

    /// Count down timed conditions at the start of the creature's turn.
    /// Returns the tags that expired.
    pub fn tick_turn_start(&mut self) -> Vec<Condition> {
        let mut expired = Vec::new();
        for c in &mut self.active {
            if let Some(rounds) = c.remaining_rounds.as_mut() {
                *rounds = rounds.saturating_sub(1);
                if *rounds == 0 {
                    expired.push(c.condition);
                }
            }
        }
        self.active.retain(|c| c.remaining_rounds != Some(0));
        expired
    }
}

/// The first condition that stops the creature from taking actions
pub fn action_blocker(conditions: &ConditionSet) -> Option<Condition> {
    conditions
        .tags()
        .into_iter()
        .find(|&c| effects_of(c).cannot_act)
}

pub fn can_act(conditions: &ConditionSet) -> bool {
    action_blocker(conditions).is_none()
}

pub fn can_react(conditions: &ConditionSet) -> bool {
    !conditions.effects().cannot_react
}

pub fn can_move(conditions: &ConditionSet) -> bool {
    let effects = conditions.effects();
    !(effects.cannot_move || effects.speed_zero)
}
