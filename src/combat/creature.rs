//! Combatants and their stat blocks

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::conditions::{ActiveCondition, Condition, ConditionSet};
use super::damage::DamageProfile;
use super::death::DeathSaveState;
use super::error::ParseTagError;

/// Feet per grid square
pub const FEET_PER_SQUARE: u32 = 5;

/// Source tag for the unconscious condition imposed by dropping to 0 HP
pub const ZERO_HP_SOURCE: &str = "zero-hit-points";

/// Which side of the table controls a creature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
    /// Player characters; roll death saves at 0 HP
    #[default]
    Character,
    /// Die outright at 0 HP
    Monster,
}

impl FromStr for Faction {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "character" | "pc" | "player" => Ok(Faction::Character),
            "monster" | "npc" => Ok(Faction::Monster),
            _ => Err(ParseTagError::new("faction", s)),
        }
    }
}

/// The six abilities
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Ability {
    #[default]
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    /// Strength and Dexterity saves auto-fail under some conditions
    pub fn is_physical(&self) -> bool {
        matches!(self, Ability::Strength | Ability::Dexterity)
    }
}

impl FromStr for Ability {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "str" | "strength" => Ok(Ability::Strength),
            "dex" | "dexterity" => Ok(Ability::Dexterity),
            "con" | "constitution" => Ok(Ability::Constitution),
            "int" | "intelligence" => Ok(Ability::Intelligence),
            "wis" | "wisdom" => Ok(Ability::Wisdom),
            "cha" | "charisma" => Ok(Ability::Charisma),
            _ => Err(ParseTagError::new("ability", s)),
        }
    }
}

/// Ability modifiers (not scores)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityModifiers {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl AbilityModifiers {
    pub fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    /// Modifier for an ability score, e.g. 15 -> +2, 8 -> -1
    pub fn modifier_for_score(score: i32) -> i32 {
        (score - 10).div_euclid(2)
    }
}

/// Grid square supplied by the positioning layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Distance in feet; diagonals count as one square
    pub fn distance_feet(&self, other: &Position) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        dx.max(dy).saturating_mul(FEET_PER_SQUARE)
    }
}

/// Where a creature stands between life and death
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Conscious,
    /// At 0 HP and rolling death saves
    Dying,
    /// At 0 HP, unconscious, no longer rolling
    Stable,
    Dead,
}

/// A combatant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creature {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub faction: Faction,
    /// Current hit points, always within `0..=max_hit_points`
    pub hit_points: u32,
    pub max_hit_points: u32,
    #[serde(default)]
    pub temporary_hit_points: u32,
    pub armor_class: i32,
    /// Walking speed in feet
    #[serde(default = "default_speed")]
    pub speed: u32,
    #[serde(default)]
    pub conditions: ConditionSet,
    #[serde(default)]
    pub abilities: AbilityModifiers,
    #[serde(default = "default_proficiency")]
    pub proficiency_bonus: i32,
    /// Saving throws that add the proficiency bonus
    #[serde(default)]
    pub save_proficiencies: BTreeSet<Ability>,
    /// Ability used for weapon attacks
    #[serde(default)]
    pub attack_ability: Ability,
    /// Derived: attack ability modifier + proficiency bonus
    #[serde(default)]
    pub attack_bonus: i32,
    #[serde(default)]
    pub damage_profile: DamageProfile,
    #[serde(default)]
    pub position: Option<Position>,
    /// Size of this creature's hit dice
    #[serde(default = "default_hit_die")]
    pub hit_die: u32,
    #[serde(default)]
    pub hit_dice_total: u32,
    #[serde(default)]
    pub hit_dice_remaining: u32,
    #[serde(default)]
    pub death_saves: DeathSaveState,
    #[serde(default)]
    pub dead: bool,
}

fn default_speed() -> u32 {
    30
}

fn default_proficiency() -> i32 {
    2
}

fn default_hit_die() -> u32 {
    8
}

impl Creature {
    /// Create a creature at full health with default stats
    pub fn new(id: &str, name: &str, faction: Faction, max_hp: u32, armor_class: i32) -> Self {
        let mut creature = Self {
            id: id.to_string(),
            name: name.to_string(),
            faction,
            hit_points: max_hp,
            max_hit_points: max_hp,
            temporary_hit_points: 0,
            armor_class,
            speed: default_speed(),
            conditions: ConditionSet::new(),
            abilities: AbilityModifiers::default(),
            proficiency_bonus: default_proficiency(),
            save_proficiencies: BTreeSet::new(),
            attack_ability: Ability::Strength,
            attack_bonus: 0,
            damage_profile: DamageProfile::new(),
            position: None,
            hit_die: default_hit_die(),
            hit_dice_total: 1,
            hit_dice_remaining: 1,
            death_saves: DeathSaveState::default(),
            dead: false,
        };
        creature.recompute_attack_bonus();
        creature
    }

    pub fn with_abilities(mut self, abilities: AbilityModifiers) -> Self {
        self.abilities = abilities;
        self.recompute_attack_bonus();
        self
    }

    pub fn with_attack_ability(mut self, ability: Ability) -> Self {
        self.attack_ability = ability;
        self.recompute_attack_bonus();
        self
    }

    pub fn with_proficiency(mut self, bonus: i32) -> Self {
        self.proficiency_bonus = bonus;
        self.recompute_attack_bonus();
        self
    }

    pub fn with_save_proficiency(mut self, ability: Ability) -> Self {
        self.save_proficiencies.insert(ability);
        self
    }

    /// Saving throw bonus for an ability
    pub fn save_bonus(&self, ability: Ability) -> i32 {
        let proficiency = if self.save_proficiencies.contains(&ability) {
            self.proficiency_bonus
        } else {
            0
        };
        self.abilities.get(ability) + proficiency
    }

    pub fn with_speed(mut self, speed: u32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_damage_profile(mut self, profile: DamageProfile) -> Self {
        self.damage_profile = profile;
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_hit_dice(mut self, sides: u32, count: u32) -> Self {
        self.hit_die = sides;
        self.hit_dice_total = count;
        self.hit_dice_remaining = count;
        self
    }

    pub fn with_condition(mut self, condition: ActiveCondition) -> Self {
        self.conditions.add(condition);
        self
    }

    /// Recompute the derived attack bonus from ability and proficiency
    pub fn recompute_attack_bonus(&mut self) {
        self.attack_bonus = self.abilities.get(self.attack_ability) + self.proficiency_bonus;
    }

    /// Bring snapshot values back inside their invariants
    pub fn normalize(&mut self) {
        self.hit_points = self.hit_points.min(self.max_hit_points);
        self.hit_dice_remaining = self.hit_dice_remaining.min(self.hit_dice_total);
        self.recompute_attack_bonus();
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.dead {
            Lifecycle::Dead
        } else if self.hit_points > 0 {
            Lifecycle::Conscious
        } else if self.faction == Faction::Monster {
            Lifecycle::Dead
        } else if self.death_saves.is_stabilized {
            Lifecycle::Stable
        } else {
            Lifecycle::Dying
        }
    }

    pub fn is_dead(&self) -> bool {
        self.lifecycle() == Lifecycle::Dead
    }

    pub fn is_dying(&self) -> bool {
        self.lifecycle() == Lifecycle::Dying
    }

    /// At 0 HP or dead
    pub fn is_down(&self) -> bool {
        self.lifecycle() != Lifecycle::Conscious
    }

    /// Speed after conditions and exhaustion
    pub fn effective_speed(&self) -> u32 {
        let effects = self.conditions.effects();
        if effects.speed_zero || effects.cannot_move {
            0
        } else if effects.halves_speed {
            self.speed / 2
        } else {
            self.speed
        }
    }

    /// Replace temporary hit points; grants never stack
    pub fn grant_temporary_hp(&mut self, amount: u32) {
        self.temporary_hit_points = amount;
    }

    /// Restore hit points up to the maximum, returning the amount restored
    pub fn restore_hit_points(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.max_hit_points - self.hit_points);
        self.hit_points += actual;
        actual
    }

    /// Mark as unconscious from dropping to 0 HP
    pub(crate) fn fall_unconscious(&mut self) {
        self.conditions
            .add(ActiveCondition::new(Condition::Unconscious).with_source(ZERO_HP_SOURCE));
    }

    /// Clear the 0-HP unconsciousness. Returns true if it was present.
    pub(crate) fn regain_consciousness(&mut self) -> bool {
        self.conditions
            .remove_from_source(Condition::Unconscious, ZERO_HP_SOURCE)
    }

    /// Distance to another creature in feet, if both positions are known
    pub fn distance_to(&self, other: &Creature) -> Option<u32> {
        match (self.position, other.position) {
            (Some(a), Some(b)) => Some(a.distance_feet(&b)),
            _ => None,
        }
    }
}
