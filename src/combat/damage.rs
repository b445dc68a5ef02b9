//! Damage types, mitigation, and hit point loss
//!
//! Handles damage calculation with:
//! - The thirteen 5e damage types
//! - Immunity (0% damage), resistance (50%, rounded down), vulnerability (200%)
//! - Temporary hit points absorbing damage before current hit points
//!
//! Critical doubling happens before this point: the caller rolls the doubled
//! dice and hands over the finished amount.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::creature::Creature;
use super::error::ParseTagError;

/// Types of damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    Acid,
    Bludgeoning,
    Cold,
    Fire,
    Force,
    Lightning,
    Necrotic,
    Piercing,
    Poison,
    Psychic,
    Radiant,
    Slashing,
    Thunder,
}

impl DamageType {
    /// Get all damage types
    pub fn all() -> &'static [DamageType] {
        &[
            DamageType::Acid,
            DamageType::Bludgeoning,
            DamageType::Cold,
            DamageType::Fire,
            DamageType::Force,
            DamageType::Lightning,
            DamageType::Necrotic,
            DamageType::Piercing,
            DamageType::Poison,
            DamageType::Psychic,
            DamageType::Radiant,
            DamageType::Slashing,
            DamageType::Thunder,
        ]
    }

    /// Slashing, piercing, or bludgeoning
    pub fn is_physical(&self) -> bool {
        matches!(
            self,
            DamageType::Slashing | DamageType::Piercing | DamageType::Bludgeoning
        )
    }
}

impl FromStr for DamageType {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "acid" => Ok(DamageType::Acid),
            "bludgeoning" => Ok(DamageType::Bludgeoning),
            "cold" | "ice" => Ok(DamageType::Cold),
            "fire" => Ok(DamageType::Fire),
            "force" => Ok(DamageType::Force),
            "lightning" | "electric" => Ok(DamageType::Lightning),
            "necrotic" => Ok(DamageType::Necrotic),
            "piercing" => Ok(DamageType::Piercing),
            "poison" => Ok(DamageType::Poison),
            "psychic" => Ok(DamageType::Psychic),
            "radiant" => Ok(DamageType::Radiant),
            "slashing" => Ok(DamageType::Slashing),
            "thunder" => Ok(DamageType::Thunder),
            _ => Err(ParseTagError::new("damage type", s)),
        }
    }
}

impl std::fmt::Display for DamageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DamageType::Acid => "acid",
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Cold => "cold",
            DamageType::Fire => "fire",
            DamageType::Force => "force",
            DamageType::Lightning => "lightning",
            DamageType::Necrotic => "necrotic",
            DamageType::Piercing => "piercing",
            DamageType::Poison => "poison",
            DamageType::Psychic => "psychic",
            DamageType::Radiant => "radiant",
            DamageType::Slashing => "slashing",
            DamageType::Thunder => "thunder",
        };
        write!(f, "{}", s)
    }
}

/// Modifier for damage resistance/immunity/vulnerability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageModifier {
    /// Takes 0% damage
    Immune,
    /// Takes 50% damage, rounded down
    Resistant,
    Normal,
    /// Takes 200% damage
    Vulnerable,
}

impl DamageModifier {
    /// Apply this modifier to a non-negative damage amount
    pub fn apply(&self, damage: u32) -> u32 {
        match self {
            DamageModifier::Immune => 0,
            // integer division floors for unsigned amounts
            DamageModifier::Resistant => damage / 2,
            DamageModifier::Normal => damage,
            DamageModifier::Vulnerable => damage.saturating_mul(2),
        }
    }

    /// Get the multiplier as a percentage
    pub fn percentage(&self) -> u32 {
        match self {
            DamageModifier::Immune => 0,
            DamageModifier::Resistant => 50,
            DamageModifier::Normal => 100,
            DamageModifier::Vulnerable => 200,
        }
    }
}

/// A creature's resistances, vulnerabilities, and immunities.
///
/// Authoring contract: a type should not be both immune and anything else.
/// If it is, immunity wins. A type that is both resistant and vulnerable gets
/// both applied in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageProfile {
    pub resistances: BTreeSet<DamageType>,
    pub vulnerabilities: BTreeSet<DamageType>,
    pub immunities: BTreeSet<DamageType>,
}

impl DamageProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resistance(mut self, dtype: DamageType) -> Self {
        self.resistances.insert(dtype);
        self
    }

    pub fn with_vulnerability(mut self, dtype: DamageType) -> Self {
        self.vulnerabilities.insert(dtype);
        self
    }

    pub fn with_immunity(mut self, dtype: DamageType) -> Self {
        self.immunities.insert(dtype);
        self
    }

    /// The modifiers that apply to a damage type, in application order
    pub fn modifiers_for(&self, dtype: DamageType) -> Vec<DamageModifier> {
        self.modifiers_with(dtype, false)
    }

    /// Like [`modifiers_for`](Self::modifiers_for), with an extra blanket
    /// resistance (petrified creatures resist everything)
    pub fn modifiers_with(&self, dtype: DamageType, resist_all: bool) -> Vec<DamageModifier> {
        if self.immunities.contains(&dtype) {
            return vec![DamageModifier::Immune];
        }
        let mut modifiers = Vec::new();
        if resist_all || self.resistances.contains(&dtype) {
            modifiers.push(DamageModifier::Resistant);
        }
        if self.vulnerabilities.contains(&dtype) {
            modifiers.push(DamageModifier::Vulnerable);
        }
        if modifiers.is_empty() {
            modifiers.push(DamageModifier::Normal);
        }
        modifiers
    }

    /// Calculate damage after applying type-based mitigation
    pub fn mitigate(&self, amount: u32, dtype: DamageType) -> Mitigation {
        self.mitigate_with(amount, dtype, false)
    }

    pub fn mitigate_with(&self, amount: u32, dtype: DamageType, resist_all: bool) -> Mitigation {
        let modifiers = self.modifiers_with(dtype, resist_all);
        let amount = modifiers.iter().fold(amount, |dmg, m| m.apply(dmg));
        Mitigation {
            amount,
            was_immune: modifiers.contains(&DamageModifier::Immune),
            was_resisted: modifiers.contains(&DamageModifier::Resistant),
            was_vulnerable: modifiers.contains(&DamageModifier::Vulnerable),
        }
    }
}

/// Outcome of type-based mitigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mitigation {
    pub amount: u32,
    pub was_immune: bool,
    pub was_resisted: bool,
    pub was_vulnerable: bool,
}

/// Caller-supplied context for a damage application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DamageOptions {
    /// The amount already includes critical dice
    pub is_critical: bool,
}

impl DamageOptions {
    pub fn critical() -> Self {
        Self { is_critical: true }
    }
}

/// Result of running damage through the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageResult {
    pub target_id: String,
    /// Amount handed in by the caller
    pub raw_amount: u32,
    /// Amount after mitigation, split between temporary and current HP
    pub amount: u32,
    pub damage_type: DamageType,
    pub is_critical: bool,
    pub was_resisted: bool,
    pub was_vulnerable: bool,
    pub was_immune: bool,
    pub absorbed_by_temporary: u32,
    /// Current hit points actually lost
    pub hit_point_loss: u32,
    /// Damage left over after current hit points reached 0
    pub overflow: u32,
    /// HP went from above 0 to 0 with this hit
    pub dropped_to_zero: bool,
    /// The target was already at 0 HP when the hit landed
    pub was_at_zero: bool,
    pub new_hit_points: u32,
}

/// Run damage through mitigation and hit point loss.
///
/// Does not touch lifecycle state (death saves, dead latch); the session
/// decides what a drop to 0 means for the creature's faction.
pub fn apply_damage(
    target: &mut Creature,
    amount: i32,
    damage_type: DamageType,
    opts: DamageOptions,
) -> DamageResult {
    let raw_amount = amount.max(0) as u32;
    let resist_all = target.conditions.effects().resists_all_damage;
    let mitigation = target
        .damage_profile
        .mitigate_with(raw_amount, damage_type, resist_all);
    let was_at_zero = target.hit_points == 0;

    let absorbed = mitigation.amount.min(target.temporary_hit_points);
    target.temporary_hit_points -= absorbed;
    let remainder = mitigation.amount - absorbed;

    let hit_point_loss = remainder.min(target.hit_points);
    let overflow = remainder - hit_point_loss;
    target.hit_points -= hit_point_loss;

    DamageResult {
        target_id: target.id.clone(),
        raw_amount,
        amount: mitigation.amount,
        damage_type,
        is_critical: opts.is_critical,
        was_resisted: mitigation.was_resisted,
        was_vulnerable: mitigation.was_vulnerable,
        was_immune: mitigation.was_immune,
        absorbed_by_temporary: absorbed,
        hit_point_loss,
        overflow,
        dropped_to_zero: !was_at_zero && target.hit_points == 0,
        was_at_zero,
        new_hit_points: target.hit_points,
    }
}
