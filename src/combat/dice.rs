//! Dice rolling system
//!
//! Parses and rolls dice notation like "2d6+3", "1d20", "4d6-2".
//! All randomness flows through the [`DiceRoller`] trait so an encounter can
//! run on the thread RNG, a seeded RNG, or a scripted list of rolls.

use std::collections::VecDeque;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors from parsing dice notation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("missing 'd' in dice notation: {0}")]
    MissingSeparator(String),

    #[error("invalid dice count: {0}")]
    InvalidCount(String),

    #[error("dice count must be at least 1")]
    ZeroCount,

    #[error("invalid die sides: {0}")]
    InvalidSides(String),

    #[error("die sides must be at least 1")]
    ZeroSides,

    #[error("invalid modifier: {0}")]
    InvalidModifier(String),

    #[error("at most {max} dice per roll, got {0}", max = MAX_DICE)]
    TooManyDice(u32),

    #[error("at most {max} sides per die, got {0}", max = MAX_SIDES)]
    TooManySides(u32),
}

/// Largest dice count a single roll may ask for
pub const MAX_DICE: u32 = 100;

/// Largest die a roll may ask for
pub const MAX_SIDES: u32 = 1000;

/// Source of individual die results
pub trait DiceRoller: Send {
    /// Roll one die with `sides` faces, returning a value in `1..=sides`
    fn roll_die(&mut self, sides: u32) -> u32;

    /// Roll a single d20
    fn d20(&mut self) -> u32 {
        self.roll_die(20)
    }
}

/// Rolls with the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRoller;

impl DiceRoller for ThreadRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        rand::rng().random_range(1..=sides.max(1))
    }
}

/// Deterministic roller: the same seed replays the same encounter
#[derive(Debug, Clone)]
pub struct SeededRoller {
    rng: StdRng,
}

impl SeededRoller {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DiceRoller for SeededRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.rng.random_range(1..=sides.max(1))
    }
}

/// Replays a fixed sequence of die results.
///
/// Values are clamped into `1..=sides` for the die being rolled. Once the
/// script runs out every further roll is a 1.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRoller {
    rolls: VecDeque<u32>,
}

impl ScriptedRoller {
    pub fn new(rolls: impl IntoIterator<Item = u32>) -> Self {
        Self {
            rolls: rolls.into_iter().collect(),
        }
    }

    /// Queue more rolls behind the ones already scripted
    pub fn push(&mut self, rolls: impl IntoIterator<Item = u32>) {
        self.rolls.extend(rolls);
    }

    pub fn remaining(&self) -> usize {
        self.rolls.len()
    }
}

impl DiceRoller for ScriptedRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        match self.rolls.pop_front() {
            Some(value) => value.clamp(1, sides.max(1)),
            None => {
                warn!("scripted dice exhausted, rolling 1 on d{}", sides);
                1
            }
        }
    }
}

/// A parsed dice roll such as `2d6+3`.
///
/// Deserializing checks the same bounds as [`parse_dice`], so rolls that
/// arrive over the wire are always within [`MAX_DICE`] and [`MAX_SIDES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DiceRollFields")]
pub struct DiceRoll {
    /// Number of dice to roll
    pub count: u32,
    /// Number of sides per die
    pub sides: u32,
    /// Modifier to add/subtract
    pub modifier: i32,
}

#[derive(Deserialize)]
struct DiceRollFields {
    count: u32,
    sides: u32,
    modifier: i32,
}

impl TryFrom<DiceRollFields> for DiceRoll {
    type Error = DiceError;

    fn try_from(fields: DiceRollFields) -> Result<Self, Self::Error> {
        DiceRoll::checked(fields.count, fields.sides, fields.modifier)
    }
}

impl DiceRoll {
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self {
            count,
            sides,
            modifier,
        }
    }

    /// Build a roll, rejecting empty or oversized dice
    pub fn checked(count: u32, sides: u32, modifier: i32) -> Result<Self, DiceError> {
        let roll = Self::new(count, sides, modifier);
        roll.validate()?;
        Ok(roll)
    }

    pub fn validate(&self) -> Result<(), DiceError> {
        if self.count == 0 {
            return Err(DiceError::ZeroCount);
        }
        if self.count > MAX_DICE {
            return Err(DiceError::TooManyDice(self.count));
        }
        if self.sides == 0 {
            return Err(DiceError::ZeroSides);
        }
        if self.sides > MAX_SIDES {
            return Err(DiceError::TooManySides(self.sides));
        }
        Ok(())
    }

    /// Roll the dice and return the total
    pub fn roll(&self, roller: &mut dyn DiceRoller) -> i32 {
        self.roll_detailed(roller).1
    }

    /// Roll and return individual die results plus total
    pub fn roll_detailed(&self, roller: &mut dyn DiceRoller) -> (Vec<u32>, i32) {
        let results: Vec<u32> = (0..self.count).map(|_| roller.roll_die(self.sides)).collect();
        let sum = results
            .iter()
            .fold(0i32, |acc, &r| acc.saturating_add(saturate(r)));
        (results, sum.saturating_add(self.modifier))
    }

    /// The same roll with its dice doubled, as for a critical hit.
    /// The modifier is not doubled.
    pub fn critical(&self) -> Self {
        Self {
            count: self.count.saturating_mul(2),
            ..*self
        }
    }

    /// Get the minimum possible result
    pub fn min(&self) -> i32 {
        saturate(self.count).saturating_add(self.modifier)
    }

    /// Get the maximum possible result
    pub fn max(&self) -> i32 {
        saturate(self.count.saturating_mul(self.sides)).saturating_add(self.modifier)
    }

    /// Get the expected average (rounded down)
    pub fn average(&self) -> i32 {
        let avg_per_die = (1.0 + self.sides as f64) / 2.0;
        (self.count as f64 * avg_per_die + self.modifier as f64) as i32
    }
}

fn saturate(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl FromStr for DiceRoll {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_dice(s)
    }
}

impl std::fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.modifier {
            m if m > 0 => write!(f, "{}d{}+{}", self.count, self.sides, m),
            m if m < 0 => write!(f, "{}d{}{}", self.count, self.sides, m),
            _ => write!(f, "{}d{}", self.count, self.sides),
        }
    }
}

/// Parse a dice notation string like "2d6+3"
pub fn parse_dice(notation: &str) -> Result<DiceRoll, DiceError> {
    let notation = notation.trim().to_lowercase();

    let d_pos = notation
        .find('d')
        .ok_or_else(|| DiceError::MissingSeparator(notation.clone()))?;

    let count_str = &notation[..d_pos];
    let count: u32 = if count_str.is_empty() {
        1 // "d6" means "1d6"
    } else {
        count_str
            .parse()
            .map_err(|_| DiceError::InvalidCount(count_str.to_string()))?
    };

    if count == 0 {
        return Err(DiceError::ZeroCount);
    }

    let rest = &notation[d_pos + 1..];

    let (sides_str, modifier) = if let Some(plus_pos) = rest.find('+') {
        let mod_str = &rest[plus_pos + 1..];
        let modifier: i32 = mod_str
            .parse()
            .map_err(|_| DiceError::InvalidModifier(mod_str.to_string()))?;
        (&rest[..plus_pos], modifier)
    } else if let Some(minus_pos) = rest.rfind('-').filter(|&pos| pos > 0) {
        // includes the minus sign
        let mod_str = &rest[minus_pos..];
        let modifier: i32 = mod_str
            .parse()
            .map_err(|_| DiceError::InvalidModifier(mod_str.to_string()))?;
        (&rest[..minus_pos], modifier)
    } else {
        (rest, 0)
    };

    let sides: u32 = sides_str
        .parse()
        .map_err(|_| DiceError::InvalidSides(sides_str.to_string()))?;

    DiceRoll::checked(count, sides, modifier)
}

/// How a d20 test is rolled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RollMode {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl RollMode {
    /// Advantage and disadvantage cancel when both apply
    pub fn from_flags(advantage: bool, disadvantage: bool) -> Self {
        match (advantage, disadvantage) {
            (true, false) => RollMode::Advantage,
            (false, true) => RollMode::Disadvantage,
            _ => RollMode::Normal,
        }
    }
}

/// A d20 test, keeping both dice when rolled with advantage or disadvantage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct D20Roll {
    /// The die that counts
    pub kept: u32,
    /// Every die rolled, in order
    pub rolls: Vec<u32>,
    pub mode: RollMode,
}

impl D20Roll {
    pub fn roll(roller: &mut dyn DiceRoller, mode: RollMode) -> Self {
        let first = roller.d20();
        match mode {
            RollMode::Normal => Self {
                kept: first,
                rolls: vec![first],
                mode,
            },
            RollMode::Advantage | RollMode::Disadvantage => {
                let second = roller.d20();
                let kept = if mode == RollMode::Advantage {
                    first.max(second)
                } else {
                    first.min(second)
                };
                Self {
                    kept,
                    rolls: vec![first, second],
                    mode,
                }
            }
        }
    }

    pub fn is_critical(&self) -> bool {
        is_critical(self.kept)
    }

    pub fn is_fumble(&self) -> bool {
        is_fumble(self.kept)
    }
}

/// Check if a d20 roll is a natural 20 (critical hit)
pub fn is_critical(roll: u32) -> bool {
    roll == 20
}

/// Check if a d20 roll is a natural 1 (critical fail)
pub fn is_fumble(roll: u32) -> bool {
    roll == 1
}
