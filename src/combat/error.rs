//! Rejections returned by the combat engine

use thiserror::Error;

use super::conditions::Condition;
use super::dice::DiceError;
use super::economy::ActionKind;

/// Why a combat request was refused.
///
/// Every variant is a synchronous rejection: no state was mutated and the
/// caller may retry with a different choice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    #[error("no {0} remaining this turn")]
    ActionSpent(ActionKind),

    #[error("{creature_id} cannot act while {condition}")]
    Incapacitated {
        creature_id: String,
        condition: Condition,
    },

    #[error("{0} cannot move right now")]
    CannotMove(String),

    #[error("not enough movement: {needed} ft needed, {remaining} ft remaining")]
    InsufficientMovement { needed: u32, remaining: u32 },

    #[error("combat is not in progress")]
    NotInCombat,

    #[error("it is not {0}'s turn")]
    NotCreaturesTurn(String),

    #[error("{0} is down")]
    CreatureDown(String),

    #[error("{0} has no readied action")]
    NothingReadied(String),

    #[error("no creature with id {0}")]
    UnknownCreature(String),

    #[error("invalid damage dice: {0}")]
    InvalidDice(#[from] DiceError),
}

/// Failure to parse one of the engine's closed vocabularies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseTagError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseTagError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
