//! Combat resolution engine
//!
//! Implements 5e-style encounter rules:
//! - Dice notation (e.g., "2d6+3") and d20 tests with advantage/disadvantage
//! - Initiative, turns, and rounds
//! - Action economy and the standard actions
//! - Attack resolution with condition-derived advantage
//! - Damage types with immunity, resistance, and vulnerability
//! - Conditions and exhaustion
//! - Death saving throws
//! - Short and long rests
//! - An event stream for observers

mod attack;
mod conditions;
mod creature;
mod damage;
mod death;
mod dice;
mod economy;
mod error;
mod events;
mod handle;
mod rest;
mod session;
mod timer;
mod trackers;

pub use attack::{resolve_attack, roll_sources, AttackModifiers, AttackResult, RollInfluence, RollSources};
pub use conditions::{
    action_blocker, can_act, can_move, can_react, effects_of, exhaustion_effects, ActiveCondition,
    Condition, ConditionEffects, ConditionSet, MAX_EXHAUSTION,
};
pub use creature::{Ability, AbilityModifiers, Creature, Faction, Lifecycle, Position, FEET_PER_SQUARE};
pub use damage::{apply_damage, DamageModifier, DamageOptions, DamageProfile, DamageResult, DamageType, Mitigation};
pub use death::{
    add_death_save_failure, roll_death_save, DeathSaveOutcome, DeathSaveState, DEATH_SAVE_DC,
    DEATH_SAVE_LIMIT,
};
pub use dice::{
    parse_dice, D20Roll, DiceError, DiceRoll, DiceRoller, RollMode, ScriptedRoller, SeededRoller,
    ThreadRoller, MAX_DICE, MAX_SIDES,
};
pub use economy::{ActionEconomy, ActionEconomyTracker, ActionKind};
pub use error::{CombatError, ParseTagError};
pub use events::{CombatEvent, EventBus, EventEnvelope, InitiativeEntry, DEFAULT_HISTORY_LIMIT};
pub use handle::{HandleError, SessionCommand, SessionHandle, SessionWorker, StandardAction};
pub use rest::{long_rest, short_rest, RestOutcome};
pub use session::{
    AttackAction, AttackActionOutcome, CombatPhase, CombatSession, HealResult, InitiativeOutcome,
    SavingThrowResult, SessionSnapshot,
};
pub use timer::{TurnTimer, TurnTimerStatus};
pub use trackers::{EncounterTrackers, HelpGrant, ReadiedAction};
