//! encounter - turn-based combat resolution for 5e-style tabletop encounters
//!
//! The rules engine lives in [`combat`]. [`config`] loads engine settings and
//! encounter rosters.

pub mod combat;
pub mod config;

pub use combat::{CombatEvent, CombatSession, SessionHandle};
pub use config::{ConfigError, EngineConfig, RosterFile};
