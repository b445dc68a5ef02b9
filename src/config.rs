//! Engine configuration and encounter rosters
//!
//! Settings are layered with figment: built-in defaults, then an optional
//! TOML file, then `ENCOUNTER_`-prefixed environment variables
//! (`ENCOUNTER_TURN_TIMEOUT_SECS=60`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::combat::{
    Creature, DamageType, DiceError, DiceRoll, DiceRoller, SeededRoller, ThreadRoller,
    DEFAULT_HISTORY_LIMIT,
};

pub const ENV_PREFIX: &str = "ENCOUNTER_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error(transparent)]
    Figment(#[from] figment::Error),

    #[error("bad weapon for {creature_id}: {source}")]
    Weapon {
        creature_id: String,
        #[source]
        source: DiceError,
    },
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Advisory per-turn limit in seconds; 0 disables the turn timer
    pub turn_timeout_secs: u64,
    /// Fixed seed for reproducible dice
    pub rng_seed: Option<u64>,
    /// Fallback tracing filter when RUST_LOG is unset
    pub log_filter: String,
    /// Events each session keeps in memory; subscribers see all of them
    pub event_history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            turn_timeout_secs: 0,
            rng_seed: None,
            log_filter: "encounter=info".to_string(),
            event_history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl EngineConfig {
    /// The provider stack, for callers that want to add layers of their own
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::MissingFile(path.to_path_buf()));
            }
        }
        Ok(Self::figment(path).extract()?)
    }

    pub fn turn_limit(&self) -> Option<Duration> {
        (self.turn_timeout_secs > 0).then(|| Duration::from_secs(self.turn_timeout_secs))
    }

    /// Seeded dice when a seed is configured, thread-local randomness otherwise
    pub fn roller(&self) -> Box<dyn DiceRoller> {
        match self.rng_seed {
            Some(seed) => Box::new(SeededRoller::new(seed)),
            None => Box::new(ThreadRoller),
        }
    }
}

fn default_weapon() -> String {
    "1d4".to_string()
}

fn default_damage_type() -> DamageType {
    DamageType::Bludgeoning
}

/// A creature plus the weapon it swings in a simulated encounter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    #[serde(flatten)]
    pub creature: Creature,
    /// Damage dice, e.g. "1d8+3"
    #[serde(default = "default_weapon")]
    pub weapon: String,
    #[serde(default = "default_damage_type")]
    pub damage_type: DamageType,
}

impl RosterEntry {
    pub fn weapon_dice(&self) -> Result<DiceRoll, ConfigError> {
        self.weapon.parse().map_err(|source| ConfigError::Weapon {
            creature_id: self.creature.id.clone(),
            source,
        })
    }
}

/// Encounter roster, one `[[creatures]]` table per combatant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterFile {
    #[serde(default)]
    pub creatures: Vec<RosterEntry>,
}

impl RosterFile {
    /// Load and validate a roster. Weapon dice are checked up front so a typo
    /// fails before the encounter starts.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingFile(path.to_path_buf()));
        }
        let roster: RosterFile = Figment::from(Toml::file(path)).extract()?;
        for entry in &roster.creatures {
            entry.weapon_dice()?;
        }
        Ok(roster)
    }
}
