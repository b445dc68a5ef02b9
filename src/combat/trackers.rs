//! Short-lived tactical state from standard actions
//!
//! Dodge, hide, help, disengage, and ready all leave a marker that later
//! rolls consult. These markers live for a turn or two and never survive a
//! long rest.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Advantage granted by the Help action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpGrant {
    pub helper_id: String,
    /// The ally whose next attack benefits
    pub ally_id: String,
    /// The enemy that attack must target
    pub target_id: String,
}

/// An action held until a trigger occurs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadiedAction {
    pub creature_id: String,
    pub trigger: String,
}

/// Per-encounter transient markers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterTrackers {
    dodging: HashSet<String>,
    hidden: HashSet<String>,
    disengaged: HashSet<String>,
    help_grants: Vec<HelpGrant>,
    readied: HashMap<String, ReadiedAction>,
}

impl EncounterTrackers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_dodging(&mut self, creature_id: &str) {
        self.dodging.insert(creature_id.to_string());
    }

    pub fn is_dodging(&self, creature_id: &str) -> bool {
        self.dodging.contains(creature_id)
    }

    pub fn set_hidden(&mut self, creature_id: &str) {
        self.hidden.insert(creature_id.to_string());
    }

    pub fn is_hidden(&self, creature_id: &str) -> bool {
        self.hidden.contains(creature_id)
    }

    /// Attacking gives away a hidden creature's position
    pub fn reveal(&mut self, creature_id: &str) -> bool {
        self.hidden.remove(creature_id)
    }

    pub fn set_disengaged(&mut self, creature_id: &str) {
        self.disengaged.insert(creature_id.to_string());
    }

    pub fn is_disengaged(&self, creature_id: &str) -> bool {
        self.disengaged.contains(creature_id)
    }

    pub fn grant_help(&mut self, grant: HelpGrant) {
        self.help_grants.retain(|g| g.helper_id != grant.helper_id);
        self.help_grants.push(grant);
    }

    pub fn has_help(&self, ally_id: &str, target_id: &str) -> bool {
        self.help_grants
            .iter()
            .any(|g| g.ally_id == ally_id && g.target_id == target_id)
    }

    /// Use up one help grant for this ally against this target
    pub fn consume_help(&mut self, ally_id: &str, target_id: &str) -> bool {
        match self
            .help_grants
            .iter()
            .position(|g| g.ally_id == ally_id && g.target_id == target_id)
        {
            Some(idx) => {
                self.help_grants.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn ready(&mut self, action: ReadiedAction) {
        self.readied.insert(action.creature_id.clone(), action);
    }

    pub fn readied(&self, creature_id: &str) -> Option<&ReadiedAction> {
        self.readied.get(creature_id)
    }

    pub fn take_readied(&mut self, creature_id: &str) -> Option<ReadiedAction> {
        self.readied.remove(creature_id)
    }

    /// Start of a creature's turn: its dodge, help grants, and readied action lapse
    pub fn start_turn(&mut self, creature_id: &str) {
        self.dodging.remove(creature_id);
        self.help_grants.retain(|g| g.helper_id != creature_id);
        self.readied.remove(creature_id);
    }

    /// End of a creature's turn: disengage lapses
    pub fn end_turn(&mut self, creature_id: &str) {
        self.disengaged.remove(creature_id);
    }

    /// Drop every marker set by or for this creature
    pub fn clear_creature(&mut self, creature_id: &str) {
        self.dodging.remove(creature_id);
        self.hidden.remove(creature_id);
        self.disengaged.remove(creature_id);
        self.readied.remove(creature_id);
        self.help_grants.retain(|g| {
            g.helper_id != creature_id && g.ally_id != creature_id && g.target_id != creature_id
        });
    }

    /// Whether any marker references this creature
    pub fn touches(&self, creature_id: &str) -> bool {
        self.dodging.contains(creature_id)
            || self.hidden.contains(creature_id)
            || self.disengaged.contains(creature_id)
            || self.readied.contains_key(creature_id)
            || self.help_grants.iter().any(|g| {
                g.helper_id == creature_id || g.ally_id == creature_id || g.target_id == creature_id
            })
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
