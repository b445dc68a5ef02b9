//! TestEncounter - a combat session driven by scripted dice

#![allow(dead_code)]

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use encounter::combat::{
    CombatEvent, CombatSession, Creature, DiceRoller, InitiativeOutcome, ScriptedRoller,
};

/// A dice script shared between the test and the session that rolls it
#[derive(Clone, Default)]
pub struct ScriptedDice(Arc<Mutex<ScriptedRoller>>);

impl ScriptedDice {
    pub fn push(&self, rolls: &[u32]) {
        self.0.lock().unwrap().push(rolls.iter().copied());
    }

    pub fn remaining(&self) -> usize {
        self.0.lock().unwrap().remaining()
    }
}

impl DiceRoller for ScriptedDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.0.lock().unwrap().roll_die(sides)
    }
}

/// A session plus the dice it rolls
pub struct TestEncounter {
    pub session: CombatSession,
    pub dice: ScriptedDice,
}

impl TestEncounter {
    pub fn new(creatures: Vec<Creature>) -> Self {
        let dice = ScriptedDice::default();
        let mut session = CombatSession::new(Box::new(dice.clone()));
        for creature in creatures {
            session.register_creature(creature);
        }
        Self { session, dice }
    }

    /// Queue rolls for the next operations
    pub fn rolls(&self, rolls: &[u32]) {
        self.dice.push(rolls);
    }

    /// Roll initiative with one d20 per creature, in roster order
    pub fn start(&mut self, initiative: &[u32]) -> InitiativeOutcome {
        self.rolls(initiative);
        self.session.roll_initiative_for_all()
    }

    /// Creature by id; panics if missing
    pub fn get(&self, id: &str) -> &Creature {
        self.session
            .creature(id)
            .unwrap_or_else(|| panic!("no creature {}", id))
    }

    pub fn events(&self) -> Vec<CombatEvent> {
        self.session
            .history()
            .iter()
            .map(|e| e.event.clone())
            .collect()
    }

    /// The `type` tag of every event so far
    pub fn event_types(&self) -> Vec<String> {
        self.session
            .history()
            .iter()
            .map(|e| {
                let value = serde_json::to_value(&e.event).unwrap();
                value["type"].as_str().unwrap_or_default().to_string()
            })
            .collect()
    }

    pub fn last_event(&self) -> Option<CombatEvent> {
        self.session.history().back().map(|e| e.event.clone())
    }
}

impl Deref for TestEncounter {
    type Target = CombatSession;

    fn deref(&self) -> &CombatSession {
        &self.session
    }
}

impl DerefMut for TestEncounter {
    fn deref_mut(&mut self) -> &mut CombatSession {
        &mut self.session
    }
}
