//! Combat session orchestration
//!
//! A [`CombatSession`] owns the roster, the initiative order, and every
//! per-encounter ledger. All mutation goes through `&mut self`, so exactly one
//! owner drives an encounter at a time; [`SessionHandle`](super::handle::SessionHandle)
//! moves that owner into a task for callers that need to share it.
//!
//! Unknown creature ids are treated as stale references: math operations
//! return `None` and spend-style operations return
//! [`CombatError::UnknownCreature`]. Nothing here panics on bad input.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::attack::{resolve_attack, AttackModifiers, AttackResult};
use super::conditions::{action_blocker, can_move, ActiveCondition, Condition, MAX_EXHAUSTION};
use super::creature::{Ability, Creature, Faction, Position};
use super::damage::{apply_damage, DamageOptions, DamageResult, DamageType};
use super::death::{self, DeathSaveOutcome};
use super::dice::{D20Roll, DiceRoll, DiceRoller, RollMode, ThreadRoller};
use super::economy::{ActionEconomy, ActionEconomyTracker, ActionKind};
use super::error::CombatError;
use super::events::{CombatEvent, EventBus, EventEnvelope, InitiativeEntry};
use super::rest::{self, RestOutcome};
use super::timer::{TurnTimer, TurnTimerStatus};
use super::trackers::{EncounterTrackers, HelpGrant, ReadiedAction};
use crate::config::EngineConfig;

/// Where the encounter stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CombatPhase {
    NotStarted,
    InCombat { round: u32, turn_index: usize },
    Ended,
}

/// Initiative order plus the raw d20 each creature rolled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiativeOutcome {
    pub order: Vec<InitiativeEntry>,
    pub rolls: HashMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealResult {
    pub target_id: String,
    /// Hit points actually restored after clamping
    pub amount: u32,
    pub new_hit_points: u32,
    pub regained_consciousness: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingThrowResult {
    pub creature_id: String,
    pub ability: Ability,
    pub dc: i32,
    /// None when the save failed automatically
    pub roll: Option<D20Roll>,
    pub bonus: i32,
    pub total: i32,
    pub success: bool,
    pub auto_failed: bool,
}

/// A weapon attack taken as the creature's action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackAction {
    pub attacker_id: String,
    pub target_id: String,
    #[serde(default)]
    pub modifiers: AttackModifiers,
    pub damage: DiceRoll,
    pub damage_type: DamageType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackActionOutcome {
    pub attack: AttackResult,
    /// Present only on a hit
    pub damage: Option<DamageResult>,
}

/// Read-only view of a session, for persistence and display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: CombatPhase,
    pub current_creature_id: Option<String>,
    pub initiative: Vec<InitiativeEntry>,
    pub creatures: Vec<Creature>,
}

/// One combat encounter
pub struct CombatSession {
    id: Uuid,
    /// Insertion order breaks initiative ties
    roster: Vec<Creature>,
    phase: CombatPhase,
    initiative: Vec<InitiativeEntry>,
    economy: ActionEconomyTracker,
    trackers: EncounterTrackers,
    events: EventBus,
    roller: Box<dyn DiceRoller>,
    turn_limit: Option<Duration>,
    timer: Option<TurnTimer>,
}

impl fmt::Debug for CombatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombatSession")
            .field("id", &self.id)
            .field("roster", &self.roster.len())
            .field("phase", &self.phase)
            .field("turn_limit", &self.turn_limit)
            .finish()
    }
}

impl Default for CombatSession {
    fn default() -> Self {
        Self::new(Box::new(ThreadRoller))
    }
}

fn find<'a>(roster: &'a [Creature], id: &str) -> Option<&'a Creature> {
    roster.iter().find(|c| c.id == id)
}

fn find_mut<'a>(roster: &'a mut [Creature], id: &str) -> Option<&'a mut Creature> {
    roster.iter_mut().find(|c| c.id == id)
}

fn stale(id: &str) {
    debug!("ignoring stale reference to creature {}", id);
}

fn unknown(id: &str) -> CombatError {
    CombatError::UnknownCreature(id.to_string())
}

fn death_save_event(outcome: &DeathSaveOutcome) -> CombatEvent {
    CombatEvent::DeathSave {
        creature_id: outcome.creature_id.clone(),
        roll: outcome.roll,
        successes: outcome.successes,
        failures: outcome.failures,
        stabilized: outcome.stabilized,
    }
}

/// Movement ceiling from the creature's current conditions, checked lazily
/// at spend time rather than baked into the turn-start reset
fn movement_cap(creature: &Creature, ledger: &ActionEconomy) -> u32 {
    let effects = creature.conditions.effects();
    if effects.speed_zero || effects.cannot_move {
        0
    } else if effects.halves_speed {
        ledger.movement_max / 2
    } else {
        u32::MAX
    }
}

impl CombatSession {
    pub fn new(roller: Box<dyn DiceRoller>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            roster: Vec::new(),
            phase: CombatPhase::NotStarted,
            initiative: Vec::new(),
            economy: ActionEconomyTracker::new(),
            trackers: EncounterTrackers::new(),
            events: EventBus::new(id),
            roller,
            turn_limit: None,
            timer: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let mut session = Self::new(config.roller());
        session.events.set_history_limit(config.event_history_limit);
        match config.turn_limit() {
            Some(limit) => session.with_turn_limit(limit),
            None => session,
        }
    }

    pub fn with_turn_limit(mut self, limit: Duration) -> Self {
        self.turn_limit = Some(limit);
        self
    }

    // ---- queries ----

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<EventEnvelope> {
        self.events.subscribe()
    }

    /// The most recent events, up to the bus's history limit
    pub fn history(&self) -> &VecDeque<EventEnvelope> {
        self.events.history()
    }

    pub fn phase(&self) -> CombatPhase {
        self.phase
    }

    pub fn is_in_combat(&self) -> bool {
        matches!(self.phase, CombatPhase::InCombat { .. })
    }

    /// Current round, or 0 outside combat
    pub fn round(&self) -> u32 {
        match self.phase {
            CombatPhase::InCombat { round, .. } => round,
            _ => 0,
        }
    }

    pub fn current_creature_id(&self) -> Option<&str> {
        match self.phase {
            CombatPhase::InCombat { turn_index, .. } => self
                .initiative
                .get(turn_index)
                .map(|e| e.creature_id.as_str()),
            _ => None,
        }
    }

    pub fn initiative_order(&self) -> &[InitiativeEntry] {
        &self.initiative
    }

    pub fn creature(&self, id: &str) -> Option<&Creature> {
        find(&self.roster, id)
    }

    pub fn creatures(&self) -> &[Creature] {
        &self.roster
    }

    pub fn economy(&self, id: &str) -> Option<&ActionEconomy> {
        self.economy.get(id)
    }

    pub fn trackers(&self) -> &EncounterTrackers {
        &self.trackers
    }

    /// Grid distance in feet, if both positions are known
    pub fn distance_between(&self, a: &str, b: &str) -> Option<u32> {
        find(&self.roster, a)?.distance_to(find(&self.roster, b)?)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            phase: self.phase,
            current_creature_id: self.current_creature_id().map(str::to_string),
            initiative: self.initiative.clone(),
            creatures: self.roster.clone(),
        }
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.roster.iter().position(|c| c.id == id)
    }

    // ---- roster ----

    /// Add or replace a creature. Returns true if it is new to the roster.
    /// Never touches the initiative order.
    pub fn register_creature(&mut self, mut creature: Creature) -> bool {
        creature.normalize();
        match self.index_of(&creature.id) {
            Some(index) => {
                if creature.position.is_none() {
                    creature.position = self.roster[index].position;
                }
                debug!("updating creature {}", creature.id);
                self.roster[index] = creature;
                false
            }
            None => {
                info!("{} ({}) joins the encounter", creature.name, creature.id);
                self.roster.push(creature);
                true
            }
        }
    }

    /// Remove a creature from the roster and the initiative order. If it was
    /// the current creature, the turn passes to the next one in order.
    pub fn dismiss_creature(&mut self, id: &str) -> Option<Creature> {
        let Some(index) = self.index_of(id) else {
            stale(id);
            return None;
        };
        let creature = self.roster.remove(index);
        self.economy.remove(id);
        self.trackers.clear_creature(id);
        info!("{} leaves the encounter", id);

        let Some(position) = self.initiative.iter().position(|e| e.creature_id == id) else {
            return Some(creature);
        };
        self.initiative.remove(position);

        if let CombatPhase::InCombat {
            mut round,
            mut turn_index,
        } = self.phase
        {
            if self.initiative.is_empty() {
                self.end_combat();
            } else if position < turn_index {
                self.phase = CombatPhase::InCombat {
                    round,
                    turn_index: turn_index - 1,
                };
            } else if position == turn_index {
                if turn_index >= self.initiative.len() {
                    turn_index = 0;
                    round += 1;
                    self.phase = CombatPhase::InCombat { round, turn_index };
                    self.events.emit(CombatEvent::Round { round });
                }
                self.begin_turn(turn_index);
            }
        }
        Some(creature)
    }

    /// Positions come from the grid layer; the engine only stores them
    pub fn update_position(&mut self, id: &str, position: Position) -> bool {
        match find_mut(&mut self.roster, id) {
            Some(creature) => {
                creature.position = Some(position);
                true
            }
            None => {
                stale(id);
                false
            }
        }
    }

    // ---- initiative and turns ----

    fn roll_entry(roller: &mut dyn DiceRoller, creature: &Creature) -> InitiativeEntry {
        let d20 = roller.d20();
        InitiativeEntry {
            creature_id: creature.id.clone(),
            total: d20 as i32 + creature.abilities.dexterity,
            tie_break: d20,
        }
    }

    /// Roll d20 + DEX for every creature and start round 1.
    ///
    /// Sorted by total, then raw d20, then roster order. Calling this again
    /// mid-encounter re-rolls everyone and resets the round to 1; use
    /// [`add_to_initiative`](Self::add_to_initiative) to slot in a late joiner.
    pub fn roll_initiative_for_all(&mut self) -> InitiativeOutcome {
        let mut rolled: Vec<(usize, InitiativeEntry)> = Vec::with_capacity(self.roster.len());
        for (index, creature) in self.roster.iter().enumerate() {
            rolled.push((index, Self::roll_entry(self.roller.as_mut(), creature)));
        }
        rolled.sort_by(|(ia, a), (ib, b)| {
            b.total
                .cmp(&a.total)
                .then(b.tie_break.cmp(&a.tie_break))
                .then(ia.cmp(ib))
        });

        let rolls = rolled
            .iter()
            .map(|(_, e)| (e.creature_id.clone(), e.tie_break))
            .collect();
        self.initiative = rolled.into_iter().map(|(_, e)| e).collect();
        let order = self.initiative.clone();

        if order.is_empty() {
            debug!("no creatures to roll initiative for");
            return InitiativeOutcome { order, rolls };
        }

        self.economy.clear();
        for creature in &self.roster {
            self.economy.reset(&creature.id, creature.speed);
        }
        self.phase = CombatPhase::InCombat {
            round: 1,
            turn_index: 0,
        };
        info!(session = %self.id, "initiative rolled for {} creatures", order.len());
        self.events.emit(CombatEvent::Initiative {
            order: order.clone(),
        });
        self.begin_turn(0);

        InitiativeOutcome { order, rolls }
    }

    /// Insert a creature into the running order without resetting the
    /// round. It acts when the pointer next reaches its slot.
    pub fn add_to_initiative(&mut self, id: &str) -> Option<InitiativeEntry> {
        let CombatPhase::InCombat { round, turn_index } = self.phase else {
            debug!("cannot add {} to initiative outside combat", id);
            return None;
        };
        if let Some(existing) = self.initiative.iter().find(|e| e.creature_id == id) {
            return Some(existing.clone());
        }
        let Some(creature) = find(&self.roster, id) else {
            stale(id);
            return None;
        };

        let entry = Self::roll_entry(self.roller.as_mut(), creature);
        let speed = creature.speed;
        // ties go after creatures already in the order
        let slot = self
            .initiative
            .iter()
            .position(|e| (e.total, e.tie_break) < (entry.total, entry.tie_break))
            .unwrap_or(self.initiative.len());
        self.initiative.insert(slot, entry.clone());
        if slot <= turn_index {
            self.phase = CombatPhase::InCombat {
                round,
                turn_index: turn_index + 1,
            };
        }
        self.economy.reset(id, speed);

        info!("{} joins initiative at {} with {}", id, slot, entry.total);
        self.events.emit(CombatEvent::Initiative {
            order: self.initiative.clone(),
        });
        Some(entry)
    }

    /// Start-of-turn bookkeeping for the entry at `index`
    fn begin_turn(&mut self, index: usize) {
        let Some(entry) = self.initiative.get(index) else {
            return;
        };
        let creature_id = entry.creature_id.clone();
        let round = self.round();

        self.trackers.start_turn(&creature_id);
        let mut expired = Vec::new();
        if let Some(creature) = find_mut(&mut self.roster, &creature_id) {
            expired = creature.conditions.tick_turn_start();
            self.economy.reset(&creature_id, creature.speed);
        }
        self.timer = self
            .turn_limit
            .map(|limit| TurnTimer::start(&creature_id, limit, Instant::now()));

        info!("round {}: {}'s turn", round, creature_id);
        self.events.emit(CombatEvent::Turn {
            creature_id: creature_id.clone(),
            round,
        });
        for condition in expired {
            debug!("{} on {} has worn off", condition, creature_id);
            self.events.emit(CombatEvent::Condition {
                creature_id: creature_id.clone(),
                condition,
                applied: false,
            });
        }
    }

    /// Advance to the next creature, wrapping into a new round.
    /// Returns the id of the creature whose turn it now is.
    pub fn next_turn(&mut self) -> Option<String> {
        let CombatPhase::InCombat { round, turn_index } = self.phase else {
            debug!("next_turn called outside combat");
            return None;
        };
        if self.initiative.is_empty() {
            return None;
        }

        if let Some(outgoing) = self.initiative.get(turn_index) {
            let outgoing = outgoing.creature_id.clone();
            self.trackers.end_turn(&outgoing);
        }

        let mut round = round;
        let mut next = turn_index + 1;
        if next >= self.initiative.len() {
            next = 0;
            round += 1;
            self.phase = CombatPhase::InCombat {
                round,
                turn_index: next,
            };
            info!("round {} begins", round);
            self.events.emit(CombatEvent::Round { round });
        } else {
            self.phase = CombatPhase::InCombat {
                round,
                turn_index: next,
            };
        }

        self.begin_turn(next);
        self.current_creature_id().map(str::to_string)
    }

    /// Leave combat. The roster stays for post-combat resolution.
    pub fn end_combat(&mut self) -> bool {
        let CombatPhase::InCombat { round, .. } = self.phase else {
            return false;
        };
        self.phase = CombatPhase::Ended;
        self.initiative.clear();
        self.economy.clear();
        self.trackers.clear();
        self.timer = None;

        info!(session = %self.id, "combat ended after {} rounds", round);
        self.events.emit(CombatEvent::CombatEnded { rounds: round });
        true
    }

    /// Report the advisory turn timer. Never changes combat state.
    pub fn tick(&self, now: Instant) -> TurnTimerStatus {
        match (&self.timer, self.is_in_combat()) {
            (Some(timer), true) => timer.status(now),
            _ => TurnTimerStatus::Disabled,
        }
    }

    // ---- attack, damage, healing ----

    /// Roll an attack. Does not spend the action; see
    /// [`use_action`](Self::use_action) and
    /// [`perform_attack_action`](Self::perform_attack_action).
    pub fn attack(
        &mut self,
        attacker_id: &str,
        target_id: &str,
        modifiers: AttackModifiers,
    ) -> Option<AttackResult> {
        let Some(attacker) = find(&self.roster, attacker_id) else {
            stale(attacker_id);
            return None;
        };
        let Some(target) = find(&self.roster, target_id) else {
            stale(target_id);
            return None;
        };

        let result = resolve_attack(
            attacker,
            target,
            modifiers,
            &self.trackers,
            self.roller.as_mut(),
        );

        if result.help_used {
            self.trackers.consume_help(attacker_id, target_id);
        }
        if self.trackers.reveal(attacker_id) {
            debug!("{} is revealed by attacking", attacker_id);
        }

        info!(
            "{} attacks {}: {} vs AC {} -> {}",
            attacker_id,
            target_id,
            result.total,
            result.target_ac,
            if result.is_critical {
                "critical"
            } else if result.hits {
                "hit"
            } else {
                "miss"
            }
        );
        self.events.emit(CombatEvent::Attack {
            attacker_id: attacker_id.to_string(),
            target_id: target_id.to_string(),
            result: result.clone(),
        });
        Some(result)
    }

    /// Run damage through the pipeline, then settle what it means for the
    /// target: monsters die at 0, characters fall unconscious and start
    /// rolling death saves, and damage beyond max HP kills outright.
    pub fn deal_damage(
        &mut self,
        target_id: &str,
        amount: i32,
        damage_type: DamageType,
        opts: DamageOptions,
    ) -> Option<DamageResult> {
        let Some(index) = self.index_of(target_id) else {
            stale(target_id);
            return None;
        };
        let already_dead = self.roster[index].is_dead();
        let result = apply_damage(&mut self.roster[index], amount, damage_type, opts);

        debug!(
            "{} takes {} {} damage ({} HP left)",
            target_id, result.amount, damage_type, result.new_hit_points
        );
        self.events.emit(CombatEvent::Damage {
            target_id: target_id.to_string(),
            amount: result.amount,
            damage_type,
            is_critical: result.is_critical,
            was_resisted: result.was_resisted,
            was_vulnerable: result.was_vulnerable,
            was_immune: result.was_immune,
        });

        if !already_dead {
            self.settle_damage(index, &result);
        }
        Some(result)
    }

    fn settle_damage(&mut self, index: usize, result: &DamageResult) {
        let creature = &mut self.roster[index];
        let id = creature.id.clone();

        if creature.faction == Faction::Monster {
            if creature.hit_points == 0 {
                creature.dead = true;
                info!("{} is slain", id);
                self.events.emit(CombatEvent::Death {
                    creature_id: id,
                    was_instant_death: false,
                });
            }
            return;
        }

        if !(result.dropped_to_zero || (result.was_at_zero && result.overflow > 0)) {
            return;
        }

        if result.overflow >= creature.max_hit_points {
            creature.dead = true;
            info!("{} is killed outright by massive damage", id);
            self.events.emit(CombatEvent::Death {
                creature_id: id,
                was_instant_death: true,
            });
            return;
        }

        if result.dropped_to_zero {
            creature.death_saves.reset();
            creature.fall_unconscious();
            info!("{} drops to 0 hit points", id);
            self.events.emit(CombatEvent::Condition {
                creature_id: id,
                condition: Condition::Unconscious,
                applied: true,
            });
            return;
        }

        let outcome = death::add_death_save_failure(creature, result.is_critical);
        self.events.emit(death_save_event(&outcome));
        if outcome.died {
            self.events.emit(CombatEvent::Death {
                creature_id: id,
                was_instant_death: false,
            });
        }
    }

    /// Restore hit points up to the maximum. The dead stay dead.
    pub fn heal(&mut self, target_id: &str, amount: i32) -> Option<HealResult> {
        let Some(creature) = find_mut(&mut self.roster, target_id) else {
            stale(target_id);
            return None;
        };
        if creature.is_dead() {
            debug!("{} is dead and cannot be healed", target_id);
            return Some(HealResult {
                target_id: target_id.to_string(),
                amount: 0,
                new_hit_points: creature.hit_points,
                regained_consciousness: false,
            });
        }

        let was_down = creature.hit_points == 0;
        let restored = creature.restore_hit_points(amount.max(0) as u32);
        let mut regained = false;
        if was_down && creature.hit_points > 0 {
            creature.death_saves.reset();
            regained = creature.regain_consciousness();
        }
        let result = HealResult {
            target_id: target_id.to_string(),
            amount: restored,
            new_hit_points: creature.hit_points,
            regained_consciousness: regained,
        };

        if regained {
            info!("{} is back on their feet", target_id);
            self.events.emit(CombatEvent::Condition {
                creature_id: target_id.to_string(),
                condition: Condition::Unconscious,
                applied: false,
            });
        }
        self.events.emit(CombatEvent::Healing {
            target_id: target_id.to_string(),
            amount: restored,
            new_hp: result.new_hit_points,
        });
        Some(result)
    }

    /// Replace temporary hit points. Returns the new pool.
    pub fn grant_temporary_hp(&mut self, id: &str, amount: u32) -> Option<u32> {
        let Some(creature) = find_mut(&mut self.roster, id) else {
            stale(id);
            return None;
        };
        creature.grant_temporary_hp(amount);
        Some(creature.temporary_hit_points)
    }

    /// The attack action end to end: spend the action, roll to hit, and on a
    /// hit roll damage (doubled dice on a critical) and apply it. Runs as one
    /// step so nothing can interleave between the economy check and the
    /// damage.
    pub fn perform_attack_action(
        &mut self,
        action: &AttackAction,
    ) -> Result<AttackActionOutcome, CombatError> {
        if find(&self.roster, &action.target_id).is_none() {
            return Err(unknown(&action.target_id));
        }
        action.damage.validate()?;
        self.use_action(&action.attacker_id)?;

        let attack = self
            .attack(&action.attacker_id, &action.target_id, action.modifiers)
            .ok_or_else(|| unknown(&action.attacker_id))?;

        let damage = if attack.hits {
            let dice = if attack.is_critical {
                action.damage.critical()
            } else {
                action.damage
            };
            let amount = dice.roll(self.roller.as_mut());
            let opts = DamageOptions {
                is_critical: attack.is_critical,
            };
            self.deal_damage(&action.target_id, amount, action.damage_type, opts)
        } else {
            None
        };

        Ok(AttackActionOutcome { attack, damage })
    }

    // ---- death saves ----

    pub fn roll_death_save(&mut self, id: &str) -> Option<DeathSaveOutcome> {
        let Some(creature) = find_mut(&mut self.roster, id) else {
            stale(id);
            return None;
        };
        let outcome = death::roll_death_save(creature, self.roller.as_mut());
        if outcome.roll == 0 {
            return Some(outcome);
        }

        self.events.emit(death_save_event(&outcome));
        if outcome.regained_consciousness {
            self.events.emit(CombatEvent::Condition {
                creature_id: id.to_string(),
                condition: Condition::Unconscious,
                applied: false,
            });
            self.events.emit(CombatEvent::Healing {
                target_id: id.to_string(),
                amount: 1,
                new_hp: 1,
            });
        }
        if outcome.died {
            self.events.emit(CombatEvent::Death {
                creature_id: id.to_string(),
                was_instant_death: false,
            });
        }
        Some(outcome)
    }

    /// Damage-while-down entry point for callers that resolve hits outside
    /// [`deal_damage`](Self::deal_damage)
    pub fn add_death_save_failure(&mut self, id: &str, is_critical: bool) -> Option<DeathSaveOutcome> {
        let Some(creature) = find_mut(&mut self.roster, id) else {
            stale(id);
            return None;
        };
        if creature.is_dead() || creature.hit_points > 0 {
            return Some(death::add_death_save_failure(creature, is_critical));
        }

        let outcome = death::add_death_save_failure(creature, is_critical);
        self.events.emit(death_save_event(&outcome));
        if outcome.died {
            self.events.emit(CombatEvent::Death {
                creature_id: id.to_string(),
                was_instant_death: false,
            });
        }
        Some(outcome)
    }

    // ---- conditions and saves ----

    /// Apply a condition. Returns true if the creature did not already have
    /// it. Exhaustion raises the level by one instead.
    pub fn add_condition(&mut self, id: &str, condition: ActiveCondition) -> Option<bool> {
        if condition.condition == Condition::Exhaustion {
            return self.add_exhaustion(id).map(|level| level == 1);
        }
        let Some(creature) = find_mut(&mut self.roster, id) else {
            stale(id);
            return None;
        };
        let tag = condition.condition;
        let added = creature.conditions.add(condition);
        if added {
            debug!("{} is now {}", id, tag);
            self.events.emit(CombatEvent::Condition {
                creature_id: id.to_string(),
                condition: tag,
                applied: true,
            });
        }
        Some(added)
    }

    /// Remove a condition. Removing exhaustion clears every level.
    pub fn remove_condition(&mut self, id: &str, condition: Condition) -> Option<bool> {
        let Some(creature) = find_mut(&mut self.roster, id) else {
            stale(id);
            return None;
        };
        let removed = creature.conditions.remove(condition);
        if removed {
            debug!("{} is no longer {}", id, condition);
            self.events.emit(CombatEvent::Condition {
                creature_id: id.to_string(),
                condition,
                applied: false,
            });
        }
        Some(removed)
    }

    /// Raise exhaustion by one level. The last level is death.
    pub fn add_exhaustion(&mut self, id: &str) -> Option<u8> {
        let Some(creature) = find_mut(&mut self.roster, id) else {
            stale(id);
            return None;
        };
        let level = creature.conditions.add_exhaustion();
        let died = level >= MAX_EXHAUSTION && !creature.dead;
        if died {
            creature.dead = true;
        }

        info!("{} is at exhaustion level {}", id, level);
        if level == 1 {
            self.events.emit(CombatEvent::Condition {
                creature_id: id.to_string(),
                condition: Condition::Exhaustion,
                applied: true,
            });
        }
        if died {
            self.events.emit(CombatEvent::Death {
                creature_id: id.to_string(),
                was_instant_death: false,
            });
        }
        Some(level)
    }

    /// d20 + ability modifier (+ proficiency if proficient) against a DC.
    /// Strength and Dexterity saves fail outright while paralyzed, petrified,
    /// stunned, or unconscious.
    pub fn saving_throw(
        &mut self,
        id: &str,
        ability: Ability,
        dc: i32,
        mode: RollMode,
    ) -> Option<SavingThrowResult> {
        let Some(creature) = find(&self.roster, id) else {
            stale(id);
            return None;
        };
        let effects = creature.conditions.effects();
        let bonus = creature.save_bonus(ability);

        if ability.is_physical() && effects.auto_fail_str_dex_saves {
            debug!("{} automatically fails a {:?} save", id, ability);
            return Some(SavingThrowResult {
                creature_id: id.to_string(),
                ability,
                dc,
                roll: None,
                bonus,
                total: 0,
                success: false,
                auto_failed: true,
            });
        }

        let disadvantage = mode == RollMode::Disadvantage
            || effects.disadvantage_on_saves
            || (ability == Ability::Dexterity && effects.disadvantage_on_dex_saves);
        let mode = RollMode::from_flags(mode == RollMode::Advantage, disadvantage);
        let d20 = D20Roll::roll(self.roller.as_mut(), mode);
        let total = d20.kept as i32 + bonus;

        Some(SavingThrowResult {
            creature_id: id.to_string(),
            ability,
            dc,
            roll: Some(d20),
            bonus,
            total,
            success: total >= dc,
            auto_failed: false,
        })
    }

    // ---- action economy ----

    /// Shared legality checks: in combat, alive and conscious, and (for
    /// anything but a reaction) on their own turn
    fn ensure_ready(&self, id: &str, own_turn: bool) -> Result<(), CombatError> {
        let creature = find(&self.roster, id).ok_or_else(|| unknown(id))?;
        if !self.is_in_combat() {
            return Err(CombatError::NotInCombat);
        }
        if own_turn && self.current_creature_id() != Some(id) {
            return Err(CombatError::NotCreaturesTurn(id.to_string()));
        }
        if creature.is_down() {
            return Err(CombatError::CreatureDown(id.to_string()));
        }
        Ok(())
    }

    fn check_spend(&self, id: &str, kind: ActionKind) -> Result<(), CombatError> {
        self.ensure_ready(id, kind != ActionKind::Reaction)?;
        let creature = find(&self.roster, id).ok_or_else(|| unknown(id))?;
        if let Some(condition) = action_blocker(&creature.conditions) {
            return Err(CombatError::Incapacitated {
                creature_id: id.to_string(),
                condition,
            });
        }
        let ledger = self.economy.get(id).ok_or(CombatError::NotInCombat)?;
        if !ledger.has(kind) {
            return Err(CombatError::ActionSpent(kind));
        }
        Ok(())
    }

    fn spend(&mut self, id: &str, kind: ActionKind) -> Result<(), CombatError> {
        self.check_spend(id, kind)?;
        let ledger = self.economy.get_mut(id).ok_or(CombatError::NotInCombat)?;
        ledger.spend(kind)?;
        debug!("{} uses their {}", id, kind);
        Ok(())
    }

    pub fn use_action(&mut self, id: &str) -> Result<(), CombatError> {
        self.spend(id, ActionKind::Action)
    }

    pub fn use_bonus_action(&mut self, id: &str) -> Result<(), CombatError> {
        self.spend(id, ActionKind::BonusAction)
    }

    /// Reactions may be taken on any creature's turn
    pub fn use_reaction(&mut self, id: &str) -> Result<(), CombatError> {
        self.spend(id, ActionKind::Reaction)
    }

    pub fn use_object_interaction(&mut self, id: &str) -> Result<(), CombatError> {
        self.spend(id, ActionKind::ObjectInteraction)
    }

    /// Spend movement in feet, returning what is left
    pub fn move_creature(&mut self, id: &str, feet: u32) -> Result<u32, CombatError> {
        self.ensure_ready(id, true)?;
        let creature = find(&self.roster, id).ok_or_else(|| unknown(id))?;
        if !can_move(&creature.conditions) || creature.effective_speed() == 0 {
            return Err(CombatError::CannotMove(id.to_string()));
        }
        let ledger = self.economy.get_mut(id).ok_or(CombatError::NotInCombat)?;
        let cap = movement_cap(creature, ledger);
        ledger.spend_movement(feet, cap)
    }

    /// Move to a grid square, paying for the distance from the current
    /// square. A creature with no known position is simply placed.
    pub fn move_to(&mut self, id: &str, position: Position) -> Result<u32, CombatError> {
        let from = find(&self.roster, id).ok_or_else(|| unknown(id))?.position;
        let feet = from.map_or(0, |from| from.distance_feet(&position));
        let remaining = self.move_creature(id, feet)?;
        if let Some(creature) = find_mut(&mut self.roster, id) {
            creature.position = Some(position);
        }
        Ok(remaining)
    }

    /// Standing from prone costs half the creature's speed
    pub fn stand_up(&mut self, id: &str) -> Result<u32, CombatError> {
        let creature = find(&self.roster, id).ok_or_else(|| unknown(id))?;
        if !creature.conditions.has(Condition::Prone) {
            let ledger = self.economy.get(id).ok_or(CombatError::NotInCombat)?;
            return Ok(ledger.remaining_movement(movement_cap(creature, ledger)));
        }
        let cost = creature.speed / 2;
        let remaining = self.move_creature(id, cost)?;
        self.remove_condition(id, Condition::Prone);
        Ok(remaining)
    }

    // ---- standard actions ----

    /// Extra movement equal to speed for the rest of the turn
    pub fn dash(&mut self, id: &str) -> Result<(), CombatError> {
        self.use_action(id)?;
        let speed = find(&self.roster, id).map_or(0, |c| c.speed);
        if let Some(ledger) = self.economy.get_mut(id) {
            ledger.add_movement(speed);
        }
        Ok(())
    }

    pub fn disengage(&mut self, id: &str) -> Result<(), CombatError> {
        self.use_action(id)?;
        self.trackers.set_disengaged(id);
        Ok(())
    }

    /// Attacks against the creature have disadvantage until its next turn
    pub fn dodge(&mut self, id: &str) -> Result<(), CombatError> {
        self.use_action(id)?;
        self.trackers.set_dodging(id);
        Ok(())
    }

    /// Hidden until the creature attacks. Whether the hide succeeds is the
    /// caller's stealth check; this only records it.
    pub fn hide(&mut self, id: &str) -> Result<(), CombatError> {
        self.use_action(id)?;
        self.trackers.set_hidden(id);
        Ok(())
    }

    /// Give `ally_id` advantage on its next attack against `target_id`
    pub fn help(&mut self, helper_id: &str, ally_id: &str, target_id: &str) -> Result<(), CombatError> {
        for id in [ally_id, target_id] {
            if find(&self.roster, id).is_none() {
                return Err(unknown(id));
            }
        }
        self.use_action(helper_id)?;
        self.trackers.grant_help(HelpGrant {
            helper_id: helper_id.to_string(),
            ally_id: ally_id.to_string(),
            target_id: target_id.to_string(),
        });
        Ok(())
    }

    pub fn ready_action(&mut self, id: &str, trigger: &str) -> Result<(), CombatError> {
        self.use_action(id)?;
        self.trackers.ready(ReadiedAction {
            creature_id: id.to_string(),
            trigger: trigger.to_string(),
        });
        Ok(())
    }

    /// Fire a readied action, spending the creature's reaction
    pub fn trigger_readied_action(&mut self, id: &str) -> Result<ReadiedAction, CombatError> {
        if find(&self.roster, id).is_none() {
            return Err(unknown(id));
        }
        if self.trackers.readied(id).is_none() {
            return Err(CombatError::NothingReadied(id.to_string()));
        }
        self.use_reaction(id)?;
        self.trackers
            .take_readied(id)
            .ok_or_else(|| CombatError::NothingReadied(id.to_string()))
    }

    // ---- rests ----

    /// Spend hit dice for each listed creature; `hit_dice_spent` maps id to
    /// dice count, missing ids spend none
    pub fn short_rest(
        &mut self,
        creature_ids: &[&str],
        hit_dice_spent: &HashMap<String, u32>,
    ) -> Vec<RestOutcome> {
        let mut outcomes = Vec::with_capacity(creature_ids.len());
        for &id in creature_ids {
            let Some(creature) = find_mut(&mut self.roster, id) else {
                stale(id);
                continue;
            };
            let was_down = creature.hit_points == 0;
            let dice = hit_dice_spent.get(id).copied().unwrap_or(0);
            let outcome = rest::short_rest(creature, dice, self.roller.as_mut());
            let new_hp = creature.hit_points;

            debug!("{} short rests: {:?}", id, outcome);
            self.emit_recovery(id, &outcome, was_down && new_hp > 0, new_hp);
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Full recovery for each listed creature, including their transient
    /// encounter markers
    pub fn long_rest(&mut self, creature_ids: &[&str]) -> Vec<RestOutcome> {
        let mut outcomes = Vec::with_capacity(creature_ids.len());
        for &id in creature_ids {
            self.trackers.clear_creature(id);
            let Some(creature) = find_mut(&mut self.roster, id) else {
                stale(id);
                continue;
            };
            let was_down = creature.hit_points == 0;
            let exhaustion_before = creature.conditions.exhaustion();
            let outcome = rest::long_rest(creature);
            let new_hp = creature.hit_points;

            debug!("{} long rests: {:?}", id, outcome);
            self.emit_recovery(id, &outcome, was_down && new_hp > 0, new_hp);
            if exhaustion_before > 0 && outcome.exhaustion == 0 {
                self.events.emit(CombatEvent::Condition {
                    creature_id: id.to_string(),
                    condition: Condition::Exhaustion,
                    applied: false,
                });
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    fn emit_recovery(&mut self, id: &str, outcome: &RestOutcome, regained: bool, new_hp: u32) {
        if regained {
            self.events.emit(CombatEvent::Condition {
                creature_id: id.to_string(),
                condition: Condition::Unconscious,
                applied: false,
            });
        }
        if outcome.hit_points_restored > 0 {
            self.events.emit(CombatEvent::Healing {
                target_id: id.to_string(),
                amount: outcome.hit_points_restored,
                new_hp,
            });
        }
    }
}
