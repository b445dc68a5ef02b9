//! Task-owned combat session.
//!
//! [`SessionHandle`] is a cloneable front for a [`SessionWorker`] that owns
//! one [`CombatSession`]. Every request is a [`SessionCommand`] with a
//! oneshot reply, processed in arrival order, so a check-then-consume
//! sequence such as [`SessionCommand::AttackAction`] never interleaves with
//! another caller's request.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

use super::attack::{AttackModifiers, AttackResult};
use super::conditions::{ActiveCondition, Condition};
use super::creature::{Ability, Creature, Position};
use super::damage::{DamageOptions, DamageResult, DamageType};
use super::death::DeathSaveOutcome;
use super::dice::RollMode;
use super::economy::{ActionEconomy, ActionKind};
use super::error::CombatError;
use super::events::{EventEnvelope, InitiativeEntry};
use super::rest::RestOutcome;
use super::session::{
    AttackAction, AttackActionOutcome, CombatSession, HealResult, InitiativeOutcome,
    SavingThrowResult, SessionSnapshot,
};
use super::timer::TurnTimerStatus;
use super::trackers::ReadiedAction;

const COMMAND_BUFFER: usize = 32;

pub type Result<T> = std::result::Result<T, HandleError>;

#[derive(Debug, Error)]
pub enum HandleError {
    #[error("session worker command channel closed")]
    CommandChannelClosed,

    #[error("session worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error(transparent)]
    Combat(#[from] CombatError),
}

/// Standard actions that spend the action and leave a tactical marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StandardAction {
    Dash,
    Disengage,
    Dodge,
    Hide,
    Help { ally_id: String, target_id: String },
    Ready { trigger: String },
}

/// Requests the worker understands
pub enum SessionCommand {
    Register {
        creature: Box<Creature>,
        reply: oneshot::Sender<bool>,
    },
    Dismiss {
        creature_id: String,
        reply: oneshot::Sender<Option<Creature>>,
    },
    UpdatePosition {
        creature_id: String,
        position: Position,
        reply: oneshot::Sender<bool>,
    },
    RollInitiative {
        reply: oneshot::Sender<InitiativeOutcome>,
    },
    AddToInitiative {
        creature_id: String,
        reply: oneshot::Sender<Option<InitiativeEntry>>,
    },
    NextTurn {
        reply: oneshot::Sender<Option<String>>,
    },
    /// Spend the action, roll to hit, and apply damage in one step
    AttackAction {
        action: AttackAction,
        reply: oneshot::Sender<std::result::Result<AttackActionOutcome, CombatError>>,
    },
    Attack {
        attacker_id: String,
        target_id: String,
        modifiers: AttackModifiers,
        reply: oneshot::Sender<Option<AttackResult>>,
    },
    DealDamage {
        target_id: String,
        amount: i32,
        damage_type: DamageType,
        opts: DamageOptions,
        reply: oneshot::Sender<Option<DamageResult>>,
    },
    Heal {
        target_id: String,
        amount: i32,
        reply: oneshot::Sender<Option<HealResult>>,
    },
    GrantTemporaryHp {
        creature_id: String,
        amount: u32,
        reply: oneshot::Sender<Option<u32>>,
    },
    RollDeathSave {
        creature_id: String,
        reply: oneshot::Sender<Option<DeathSaveOutcome>>,
    },
    /// Damage taken at 0 HP that was resolved outside the session
    AddDeathSaveFailure {
        creature_id: String,
        is_critical: bool,
        reply: oneshot::Sender<Option<DeathSaveOutcome>>,
    },
    AddCondition {
        creature_id: String,
        condition: ActiveCondition,
        reply: oneshot::Sender<Option<bool>>,
    },
    RemoveCondition {
        creature_id: String,
        condition: Condition,
        reply: oneshot::Sender<Option<bool>>,
    },
    AddExhaustion {
        creature_id: String,
        reply: oneshot::Sender<Option<u8>>,
    },
    SavingThrow {
        creature_id: String,
        ability: Ability,
        dc: i32,
        mode: RollMode,
        reply: oneshot::Sender<Option<SavingThrowResult>>,
    },
    Spend {
        creature_id: String,
        kind: ActionKind,
        reply: oneshot::Sender<std::result::Result<(), CombatError>>,
    },
    Move {
        creature_id: String,
        feet: u32,
        reply: oneshot::Sender<std::result::Result<u32, CombatError>>,
    },
    MoveTo {
        creature_id: String,
        position: Position,
        reply: oneshot::Sender<std::result::Result<u32, CombatError>>,
    },
    StandUp {
        creature_id: String,
        reply: oneshot::Sender<std::result::Result<u32, CombatError>>,
    },
    Standard {
        creature_id: String,
        action: StandardAction,
        reply: oneshot::Sender<std::result::Result<(), CombatError>>,
    },
    /// Fire a readied action with the creature's reaction
    TriggerReadied {
        creature_id: String,
        reply: oneshot::Sender<std::result::Result<ReadiedAction, CombatError>>,
    },
    ShortRest {
        creature_ids: Vec<String>,
        hit_dice_spent: HashMap<String, u32>,
        reply: oneshot::Sender<Vec<RestOutcome>>,
    },
    LongRest {
        creature_ids: Vec<String>,
        reply: oneshot::Sender<Vec<RestOutcome>>,
    },
    EndCombat {
        reply: oneshot::Sender<bool>,
    },
    Tick {
        now: Instant,
        reply: oneshot::Sender<TurnTimerStatus>,
    },
    Subscribe {
        reply: oneshot::Sender<mpsc::UnboundedReceiver<EventEnvelope>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Creature {
        creature_id: String,
        reply: oneshot::Sender<Option<Creature>>,
    },
    Economy {
        creature_id: String,
        reply: oneshot::Sender<Option<ActionEconomy>>,
    },
    DistanceBetween {
        from_id: String,
        to_id: String,
        reply: oneshot::Sender<Option<u32>>,
    },
}

/// Background task that owns the session
pub struct SessionWorker {
    session: CombatSession,
    command_rx: mpsc::Receiver<SessionCommand>,
}

impl SessionWorker {
    pub fn new(session: CombatSession, command_rx: mpsc::Receiver<SessionCommand>) -> Self {
        Self {
            session,
            command_rx,
        }
    }

    /// Process commands until every handle is dropped
    pub async fn run(mut self) {
        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd);
        }
        debug!("session {} worker stopped", self.session.id());
    }

    fn handle_command(&mut self, cmd: SessionCommand) {
        let s = &mut self.session;
        // a caller that stopped waiting is not an error
        match cmd {
            SessionCommand::Register { creature, reply } => {
                let _ = reply.send(s.register_creature(*creature));
            }
            SessionCommand::Dismiss { creature_id, reply } => {
                let _ = reply.send(s.dismiss_creature(&creature_id));
            }
            SessionCommand::UpdatePosition {
                creature_id,
                position,
                reply,
            } => {
                let _ = reply.send(s.update_position(&creature_id, position));
            }
            SessionCommand::RollInitiative { reply } => {
                let _ = reply.send(s.roll_initiative_for_all());
            }
            SessionCommand::AddToInitiative { creature_id, reply } => {
                let _ = reply.send(s.add_to_initiative(&creature_id));
            }
            SessionCommand::NextTurn { reply } => {
                let _ = reply.send(s.next_turn());
            }
            SessionCommand::AttackAction { action, reply } => {
                let _ = reply.send(s.perform_attack_action(&action));
            }
            SessionCommand::Attack {
                attacker_id,
                target_id,
                modifiers,
                reply,
            } => {
                let _ = reply.send(s.attack(&attacker_id, &target_id, modifiers));
            }
            SessionCommand::DealDamage {
                target_id,
                amount,
                damage_type,
                opts,
                reply,
            } => {
                let _ = reply.send(s.deal_damage(&target_id, amount, damage_type, opts));
            }
            SessionCommand::Heal {
                target_id,
                amount,
                reply,
            } => {
                let _ = reply.send(s.heal(&target_id, amount));
            }
            SessionCommand::GrantTemporaryHp {
                creature_id,
                amount,
                reply,
            } => {
                let _ = reply.send(s.grant_temporary_hp(&creature_id, amount));
            }
            SessionCommand::RollDeathSave { creature_id, reply } => {
                let _ = reply.send(s.roll_death_save(&creature_id));
            }
            SessionCommand::AddDeathSaveFailure {
                creature_id,
                is_critical,
                reply,
            } => {
                let _ = reply.send(s.add_death_save_failure(&creature_id, is_critical));
            }
            SessionCommand::AddCondition {
                creature_id,
                condition,
                reply,
            } => {
                let _ = reply.send(s.add_condition(&creature_id, condition));
            }
            SessionCommand::RemoveCondition {
                creature_id,
                condition,
                reply,
            } => {
                let _ = reply.send(s.remove_condition(&creature_id, condition));
            }
            SessionCommand::AddExhaustion { creature_id, reply } => {
                let _ = reply.send(s.add_exhaustion(&creature_id));
            }
            SessionCommand::SavingThrow {
                creature_id,
                ability,
                dc,
                mode,
                reply,
            } => {
                let _ = reply.send(s.saving_throw(&creature_id, ability, dc, mode));
            }
            SessionCommand::Spend {
                creature_id,
                kind,
                reply,
            } => {
                let result = match kind {
                    ActionKind::Action => s.use_action(&creature_id),
                    ActionKind::BonusAction => s.use_bonus_action(&creature_id),
                    ActionKind::Reaction => s.use_reaction(&creature_id),
                    ActionKind::ObjectInteraction => s.use_object_interaction(&creature_id),
                };
                let _ = reply.send(result);
            }
            SessionCommand::Move {
                creature_id,
                feet,
                reply,
            } => {
                let _ = reply.send(s.move_creature(&creature_id, feet));
            }
            SessionCommand::MoveTo {
                creature_id,
                position,
                reply,
            } => {
                let _ = reply.send(s.move_to(&creature_id, position));
            }
            SessionCommand::StandUp { creature_id, reply } => {
                let _ = reply.send(s.stand_up(&creature_id));
            }
            SessionCommand::Standard {
                creature_id,
                action,
                reply,
            } => {
                let id = creature_id.as_str();
                let result = match action {
                    StandardAction::Dash => s.dash(id),
                    StandardAction::Disengage => s.disengage(id),
                    StandardAction::Dodge => s.dodge(id),
                    StandardAction::Hide => s.hide(id),
                    StandardAction::Help { ally_id, target_id } => {
                        s.help(id, &ally_id, &target_id)
                    }
                    StandardAction::Ready { trigger } => s.ready_action(id, &trigger),
                };
                let _ = reply.send(result);
            }
            SessionCommand::TriggerReadied { creature_id, reply } => {
                let _ = reply.send(s.trigger_readied_action(&creature_id));
            }
            SessionCommand::ShortRest {
                creature_ids,
                hit_dice_spent,
                reply,
            } => {
                let ids: Vec<&str> = creature_ids.iter().map(String::as_str).collect();
                let _ = reply.send(s.short_rest(&ids, &hit_dice_spent));
            }
            SessionCommand::LongRest {
                creature_ids,
                reply,
            } => {
                let ids: Vec<&str> = creature_ids.iter().map(String::as_str).collect();
                let _ = reply.send(s.long_rest(&ids));
            }
            SessionCommand::EndCombat { reply } => {
                let _ = reply.send(s.end_combat());
            }
            SessionCommand::Tick { now, reply } => {
                let _ = reply.send(s.tick(now));
            }
            SessionCommand::Subscribe { reply } => {
                let _ = reply.send(s.subscribe());
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(s.snapshot());
            }
            SessionCommand::Creature { creature_id, reply } => {
                let _ = reply.send(s.creature(&creature_id).cloned());
            }
            SessionCommand::Economy { creature_id, reply } => {
                let _ = reply.send(s.economy(&creature_id).copied());
            }
            SessionCommand::DistanceBetween {
                from_id,
                to_id,
                reply,
            } => {
                let _ = reply.send(s.distance_between(&from_id, &to_id));
            }
        }
    }
}

/// Client-facing handle to a running session
#[derive(Clone, Debug)]
pub struct SessionHandle {
    session_id: Uuid,
    command_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Move the session into its own task. The task ends when the last
    /// handle is dropped.
    pub fn spawn(session: CombatSession) -> Self {
        let session_id = session.id();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(SessionWorker::new(session, command_rx).run());
        debug!("spawned worker for session {}", session_id);
        Self {
            session_id,
            command_tx,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| HandleError::CommandChannelClosed)?;
        reply_rx.await.map_err(HandleError::ReplyChannelClosed)
    }

    pub async fn register_creature(&self, creature: Creature) -> Result<bool> {
        let creature = Box::new(creature);
        self.request(|reply| SessionCommand::Register { creature, reply })
            .await
    }

    pub async fn dismiss_creature(&self, creature_id: &str) -> Result<Option<Creature>> {
        let creature_id = creature_id.to_string();
        self.request(|reply| SessionCommand::Dismiss { creature_id, reply })
            .await
    }

    pub async fn update_position(&self, creature_id: &str, position: Position) -> Result<bool> {
        let creature_id = creature_id.to_string();
        self.request(|reply| SessionCommand::UpdatePosition {
            creature_id,
            position,
            reply,
        })
        .await
    }

    pub async fn roll_initiative_for_all(&self) -> Result<InitiativeOutcome> {
        self.request(|reply| SessionCommand::RollInitiative { reply })
            .await
    }

    pub async fn add_to_initiative(&self, creature_id: &str) -> Result<Option<InitiativeEntry>> {
        let creature_id = creature_id.to_string();
        self.request(|reply| SessionCommand::AddToInitiative { creature_id, reply })
            .await
    }

    pub async fn next_turn(&self) -> Result<Option<String>> {
        self.request(|reply| SessionCommand::NextTurn { reply }).await
    }

    pub async fn perform_attack_action(&self, action: AttackAction) -> Result<AttackActionOutcome> {
        let outcome = self
            .request(|reply| SessionCommand::AttackAction { action, reply })
            .await?;
        Ok(outcome?)
    }

    pub async fn attack(
        &self,
        attacker_id: &str,
        target_id: &str,
        modifiers: AttackModifiers,
    ) -> Result<Option<AttackResult>> {
        let attacker_id = attacker_id.to_string();
        let target_id = target_id.to_string();
        self.request(|reply| SessionCommand::Attack {
            attacker_id,
            target_id,
            modifiers,
            reply,
        })
        .await
    }

    pub async fn deal_damage(
        &self,
        target_id: &str,
        amount: i32,
        damage_type: DamageType,
        opts: DamageOptions,
    ) -> Result<Option<DamageResult>> {
        let target_id = target_id.to_string();
        self.request(|reply| SessionCommand::DealDamage {
            target_id,
            amount,
            damage_type,
            opts,
            reply,
        })
        .await
    }

    pub async fn heal(&self, target_id: &str, amount: i32) -> Result<Option<HealResult>> {
        let target_id = target_id.to_string();
        self.request(|reply| SessionCommand::Heal {
            target_id,
            amount,
            reply,
        })
        .await
    }

    /// Replace the creature's temporary hit points, returning the new pool
    pub async fn grant_temporary_hp(&self, creature_id: &str, amount: u32) -> Result<Option<u32>> {
        let creature_id = creature_id.to_string();
        self.request(|reply| SessionCommand::GrantTemporaryHp {
            creature_id,
            amount,
            reply,
        })
        .await
    }

    pub async fn roll_death_save(&self, creature_id: &str) -> Result<Option<DeathSaveOutcome>> {
        let creature_id = creature_id.to_string();
        self.request(|reply| SessionCommand::RollDeathSave { creature_id, reply })
            .await
    }

    pub async fn add_death_save_failure(
        &self,
        creature_id: &str,
        is_critical: bool,
    ) -> Result<Option<DeathSaveOutcome>> {
        let creature_id = creature_id.to_string();
        self.request(|reply| SessionCommand::AddDeathSaveFailure {
            creature_id,
            is_critical,
            reply,
        })
        .await
    }

    pub async fn add_condition(
        &self,
        creature_id: &str,
        condition: ActiveCondition,
    ) -> Result<Option<bool>> {
        let creature_id = creature_id.to_string();
        self.request(|reply| SessionCommand::AddCondition {
            creature_id,
            condition,
            reply,
        })
        .await
    }

    pub async fn remove_condition(
        &self,
        creature_id: &str,
        condition: Condition,
    ) -> Result<Option<bool>> {
        let creature_id = creature_id.to_string();
        self.request(|reply| SessionCommand::RemoveCondition {
            creature_id,
            condition,
            reply,
        })
        .await
    }

    pub async fn add_exhaustion(&self, creature_id: &str) -> Result<Option<u8>> {
        let creature_id = creature_id.to_string();
        self.request(|reply| SessionCommand::AddExhaustion { creature_id, reply })
            .await
    }

    pub async fn saving_throw(
        &self,
        creature_id: &str,
        ability: Ability,
        dc: i32,
        mode: RollMode,
    ) -> Result<Option<SavingThrowResult>> {
        let creature_id = creature_id.to_string();
        self.request(|reply| SessionCommand::SavingThrow {
            creature_id,
            ability,
            dc,
            mode,
            reply,
        })
        .await
    }

    pub async fn spend(&self, creature_id: &str, kind: ActionKind) -> Result<()> {
        let creature_id = creature_id.to_string();
        let result = self
            .request(|reply| SessionCommand::Spend {
                creature_id,
                kind,
                reply,
            })
            .await?;
        Ok(result?)
    }

    pub async fn move_creature(&self, creature_id: &str, feet: u32) -> Result<u32> {
        let creature_id = creature_id.to_string();
        let result = self
            .request(|reply| SessionCommand::Move {
                creature_id,
                feet,
                reply,
            })
            .await?;
        Ok(result?)
    }

    pub async fn move_to(&self, creature_id: &str, position: Position) -> Result<u32> {
        let creature_id = creature_id.to_string();
        let result = self
            .request(|reply| SessionCommand::MoveTo {
                creature_id,
                position,
                reply,
            })
            .await?;
        Ok(result?)
    }

    pub async fn stand_up(&self, creature_id: &str) -> Result<u32> {
        let creature_id = creature_id.to_string();
        let result = self
            .request(|reply| SessionCommand::StandUp { creature_id, reply })
            .await?;
        Ok(result?)
    }

    pub async fn standard_action(&self, creature_id: &str, action: StandardAction) -> Result<()> {
        let creature_id = creature_id.to_string();
        let result = self
            .request(|reply| SessionCommand::Standard {
                creature_id,
                action,
                reply,
            })
            .await?;
        Ok(result?)
    }

    pub async fn trigger_readied_action(&self, creature_id: &str) -> Result<ReadiedAction> {
        let creature_id = creature_id.to_string();
        let result = self
            .request(|reply| SessionCommand::TriggerReadied { creature_id, reply })
            .await?;
        Ok(result?)
    }

    pub async fn short_rest(
        &self,
        creature_ids: Vec<String>,
        hit_dice_spent: HashMap<String, u32>,
    ) -> Result<Vec<RestOutcome>> {
        self.request(|reply| SessionCommand::ShortRest {
            creature_ids,
            hit_dice_spent,
            reply,
        })
        .await
    }

    pub async fn long_rest(&self, creature_ids: Vec<String>) -> Result<Vec<RestOutcome>> {
        self.request(|reply| SessionCommand::LongRest {
            creature_ids,
            reply,
        })
        .await
    }

    pub async fn end_combat(&self) -> Result<bool> {
        self.request(|reply| SessionCommand::EndCombat { reply })
            .await
    }

    pub async fn tick(&self) -> Result<TurnTimerStatus> {
        let now = Instant::now();
        self.request(|reply| SessionCommand::Tick { now, reply })
            .await
    }

    /// Observe events emitted after this call
    pub async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<EventEnvelope>> {
        self.request(|reply| SessionCommand::Subscribe { reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(|reply| SessionCommand::Snapshot { reply })
            .await
    }

    pub async fn creature(&self, creature_id: &str) -> Result<Option<Creature>> {
        let creature_id = creature_id.to_string();
        self.request(|reply| SessionCommand::Creature { creature_id, reply })
            .await
    }

    pub async fn economy(&self, creature_id: &str) -> Result<Option<ActionEconomy>> {
        let creature_id = creature_id.to_string();
        self.request(|reply| SessionCommand::Economy { creature_id, reply })
            .await
    }

    pub async fn distance_between(&self, from_id: &str, to_id: &str) -> Result<Option<u32>> {
        let from_id = from_id.to_string();
        let to_id = to_id.to_string();
        self.request(|reply| SessionCommand::DistanceBetween {
            from_id,
            to_id,
            reply,
        })
        .await
    }
}
