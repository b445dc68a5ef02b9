//! Actor scenario tests
//!
//! Tests a session driven through its handle from concurrent callers

use crate::harness::{fighter, ogre, ScriptedDice};
use encounter::combat::{
    ActionKind, AttackAction, AttackModifiers, CombatError, CombatSession, DamageType, DiceRoll,
    HandleError, SessionHandle, TurnTimerStatus,
};

fn spawn() -> (SessionHandle, ScriptedDice) {
    let dice = ScriptedDice::default();
    let session = CombatSession::new(Box::new(dice.clone()));
    (SessionHandle::spawn(session), dice)
}

fn club() -> AttackAction {
    AttackAction {
        attacker_id: "fighter".into(),
        target_id: "ogre".into(),
        modifiers: AttackModifiers::default(),
        damage: DiceRoll::new(1, 6, 3),
        damage_type: DamageType::Bludgeoning,
    }
}

/// Test: Two racing attack actions spend the action exactly once
#[tokio::test]
async fn test_concurrent_attack_actions() {
    let (handle, dice) = spawn();
    handle.register_creature(fighter()).await.unwrap();
    handle.register_creature(ogre()).await.unwrap();

    dice.push(&[15, 5]);
    handle.roll_initiative_for_all().await.unwrap();

    // one attack's worth of dice: hit, then 1d6
    dice.push(&[15, 4]);
    let other = handle.clone();
    let (a, b) = tokio::join!(
        handle.perform_attack_action(club()),
        other.perform_attack_action(club())
    );

    let results = [a, b];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(HandleError::Combat(CombatError::ActionSpent(ActionKind::Action)))
    )));

    let snapshot = handle.snapshot().await.unwrap();
    let ogre = snapshot
        .creatures
        .iter()
        .find(|c| c.id == "ogre")
        .unwrap();
    assert_eq!(ogre.hit_points, 52);
    assert_eq!(dice.remaining(), 0);
}

/// Test: Subscribers see every event in order
#[tokio::test]
async fn test_subscriber_sees_ordered_events() {
    let (handle, dice) = spawn();
    let mut events = handle.subscribe().await.unwrap();
    handle.register_creature(fighter()).await.unwrap();
    handle.register_creature(ogre()).await.unwrap();

    dice.push(&[15, 5]);
    handle.roll_initiative_for_all().await.unwrap();
    handle.next_turn().await.unwrap();
    handle.next_turn().await.unwrap();
    handle.end_combat().await.unwrap();

    let mut sequences = Vec::new();
    while let Ok(envelope) = events.try_recv() {
        assert_eq!(envelope.session_id, handle.session_id());
        sequences.push(envelope.sequence);
    }
    // initiative, turn, turn, round, turn, combatEnded
    assert_eq!(sequences, [1, 2, 3, 4, 5, 6]);
}

/// Test: A turn timer with no limit never expires
#[tokio::test]
async fn test_tick_without_limit() {
    let (handle, dice) = spawn();
    handle.register_creature(fighter()).await.unwrap();
    dice.push(&[12]);
    handle.roll_initiative_for_all().await.unwrap();
    assert_eq!(handle.tick().await.unwrap(), TurnTimerStatus::Disabled);
}
