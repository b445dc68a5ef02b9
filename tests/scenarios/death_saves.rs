//! Death save scenario tests
//!
//! Tests a character's path from 0 HP to stable, dead, or back on their feet

use std::collections::HashMap;

use crate::harness::{cleric, fighter, TestEncounter};
use encounter::combat::{CombatEvent, Condition, DamageOptions, DamageType, Lifecycle};

/// A fighter knocked to exactly 0 HP
fn downed() -> TestEncounter {
    let mut enc = TestEncounter::new(vec![fighter(), cleric()]);
    enc.deal_damage("fighter", 20, DamageType::Slashing, DamageOptions::default());
    assert!(enc.get("fighter").is_dying());
    enc
}

/// Test: Three successes stabilize; stable creatures stop rolling
#[test]
fn test_three_successes_stabilize() {
    let mut enc = downed();
    enc.rolls(&[10, 15, 19]);
    for _ in 0..3 {
        enc.roll_death_save("fighter");
    }

    let f = enc.get("fighter");
    assert_eq!(f.lifecycle(), Lifecycle::Stable);
    assert_eq!(f.death_saves.successes, 3);
    assert_eq!(f.death_saves.failures, 0);
    assert_eq!(f.hit_points, 0);

    let again = enc.roll_death_save("fighter").unwrap();
    assert_eq!(again.roll, 0);
    assert_eq!(enc.dice.remaining(), 0);
}

/// Test: Three failures kill
#[test]
fn test_three_failures_kill() {
    let mut enc = downed();
    enc.rolls(&[2, 5, 9]);
    let outcomes: Vec<_> = (0..3)
        .filter_map(|_| enc.roll_death_save("fighter"))
        .collect();

    assert!(!outcomes[1].died);
    assert!(outcomes[2].died);
    assert!(enc.get("fighter").is_dead());
    assert_eq!(
        enc.last_event(),
        Some(CombatEvent::Death {
            creature_id: "fighter".into(),
            was_instant_death: false,
        })
    );
}

/// Test: A natural 20 brings the character back with 1 HP
#[test]
fn test_natural_twenty_revives() {
    let mut enc = downed();
    enc.rolls(&[4, 20]);
    enc.roll_death_save("fighter");
    let outcome = enc.roll_death_save("fighter").unwrap();

    assert!(outcome.regained_consciousness);
    let f = enc.get("fighter");
    assert_eq!(f.hit_points, 1);
    assert_eq!(f.death_saves.failures, 0);
    assert!(!f.conditions.has(Condition::Unconscious));

    let n = enc.event_types().len();
    assert_eq!(
        enc.event_types()[n - 3..],
        ["deathSave", "condition", "healing"]
    );
}

/// Test: A natural 1 counts twice
#[test]
fn test_natural_one_counts_twice() {
    let mut enc = downed();
    enc.rolls(&[1]);
    let outcome = enc.roll_death_save("fighter").unwrap();
    assert_eq!(outcome.failures, 2);
    assert!(!outcome.died);
}

/// Test: A critical hit at two failures is the third and fourth at once
#[test]
fn test_critical_while_down_kills_at_two_failures() {
    let mut enc = downed();
    enc.rolls(&[1]);
    enc.roll_death_save("fighter");

    enc.deal_damage("fighter", 3, DamageType::Piercing, DamageOptions::critical());
    let f = enc.get("fighter");
    assert!(f.is_dead());
    assert_eq!(f.death_saves.failures, 3);
}

/// Test: Stabilizing freezes the counters at 3/0, even after an earlier failure
#[test]
fn test_stabilizing_freezes_counters() {
    let mut enc = downed();
    enc.rolls(&[5, 10, 12, 14]);
    for _ in 0..4 {
        enc.roll_death_save("fighter");
    }
    let f = enc.get("fighter");
    assert_eq!(f.lifecycle(), Lifecycle::Stable);
    assert_eq!(f.death_saves.successes, 3);
    assert_eq!(f.death_saves.failures, 0);
}

/// Test: Damage to a stable creature restarts dying; later damage keeps counting up
#[test]
fn test_damage_breaks_stability() {
    let mut enc = downed();
    enc.rolls(&[10, 12, 14]);
    for _ in 0..3 {
        enc.roll_death_save("fighter");
    }
    assert_eq!(enc.get("fighter").lifecycle(), Lifecycle::Stable);

    enc.deal_damage("fighter", 2, DamageType::Bludgeoning, DamageOptions::default());
    let f = enc.get("fighter");
    assert_eq!(f.lifecycle(), Lifecycle::Dying);
    assert_eq!(f.death_saves.successes, 0);
    assert_eq!(f.death_saves.failures, 1);
    assert!(!f.death_saves.is_stabilized);

    // a success in between does not clear the failure
    enc.rolls(&[11]);
    enc.roll_death_save("fighter");
    assert_eq!(enc.get("fighter").death_saves.failures, 1);
    enc.deal_damage("fighter", 2, DamageType::Bludgeoning, DamageOptions::default());
    assert_eq!(enc.get("fighter").death_saves.failures, 2);
}

/// Test: A short rest at 0 HP leaves a stable character stable
#[test]
fn test_short_rest_keeps_stable_character_stable() {
    let mut enc = downed();
    enc.rolls(&[10, 10, 10]);
    for _ in 0..3 {
        enc.roll_death_save("fighter");
    }

    enc.short_rest(&["fighter"], &HashMap::new());
    let f = enc.get("fighter");
    assert_eq!(f.lifecycle(), Lifecycle::Stable);
    assert_eq!(f.hit_points, 0);
    assert_eq!(f.death_saves.failures, 0);

    let again = enc.roll_death_save("fighter").unwrap();
    assert_eq!(again.roll, 0);
}

/// Test: Resting never leaves failures behind, even on the dead
#[test]
fn test_rests_clear_failures_of_the_dead() {
    let mut enc = downed();
    enc.rolls(&[2, 2, 2]);
    for _ in 0..3 {
        enc.roll_death_save("fighter");
    }
    assert!(enc.get("fighter").is_dead());
    assert_eq!(enc.get("fighter").death_saves.failures, 3);

    enc.short_rest(&["fighter"], &HashMap::new());
    enc.long_rest(&["fighter"]);
    let f = enc.get("fighter");
    assert!(f.is_dead());
    assert_eq!(f.death_saves.failures, 0);
    assert_eq!(f.hit_points, 0);
}

/// Test: Any healing from 0 clears the counters and wakes the character
#[test]
fn test_healing_clears_failures() {
    let mut enc = downed();
    enc.rolls(&[4]);
    enc.roll_death_save("fighter");

    let healed = enc.heal("fighter", 5).unwrap();
    assert!(healed.regained_consciousness);
    let f = enc.get("fighter");
    assert_eq!(f.hit_points, 5);
    assert_eq!(f.death_saves.failures, 0);
    assert_eq!(f.lifecycle(), Lifecycle::Conscious);
}

/// Test: A dying character cannot spend actions
#[test]
fn test_dying_character_cannot_act() {
    let mut enc = TestEncounter::new(vec![fighter(), cleric()]);
    enc.start(&[15, 5]);
    enc.deal_damage("fighter", 20, DamageType::Slashing, DamageOptions::default());
    assert!(enc.use_action("fighter").is_err());
}
