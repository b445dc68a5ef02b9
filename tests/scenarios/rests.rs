//! Rest scenario tests
//!
//! Tests hit dice recovery and the cleanup a long rest does

use std::collections::HashMap;

use crate::harness::{cleric, fighter, goblin, ogre, TestEncounter};
use encounter::combat::{DamageOptions, DamageType};

/// Test: A long rest wipes every transient marker the encounter left behind
#[test]
fn test_long_rest_clears_everything() {
    let mut enc = TestEncounter::new(vec![fighter(), cleric(), goblin(), ogre()]);
    // fighter 16, cleric 10, goblin 7, ogre 2
    enc.start(&[15, 10, 5, 3]);

    enc.dodge("fighter").unwrap();
    enc.next_turn();
    enc.help("cleric", "fighter", "ogre").unwrap();
    enc.next_turn();
    enc.hide("goblin").unwrap();
    enc.next_turn();
    enc.ready_action("ogre", "fighter moves").unwrap();

    for id in ["fighter", "cleric", "goblin", "ogre"] {
        assert!(enc.trackers().touches(id), "{} has no marker", id);
    }

    enc.deal_damage("fighter", 20, DamageType::Bludgeoning, DamageOptions::default());
    enc.add_death_save_failure("fighter", false);
    assert_eq!(enc.get("fighter").death_saves.failures, 1);

    enc.rolls(&[5]);
    let spent = HashMap::from([("fighter".to_string(), 1)]);
    let outcomes = enc.short_rest(&["fighter"], &spent);
    assert_eq!(outcomes[0].hit_points_restored, 7);
    assert_eq!(enc.get("fighter").hit_points, 7);
    assert_eq!(enc.get("fighter").death_saves.failures, 0);

    let outcomes = enc.long_rest(&["fighter", "cleric", "goblin", "ogre"]);
    assert_eq!(outcomes.len(), 4);
    for id in ["fighter", "cleric", "goblin", "ogre"] {
        let c = enc.get(id);
        assert_eq!(c.hit_points, c.max_hit_points);
        assert_eq!(c.death_saves.failures, 0);
        assert!(!enc.trackers().touches(id), "{} kept a marker", id);
    }
}

/// Test: Short rests cannot spend dice the creature does not have
#[test]
fn test_short_rest_limited_by_remaining_dice() {
    let mut enc = TestEncounter::new(vec![cleric()]);
    enc.deal_damage("cleric", 17, DamageType::Necrotic, DamageOptions::default());

    // 3d8 + 1 each
    enc.rolls(&[2, 3, 4]);
    let spent = HashMap::from([("cleric".to_string(), 5)]);
    let outcome = enc.short_rest(&["cleric"], &spent).remove(0);
    assert_eq!(outcome.hit_dice_spent, 3);
    assert_eq!(outcome.hit_points_restored, 12);
    assert_eq!(enc.get("cleric").hit_dice_remaining, 0);
    assert_eq!(enc.dice.remaining(), 0);
}

/// Test: Long rests return half the hit dice and one exhaustion level
#[test]
fn test_long_rest_partial_recovery() {
    let mut enc = TestEncounter::new(vec![fighter()]);
    for _ in 0..3 {
        enc.add_exhaustion("fighter");
    }
    enc.rolls(&[1, 1, 1]);
    let spent = HashMap::from([("fighter".to_string(), 3)]);
    enc.short_rest(&["fighter"], &spent);
    assert_eq!(enc.get("fighter").hit_dice_remaining, 0);

    let outcome = enc.long_rest(&["fighter"]).remove(0);
    assert_eq!(outcome.hit_dice_regained, 1);
    assert_eq!(outcome.exhaustion, 2);
    assert_eq!(enc.get("fighter").conditions.exhaustion(), 2);
}

/// Test: Long rests drop temporary hit points
#[test]
fn test_long_rest_drops_temporary_hp() {
    let mut enc = TestEncounter::new(vec![fighter()]);
    enc.grant_temporary_hp("fighter", 8);
    enc.long_rest(&["fighter"]);
    assert_eq!(enc.get("fighter").temporary_hit_points, 0);
}

/// Test: The dead gain nothing from resting
#[test]
fn test_dead_do_not_rest() {
    let mut enc = TestEncounter::new(vec![goblin()]);
    enc.deal_damage("goblin", 10, DamageType::Acid, DamageOptions::default());
    let outcome = enc.long_rest(&["goblin"]).remove(0);
    assert_eq!(outcome.hit_points_restored, 0);
    assert!(enc.get("goblin").is_dead());
}
