//! Initiative scenario tests
//!
//! Tests turn order, round boundaries, and mid-fight joiners

use crate::harness::{cleric, fighter, goblin, ogre, TestEncounter};
use encounter::combat::CombatEvent;

/// Test: Equal totals fall back to the raw d20
#[test]
fn test_ties_broken_by_raw_roll() {
    // fighter 14+1, goblin 13+2, cleric 15+0: all 15
    let mut enc = TestEncounter::new(vec![fighter(), goblin(), cleric()]);
    let outcome = enc.start(&[14, 13, 15]);

    let ids: Vec<&str> = outcome
        .order
        .iter()
        .map(|e| e.creature_id.as_str())
        .collect();
    assert_eq!(ids, ["cleric", "fighter", "goblin"]);
    assert!(outcome.order.iter().all(|e| e.total == 15));
    assert_eq!(outcome.rolls["fighter"], 14);
}

/// Test: len(order) calls to next_turn come back around in exactly one round
#[test]
fn test_full_cycle_returns_to_first() {
    let mut enc = TestEncounter::new(vec![fighter(), goblin(), cleric()]);
    enc.start(&[18, 9, 4]);
    let first = enc.current_creature_id().unwrap().to_string();
    let len = enc.initiative_order().len();

    let mut last = None;
    for _ in 0..len {
        last = enc.next_turn();
    }
    assert_eq!(last, Some(first));
    assert_eq!(enc.round(), 2);

    let rounds = enc
        .events()
        .iter()
        .filter(|e| matches!(e, CombatEvent::Round { .. }))
        .count();
    assert_eq!(rounds, 1);
}

/// Test: The round event comes before the first turn of the new round
#[test]
fn test_round_event_precedes_turn() {
    let mut enc = TestEncounter::new(vec![fighter(), goblin()]);
    enc.start(&[18, 9]);
    enc.next_turn();
    enc.next_turn();

    let types = enc.event_types();
    let n = types.len();
    assert_eq!(types[n - 2..], ["round", "turn"]);
}

/// Test: Re-rolling mid-encounter starts over at round 1
#[test]
fn test_reroll_resets_round() {
    let mut enc = TestEncounter::new(vec![fighter(), goblin()]);
    enc.start(&[18, 9]);
    for _ in 0..4 {
        enc.next_turn();
    }
    assert_eq!(enc.round(), 3);

    enc.start(&[2, 19]);
    assert_eq!(enc.round(), 1);
    assert_eq!(enc.current_creature_id(), Some("goblin"));
}

/// Test: A late joiner slots in by total without touching the round
#[test]
fn test_late_joiner_keeps_round() {
    let mut enc = TestEncounter::new(vec![fighter(), goblin()]);
    enc.start(&[18, 9]);
    enc.next_turn();
    enc.next_turn();
    assert_eq!(enc.round(), 2);

    enc.register_creature(ogre());
    enc.rolls(&[20]);
    let entry = enc.add_to_initiative("ogre").unwrap();
    assert_eq!(entry.total, 19);

    // ogre leads the order now but fighter keeps the current turn
    assert_eq!(enc.initiative_order()[0].creature_id, "ogre");
    assert_eq!(enc.current_creature_id(), Some("fighter"));
    assert_eq!(enc.round(), 2);

    // ogre first acts at the top of round 3
    enc.next_turn();
    assert_eq!(enc.next_turn().as_deref(), Some("ogre"));
    assert_eq!(enc.round(), 3);
}

/// Test: Registering alone never changes the order
#[test]
fn test_register_does_not_touch_initiative() {
    let mut enc = TestEncounter::new(vec![fighter(), goblin()]);
    enc.start(&[18, 9]);
    enc.register_creature(cleric());
    assert_eq!(enc.initiative_order().len(), 2);
    assert_eq!(enc.creatures().len(), 3);
}

/// Test: Dismissing a creature earlier in the order keeps the current turn
#[test]
fn test_dismiss_earlier_creature() {
    let mut enc = TestEncounter::new(vec![fighter(), goblin(), cleric()]);
    enc.start(&[18, 9, 4]);
    enc.next_turn();
    assert_eq!(enc.current_creature_id(), Some("goblin"));

    let gone = enc.dismiss_creature("fighter").unwrap();
    assert_eq!(gone.id, "fighter");
    assert_eq!(enc.current_creature_id(), Some("goblin"));
    assert_eq!(enc.next_turn().as_deref(), Some("cleric"));
}
