//! Damage scenario tests
//!
//! Tests mitigation, temporary hit points, and what 0 HP means per faction

use crate::harness::{fighter, goblin, ogre, TestEncounter};
use encounter::combat::{
    ActiveCondition, CombatEvent, Condition, DamageOptions, DamageProfile, DamageType, Lifecycle,
};

fn ogre_with(profile: DamageProfile) -> TestEncounter {
    TestEncounter::new(vec![ogre().with_damage_profile(profile)])
}

/// Test: Resistance halves, vulnerability doubles, immunity zeroes
#[test]
fn test_mitigation() {
    let mut enc = ogre_with(DamageProfile::new().with_resistance(DamageType::Fire));
    let resisted = enc
        .deal_damage("ogre", 10, DamageType::Fire, DamageOptions::default())
        .unwrap();
    assert_eq!(resisted.amount, 5);
    assert!(resisted.was_resisted);
    assert_eq!(enc.get("ogre").hit_points, 54);

    let mut enc = ogre_with(DamageProfile::new().with_vulnerability(DamageType::Fire));
    let doubled = enc
        .deal_damage("ogre", 10, DamageType::Fire, DamageOptions::default())
        .unwrap();
    assert_eq!(doubled.amount, 20);
    assert!(doubled.was_vulnerable);

    let mut enc = ogre_with(DamageProfile::new().with_immunity(DamageType::Fire));
    let immune = enc
        .deal_damage("ogre", 10, DamageType::Fire, DamageOptions::default())
        .unwrap();
    assert_eq!(immune.amount, 0);
    assert!(immune.was_immune);
    assert_eq!(enc.get("ogre").hit_points, 59);
    assert_eq!(
        enc.last_event(),
        Some(CombatEvent::Damage {
            target_id: "ogre".into(),
            amount: 0,
            damage_type: DamageType::Fire,
            is_critical: false,
            was_resisted: false,
            was_vulnerable: false,
            was_immune: true,
        })
    );
}

/// Test: Odd amounts round down when resisted
#[test]
fn test_resistance_rounds_down() {
    let mut enc = ogre_with(DamageProfile::new().with_resistance(DamageType::Cold));
    let result = enc
        .deal_damage("ogre", 7, DamageType::Cold, DamageOptions::default())
        .unwrap();
    assert_eq!(result.amount, 3);
}

/// Test: Petrified creatures resist everything
#[test]
fn test_petrified_resists_all() {
    let mut enc = TestEncounter::new(vec![ogre()]);
    enc.add_condition("ogre", ActiveCondition::new(Condition::Petrified));
    let result = enc
        .deal_damage("ogre", 10, DamageType::Psychic, DamageOptions::default())
        .unwrap();
    assert_eq!(result.amount, 5);
    assert!(result.was_resisted);
}

/// Test: Negative amounts deal nothing
#[test]
fn test_negative_damage_is_zero() {
    let mut enc = TestEncounter::new(vec![fighter()]);
    let result = enc
        .deal_damage("fighter", -6, DamageType::Slashing, DamageOptions::default())
        .unwrap();
    assert_eq!(result.amount, 0);
    assert_eq!(enc.get("fighter").hit_points, 20);
}

/// Test: Temporary hit points replace rather than stack, and soak damage first
#[test]
fn test_temporary_hit_points() {
    let mut enc = TestEncounter::new(vec![fighter()]);
    assert_eq!(enc.grant_temporary_hp("fighter", 5), Some(5));
    assert_eq!(enc.grant_temporary_hp("fighter", 3), Some(3));

    let result = enc
        .deal_damage("fighter", 4, DamageType::Bludgeoning, DamageOptions::default())
        .unwrap();
    assert_eq!(result.absorbed_by_temporary, 3);
    assert_eq!(result.hit_point_loss, 1);
    let f = enc.get("fighter");
    assert_eq!(f.temporary_hit_points, 0);
    assert_eq!(f.hit_points, 19);
}

/// Test: Monsters die at 0 HP and never roll death saves
#[test]
fn test_monster_dies_at_zero() {
    let mut enc = TestEncounter::new(vec![goblin()]);
    enc.deal_damage("goblin", 7, DamageType::Piercing, DamageOptions::default());

    let g = enc.get("goblin");
    assert_eq!(g.lifecycle(), Lifecycle::Dead);
    assert_eq!(g.death_saves.failures, 0);
    assert_eq!(enc.event_types(), ["damage", "death"]);

    // further damage lands but settles nothing
    enc.deal_damage("goblin", 3, DamageType::Piercing, DamageOptions::default());
    assert_eq!(enc.event_types(), ["damage", "death", "damage"]);
}

/// Test: Characters at 0 fall unconscious and start dying
#[test]
fn test_character_falls_unconscious() {
    let mut enc = TestEncounter::new(vec![fighter()]);
    let result = enc
        .deal_damage("fighter", 25, DamageType::Slashing, DamageOptions::default())
        .unwrap();
    assert!(result.dropped_to_zero);
    assert_eq!(result.overflow, 5);

    let f = enc.get("fighter");
    assert_eq!(f.lifecycle(), Lifecycle::Dying);
    assert!(f.conditions.has(Condition::Unconscious));
    assert!(enc.events().contains(&CombatEvent::Condition {
        creature_id: "fighter".into(),
        condition: Condition::Unconscious,
        applied: true,
    }));
}

/// Test: Overflow of at least max HP kills outright
#[test]
fn test_massive_damage() {
    let mut enc = TestEncounter::new(vec![fighter()]);
    enc.deal_damage("fighter", 40, DamageType::Force, DamageOptions::default());

    assert!(enc.get("fighter").is_dead());
    assert_eq!(
        enc.last_event(),
        Some(CombatEvent::Death {
            creature_id: "fighter".into(),
            was_instant_death: true,
        })
    );
}

/// Test: Massive damage counts from 0 HP too
#[test]
fn test_massive_damage_while_down() {
    let mut enc = TestEncounter::new(vec![fighter()]);
    enc.deal_damage("fighter", 20, DamageType::Force, DamageOptions::default());
    assert!(enc.get("fighter").is_dying());

    enc.deal_damage("fighter", 20, DamageType::Force, DamageOptions::default());
    assert!(enc.get("fighter").is_dead());
    assert_eq!(enc.get("fighter").death_saves.failures, 0);
}

/// Test: The dead cannot be healed
#[test]
fn test_dead_stay_dead() {
    let mut enc = TestEncounter::new(vec![goblin()]);
    enc.deal_damage("goblin", 30, DamageType::Fire, DamageOptions::default());

    let healed = enc.heal("goblin", 10).unwrap();
    assert_eq!(healed.amount, 0);
    assert_eq!(enc.get("goblin").hit_points, 0);
    assert!(!enc.event_types().contains(&"healing".to_string()));
}
