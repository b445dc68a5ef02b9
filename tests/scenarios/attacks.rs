//! Attack scenario tests
//!
//! Tests the action economy around attacks and every source of advantage

use crate::harness::{fighter, goblin, ogre, TestEncounter};
use encounter::combat::{
    ActionKind, ActiveCondition, AttackAction, AttackModifiers, CombatError, CombatEvent,
    Condition, DamageType, DiceError, DiceRoll, Position, RollInfluence, RollMode,
};

fn swing(attacker: &str, target: &str) -> AttackAction {
    AttackAction {
        attacker_id: attacker.into(),
        target_id: target.into(),
        modifiers: AttackModifiers::default(),
        damage: DiceRoll::new(1, 8, 3),
        damage_type: DamageType::Slashing,
    }
}

/// Test: The fighter crits the goblin and the goblin dies without death saves
#[test]
fn test_fighter_crits_goblin() {
    let mut enc = TestEncounter::new(vec![fighter(), goblin()]);
    enc.start(&[15, 5]);

    // natural 20, then 4d6 (2d6 doubled) of 2s
    enc.rolls(&[20, 2, 2, 2, 2]);
    let outcome = enc
        .perform_attack_action(&AttackAction {
            damage: DiceRoll::new(2, 6, 0),
            ..swing("fighter", "goblin")
        })
        .unwrap();

    assert!(outcome.attack.hits);
    assert!(outcome.attack.is_critical);
    let damage = outcome.damage.unwrap();
    assert_eq!(damage.amount, 8);
    assert!(damage.is_critical);

    let goblin = enc.get("goblin");
    assert_eq!(goblin.hit_points, 0);
    assert!(goblin.is_dead());
    assert_eq!(goblin.death_saves.failures, 0);
    assert!(enc.events().contains(&CombatEvent::Death {
        creature_id: "goblin".into(),
        was_instant_death: false,
    }));
}

/// Test: A natural 20 hits any AC and a natural 1 misses any AC
#[test]
fn test_natural_rolls_ignore_armor_class() {
    let mut wall = ogre();
    wall.armor_class = 40;
    let mut enc = TestEncounter::new(vec![fighter(), wall]);
    enc.start(&[15, 5]);

    enc.rolls(&[20]);
    assert!(enc.attack("fighter", "ogre", AttackModifiers::default()).unwrap().hits);

    enc.rolls(&[1]);
    let mut paper = ogre();
    paper.armor_class = -10;
    enc.register_creature(paper);
    let miss = enc.attack("fighter", "ogre", AttackModifiers::default()).unwrap();
    assert!(!miss.hits);
    assert!(miss.is_fumble);
}

/// Test: The action is gone after an attack, hit or miss, and back next turn
#[test]
fn test_action_spent_on_hit_and_miss() {
    let mut enc = TestEncounter::new(vec![fighter(), ogre()]);
    enc.start(&[15, 5]);
    assert!(enc.economy("fighter").unwrap().has_action);

    enc.rolls(&[15, 4]);
    let hit = enc.perform_attack_action(&swing("fighter", "ogre")).unwrap();
    assert!(hit.attack.hits);
    assert_eq!(hit.damage.unwrap().amount, 7);
    assert!(!enc.economy("fighter").unwrap().has_action);
    assert_eq!(
        enc.perform_attack_action(&swing("fighter", "ogre")),
        Err(CombatError::ActionSpent(ActionKind::Action))
    );

    enc.next_turn();
    enc.next_turn();
    assert!(enc.economy("fighter").unwrap().has_action);

    enc.rolls(&[1]);
    let miss = enc.perform_attack_action(&swing("fighter", "ogre")).unwrap();
    assert!(!miss.attack.hits);
    assert!(!enc.economy("fighter").unwrap().has_action);
}

/// Test: Declared advantage and disadvantage cancel
#[test]
fn test_declared_modifiers_cancel() {
    let mut enc = TestEncounter::new(vec![fighter(), ogre()]);
    enc.rolls(&[7]);
    let result = enc
        .attack(
            "fighter",
            "ogre",
            AttackModifiers {
                advantage: true,
                disadvantage: true,
            },
        )
        .unwrap();
    assert_eq!(result.mode, RollMode::Normal);
    assert_eq!(result.rolls, [7]);
}

/// Test: Dodging imposes disadvantage until the dodger's next turn
#[test]
fn test_dodge_lasts_until_next_turn() {
    let mut enc = TestEncounter::new(vec![fighter(), ogre()]);
    enc.start(&[15, 5]);
    enc.dodge("fighter").unwrap();

    enc.next_turn();
    enc.rolls(&[18, 4]);
    let result = enc.attack("ogre", "fighter", AttackModifiers::default()).unwrap();
    assert_eq!(result.mode, RollMode::Disadvantage);
    assert_eq!(result.roll, 4);
    assert!(result
        .disadvantage_sources
        .contains(&RollInfluence::TargetDodging));

    enc.next_turn();
    assert!(!enc.trackers().is_dodging("fighter"));
}

/// Test: A hidden attacker gains advantage and is revealed by attacking
#[test]
fn test_hidden_attacker_is_revealed() {
    let mut enc = TestEncounter::new(vec![fighter(), ogre()]);
    enc.start(&[15, 5]);
    enc.hide("fighter").unwrap();

    enc.rolls(&[3, 17]);
    let result = enc.attack("fighter", "ogre", AttackModifiers::default()).unwrap();
    assert_eq!(result.roll, 17);
    assert!(result
        .advantage_sources
        .contains(&RollInfluence::AttackerHidden));
    assert!(!enc.trackers().is_hidden("fighter"));
}

/// Test: Prone targets are easier up close and harder at range
#[test]
fn test_prone_depends_on_distance() {
    let mut enc = TestEncounter::new(vec![fighter(), ogre()]);
    enc.update_position("fighter", Position::new(0, 0));
    enc.update_position("ogre", Position::new(1, 1));
    enc.add_condition("ogre", ActiveCondition::new(Condition::Prone));

    enc.rolls(&[5, 12]);
    let close = enc.attack("fighter", "ogre", AttackModifiers::default()).unwrap();
    assert_eq!(close.mode, RollMode::Advantage);

    enc.update_position("fighter", Position::new(7, 1));
    assert_eq!(enc.distance_between("fighter", "ogre"), Some(30));
    enc.rolls(&[12, 5]);
    let far = enc.attack("fighter", "ogre", AttackModifiers::default()).unwrap();
    assert_eq!(far.mode, RollMode::Disadvantage);
    assert_eq!(far.roll, 5);
}

/// Test: Melee hits on an unconscious target are critical
#[test]
fn test_unconscious_target_takes_crits() {
    let mut enc = TestEncounter::new(vec![fighter(), ogre()]);
    enc.add_condition("ogre", ActiveCondition::new(Condition::Unconscious));

    enc.rolls(&[6, 9]);
    let result = enc.attack("fighter", "ogre", AttackModifiers::default()).unwrap();
    assert_eq!(result.roll, 9);
    assert!(result.hits);
    assert!(result.is_critical);
}

/// Test: Poisoned attackers roll with disadvantage
#[test]
fn test_poisoned_attacker() {
    let mut enc = TestEncounter::new(vec![fighter(), ogre()]);
    enc.add_condition("fighter", ActiveCondition::new(Condition::Poisoned));

    enc.rolls(&[16, 8]);
    let result = enc.attack("fighter", "ogre", AttackModifiers::default()).unwrap();
    assert_eq!(result.roll, 8);
    assert!(result
        .disadvantage_sources
        .contains(&RollInfluence::AttackerCondition(Condition::Poisoned)));
}

/// Test: Disengage lapses when the turn ends
#[test]
fn test_disengage_lapses_at_end_of_turn() {
    let mut enc = TestEncounter::new(vec![fighter(), ogre()]);
    enc.start(&[15, 5]);
    enc.disengage("fighter").unwrap();
    assert!(enc.trackers().is_disengaged("fighter"));
    enc.next_turn();
    assert!(!enc.trackers().is_disengaged("fighter"));
}

/// Test: Exhaustion level 2 halves movement
#[test]
fn test_exhaustion_halves_movement() {
    let mut enc = TestEncounter::new(vec![fighter(), ogre()]);
    enc.add_exhaustion("fighter");
    enc.add_exhaustion("fighter");
    enc.start(&[15, 5]);

    assert_eq!(enc.move_creature("fighter", 15), Ok(0));
    assert_eq!(
        enc.move_creature("fighter", 5),
        Err(CombatError::InsufficientMovement {
            needed: 5,
            remaining: 0
        })
    );
}

/// Test: Standing up from prone costs half speed
#[test]
fn test_stand_up_costs_half_speed() {
    let mut enc = TestEncounter::new(vec![fighter(), ogre()]);
    enc.add_condition("fighter", ActiveCondition::new(Condition::Prone));
    enc.start(&[15, 5]);

    assert_eq!(enc.stand_up("fighter"), Ok(15));
    assert!(!enc.get("fighter").conditions.has(Condition::Prone));
}

/// Test: Bonus actions and object interactions are separate resources
#[test]
fn test_separate_resources() {
    let mut enc = TestEncounter::new(vec![fighter(), ogre()]);
    enc.start(&[15, 5]);

    enc.use_bonus_action("fighter").unwrap();
    enc.use_object_interaction("fighter").unwrap();
    assert!(enc.economy("fighter").unwrap().has_action);
    assert_eq!(
        enc.use_bonus_action("fighter"),
        Err(CombatError::ActionSpent(ActionKind::BonusAction))
    );
}

/// Test: Oversized damage dice are refused before anything is spent or rolled
#[test]
fn test_oversized_damage_dice_rejected() {
    let mut enc = TestEncounter::new(vec![fighter(), ogre()]);
    enc.start(&[15, 5]);

    enc.rolls(&[20]);
    let result = enc.perform_attack_action(&AttackAction {
        damage: DiceRoll::new(3_000_000_000, 6, 0),
        ..swing("fighter", "ogre")
    });
    assert_eq!(
        result,
        Err(CombatError::InvalidDice(DiceError::TooManyDice(3_000_000_000)))
    );
    assert!(enc.economy("fighter").unwrap().has_action);
    assert_eq!(enc.dice.remaining(), 1);
    assert_eq!(enc.get("ogre").hit_points, 59);
}
