//! Integration Test Harness
//!
//! Test infrastructure for the combat engine:
//! - `TestEncounter` - A session wired to a dice script the test can extend
//!   between steps
//! - Fixtures - Stat blocks for the usual combatants
//!
//! # Example
//!
//! ```rust,ignore
//! use harness::{fighter, goblin, TestEncounter};
//!
//! #[test]
//! fn test_fighter_swings() {
//!     let mut enc = TestEncounter::new(vec![fighter(), goblin()]);
//!     enc.start(&[15, 5]);
//!     enc.rolls(&[20]);
//!     let result = enc.attack("fighter", "goblin", Default::default()).unwrap();
//!     assert!(result.is_critical);
//! }
//! ```

mod encounter;

pub use encounter::{ScriptedDice, TestEncounter};
pub use fixtures::{cleric, fighter, goblin, ogre};
