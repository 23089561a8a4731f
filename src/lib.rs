//! MTG Combat - combat resolution core
//!
//! Declaring attackers and blockers, validating them against the attack and
//! block restrictions in play, ordering damage assignment and dealing combat
//! damage in the first-strike and regular damage steps.

pub mod core;
pub mod error;
pub mod game;
pub mod scenario;
pub mod zones;

pub use error::{CombatViolation, MtgError, Result};
