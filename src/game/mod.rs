//! Combat state, rules predicates and the combat phase driver

pub mod attack_restrictions;
pub mod band;
pub mod combat;
pub mod combat_phase;
pub mod combat_util;
pub mod controller;
pub mod damage;
pub mod events;
pub mod logger;
pub mod options;
pub mod phase;
pub mod random_controller;
pub mod scripted_controller;
pub mod state;
pub mod zero_controller;

pub use attack_restrictions::{AttackCandidate, AttackConstraints, GlobalAttackRestrictions, GlobalViolations};
pub use band::{AttackingBand, BandId, BlockedState};
pub use combat::{Combat, CombatLki, CombatStage, Defender, IdMap, IdTranslator};
pub use combat_phase::{CombatPhase, CombatReport};
pub use controller::{AttackOption, CombatController, ControllerSeats, GameStateView};
pub use damage::{default_assignment, CombatDamageMap, DamageAssignment, DamageSlot, DamageTarget};
pub use events::{CombatEvent, EventLog, NullSink, TriggerSink};
pub use logger::{GameLogger, LogEntry, OutputMode, VerbosityLevel};
pub use options::CombatOptions;
pub use phase::{Phase, Step, TurnStructure};
pub use random_controller::RandomController;
pub use scripted_controller::ScriptedController;
pub use state::{GameState, PreventionEffects};
pub use zero_controller::ZeroController;
