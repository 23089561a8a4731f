//! Error types for MTG Combat

use crate::core::{CardId, PlayerId};
use crate::game::{CombatStage, Defender};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MtgError {
    #[error("Entity not found: {0}")]
    EntityNotFound(u32),

    #[error("Invalid game action: {0}")]
    InvalidAction(String),

    #[error("Combat is in stage {actual:?}, expected {expected}")]
    InvalidCombatStage {
        actual: CombatStage,
        expected: &'static str,
    },

    #[error("Invalid blocker order for attacker {attacker}: expected {expected:?}, got {provided:?}")]
    InvalidBlockerOrder {
        attacker: CardId,
        expected: Vec<CardId>,
        provided: Vec<CardId>,
    },

    #[error("Invalid attacker order for blocker {blocker}: expected {expected:?}, got {provided:?}")]
    InvalidAttackerOrder {
        blocker: CardId,
        expected: Vec<CardId>,
        provided: Vec<CardId>,
    },

    #[error("Scenario error: {0}")]
    ScenarioError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, MtgError>;

/// Reason a declaration of attackers or blockers is illegal
///
/// Validation never fails hard: the caller gets one of these back and can
/// re-prompt the decision maker or fall back to a legal default. The Display
/// text is the human-readable reason shown to the player.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CombatViolation {
    #[error("{name} ({attacker}) can't attack")]
    CannotAttack { attacker: CardId, name: String },

    #[error("{name} ({attacker}) can't attack {defender}")]
    CannotAttackDefender {
        attacker: CardId,
        name: String,
        defender: Defender,
    },

    #[error("{name} ({attacker}) is not attacking")]
    NotAttacking { attacker: CardId, name: String },

    #[error("{blocker_name} ({blocker}) can't block {attacker_name} ({attacker})")]
    CannotBlock {
        blocker: CardId,
        blocker_name: String,
        attacker: CardId,
        attacker_name: String,
    },

    #[error("{name} ({blocker}) can't block {blocking} attackers")]
    BlockingTooManyAttackers {
        blocker: CardId,
        name: String,
        blocking: usize,
    },

    #[error("{name} ({attacker}) can't be blocked by {provided} creature(s) (needs {required})")]
    NotEnoughBlockers {
        attacker: CardId,
        name: String,
        required: usize,
        provided: usize,
    },

    #[error("{name} ({attacker}) can't be blocked by more than {maximum} creature(s), but {provided} block it")]
    TooManyBlockers {
        attacker: CardId,
        name: String,
        maximum: usize,
        provided: usize,
    },

    #[error("{name} ({attacker}) can't be blocked unless all creatures defending player controls block it")]
    NotBlockedByAll { attacker: CardId, name: String },

    #[error("{blocker_name} ({blocker}) must block {attacker_name} ({attacker}) if able")]
    MustBlockLure {
        blocker: CardId,
        blocker_name: String,
        attacker: CardId,
        attacker_name: String,
    },

    #[error("{name} ({blocker}) must block an attacker, but has not been assigned to block any")]
    MustBlock { blocker: CardId, name: String },

    #[error("{name} ({attacker}) must be blocked if able")]
    MustBeBlocked { attacker: CardId, name: String },

    #[error("{name} ({blocker}) can't block alone")]
    BlocksAlone { blocker: CardId, name: String },

    #[error("No more than {maximum} creature(s) can block each combat, but {provided} block")]
    TooManyBlockersInCombat { maximum: usize, provided: usize },

    #[error("Player {player} can't block with more than one creature")]
    OneBlockerPerPlayer { player: PlayerId },

    #[error("Attack declaration has {violations} requirement violation(s), but {best} is achievable")]
    AttackNotOptimal { violations: usize, best: usize },
}
