//! Tunables for a combat session

use crate::game::VerbosityLevel;
use serde::{Deserialize, Serialize};

/// Options controlling validation strictness and search effort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatOptions {
    pub verbosity: VerbosityLevel,

    /// Node budget for the minimum-violation attack search. When exhausted,
    /// the best declaration found so far is treated as the optimum.
    pub max_search_nodes: usize,

    /// Reject a decision maker's damage split that ignores the blocker
    /// order and use the default split instead
    pub validate_damage_assignments: bool,

    /// How many times the combat driver re-prompts for blocks before
    /// falling back to no blocks
    pub max_block_attempts: usize,

    /// Skip the combat damage steps entirely ("combat damage is skipped")
    pub skip_damage: bool,
}

impl Default for CombatOptions {
    fn default() -> Self {
        CombatOptions {
            verbosity: VerbosityLevel::Normal,
            max_search_nodes: 100_000,
            validate_damage_assignments: true,
            max_block_attempts: 3,
            skip_damage: false,
        }
    }
}

impl CombatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verbosity(mut self, verbosity: VerbosityLevel) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_max_search_nodes(mut self, nodes: usize) -> Self {
        self.max_search_nodes = nodes;
        self
    }

    pub fn with_damage_validation(mut self, enabled: bool) -> Self {
        self.validate_damage_assignments = enabled;
        self
    }

    pub fn with_max_block_attempts(mut self, attempts: usize) -> Self {
        self.max_block_attempts = attempts;
        self
    }

    pub fn with_skip_damage(mut self, skip: bool) -> Self {
        self.skip_damage = skip;
        self
    }
}
