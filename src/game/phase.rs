//! Turn phases and steps

use crate::core::PlayerId;
use serde::{Deserialize, Serialize};

/// Major phases of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Beginning,
    PreCombatMain,
    Combat,
    PostCombatMain,
    Ending,
}

/// Specific steps within phases, in turn order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Step {
    // Beginning Phase
    Untap,
    Upkeep,
    Draw,

    // Pre-Combat Main Phase
    Main1,

    // Combat Phase
    BeginCombat,
    DeclareAttackers,
    DeclareBlockers,
    FirstStrikeDamage,
    CombatDamage,
    EndCombat,

    // Post-Combat Main Phase
    Main2,

    // Ending Phase
    End,
    Cleanup,
}

impl Step {
    /// Get the phase this step belongs to
    pub fn phase(&self) -> Phase {
        match self {
            Step::Untap | Step::Upkeep | Step::Draw => Phase::Beginning,
            Step::Main1 => Phase::PreCombatMain,
            Step::BeginCombat
            | Step::DeclareAttackers
            | Step::DeclareBlockers
            | Step::FirstStrikeDamage
            | Step::CombatDamage
            | Step::EndCombat => Phase::Combat,
            Step::Main2 => Phase::PostCombatMain,
            Step::End | Step::Cleanup => Phase::Ending,
        }
    }

    /// Get the next step in turn order
    ///
    /// The first-strike damage step only exists when some combatant has
    /// first strike or double strike; the combat driver decides whether to
    /// enter it, so plain turn order skips it.
    pub fn next(&self) -> Option<Step> {
        match self {
            Step::Untap => Some(Step::Upkeep),
            Step::Upkeep => Some(Step::Draw),
            Step::Draw => Some(Step::Main1),
            Step::Main1 => Some(Step::BeginCombat),
            Step::BeginCombat => Some(Step::DeclareAttackers),
            Step::DeclareAttackers => Some(Step::DeclareBlockers),
            Step::DeclareBlockers => Some(Step::CombatDamage),
            Step::FirstStrikeDamage => Some(Step::CombatDamage),
            Step::CombatDamage => Some(Step::EndCombat),
            Step::EndCombat => Some(Step::Main2),
            Step::Main2 => Some(Step::End),
            Step::End => Some(Step::Cleanup),
            Step::Cleanup => None, // End of turn
        }
    }

    /// Attackers can no longer be declared once this is true
    pub fn is_past_declare_attackers(&self) -> bool {
        *self > Step::DeclareAttackers
    }
}

/// Represents the current turn structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnStructure {
    /// Current turn number (starts at 1)
    pub turn_number: u32,

    /// Current step
    pub current_step: Step,

    /// Active player (whose turn it is)
    pub active_player: PlayerId,
}

impl TurnStructure {
    pub fn new(starting_player: PlayerId) -> Self {
        TurnStructure {
            turn_number: 1,
            current_step: Step::Untap,
            active_player: starting_player,
        }
    }

    pub fn current_phase(&self) -> Phase {
        self.current_step.phase()
    }

    /// Advance to the next step
    pub fn advance_step(&mut self) -> bool {
        if let Some(next_step) = self.current_step.next() {
            self.current_step = next_step;
            true
        } else {
            false // End of turn
        }
    }

    /// Jump straight to a step (combat drives its own sub-steps)
    pub fn set_step(&mut self, step: Step) {
        self.current_step = step;
    }

    /// Start a new turn
    pub fn next_turn(&mut self, next_player: PlayerId) {
        self.turn_number += 1;
        self.current_step = Step::Untap;
        self.active_player = next_player;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_phases() {
        assert_eq!(Step::Untap.phase(), Phase::Beginning);
        assert_eq!(Step::Main1.phase(), Phase::PreCombatMain);
        assert_eq!(Step::DeclareAttackers.phase(), Phase::Combat);
        assert_eq!(Step::FirstStrikeDamage.phase(), Phase::Combat);
        assert_eq!(Step::Main2.phase(), Phase::PostCombatMain);
        assert_eq!(Step::Cleanup.phase(), Phase::Ending);
    }

    #[test]
    fn test_turn_structure() {
        let player = PlayerId::new(1);
        let mut turn = TurnStructure::new(player);

        assert_eq!(turn.turn_number, 1);
        assert_eq!(turn.current_step, Step::Untap);

        assert!(turn.advance_step());
        assert_eq!(turn.current_step, Step::Upkeep);

        // Advance through entire turn
        while turn.advance_step() {}
        assert_eq!(turn.current_step, Step::Cleanup);

        let player2 = PlayerId::new(2);
        turn.next_turn(player2);
        assert_eq!(turn.turn_number, 2);
        assert_eq!(turn.active_player, player2);
    }

    #[test]
    fn test_past_declare_attackers() {
        assert!(!Step::Main1.is_past_declare_attackers());
        assert!(!Step::DeclareAttackers.is_past_declare_attackers());
        assert!(Step::DeclareBlockers.is_past_declare_attackers());
        assert!(Step::Main2.is_past_declare_attackers());
    }
}
