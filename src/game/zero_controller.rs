//! Zero controller for testing and automation
//!
//! This controller always takes the first option it is offered: every
//! creature that can attack attacks its first legal defender, nothing
//! blocks, orders stay as declared, and damage is split in order.
//! It's useful for automated testing and ensuring combats can complete
//! without user input.

use crate::core::{CardId, PlayerId};
use crate::game::controller::{AttackOption, CombatController, GameStateView};
use crate::game::damage::default_assignment;
use crate::game::{Combat, DamageAssignment, DamageSlot, DamageTarget, Defender};
use smallvec::SmallVec;

/// A controller that always chooses the first available option
pub struct ZeroController {
    player_id: PlayerId,
}

impl ZeroController {
    /// Create a new zero controller
    pub fn new(player_id: PlayerId) -> Self {
        ZeroController { player_id }
    }
}

impl CombatController for ZeroController {
    fn player_id(&self) -> PlayerId {
        self.player_id
    }

    fn choose_attackers(
        &mut self,
        _view: &GameStateView,
        _combat: &Combat,
        options: &[AttackOption],
    ) -> SmallVec<[(CardId, Defender); 8]> {
        options
            .iter()
            .filter_map(|o| o.defenders.first().map(|d| (o.attacker, *d)))
            .collect()
    }

    fn choose_blockers(
        &mut self,
        _view: &GameStateView,
        _combat: &Combat,
        _available: &[CardId],
        _attackers: &[CardId],
    ) -> SmallVec<[(CardId, CardId); 8]> {
        SmallVec::new()
    }

    fn order_blockers(&mut self, _view: &GameStateView, _attacker: CardId, blockers: &[CardId]) -> Vec<CardId> {
        blockers.to_vec()
    }

    fn order_attackers(&mut self, _view: &GameStateView, _blocker: CardId, attackers: &[CardId]) -> Vec<CardId> {
        attackers.to_vec()
    }

    fn assign_combat_damage(
        &mut self,
        _view: &GameStateView,
        _source: CardId,
        slots: &[DamageSlot],
        trample_to: Option<DamageTarget>,
        damage: i32,
    ) -> DamageAssignment {
        default_assignment(slots, trample_to, damage)
    }

    fn pay_optional_cost(&mut self, view: &GameStateView, _attacker: CardId, cost: u32) -> bool {
        view.available_mana() >= cost
    }
}
