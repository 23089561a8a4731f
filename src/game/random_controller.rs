//! Random AI controller for testing and baseline play
//!
//! Makes random but legal-looking choices: each creature attacks or blocks
//! with even odds, orders are shuffled. Serves as a fuzzer for the combat
//! engine's validation paths.

use crate::core::{CardId, PlayerId};
use crate::game::controller::{AttackOption, CombatController, GameStateView};
use crate::game::damage::default_assignment;
use crate::game::{combat_util, Combat, DamageAssignment, DamageSlot, DamageTarget, Defender};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use smallvec::SmallVec;

/// A controller that makes random choices
pub struct RandomController {
    player_id: PlayerId,
    rng: ChaCha12Rng,
}

impl RandomController {
    /// Create a new random controller seeded from the OS
    pub fn new(player_id: PlayerId) -> Self {
        RandomController {
            player_id,
            rng: ChaCha12Rng::from_entropy(),
        }
    }

    /// Create a random controller with a seeded RNG (for deterministic testing)
    pub fn with_seed(player_id: PlayerId, seed: u64) -> Self {
        RandomController {
            player_id,
            rng: ChaCha12Rng::seed_from_u64(seed),
        }
    }
}

impl CombatController for RandomController {
    fn player_id(&self) -> PlayerId {
        self.player_id
    }

    fn choose_attackers(
        &mut self,
        _view: &GameStateView,
        _combat: &Combat,
        options: &[AttackOption],
    ) -> SmallVec<[(CardId, Defender); 8]> {
        let mut chosen = SmallVec::new();
        for option in options {
            if !self.rng.gen_bool(0.5) {
                continue;
            }
            if let Some(defender) = option.defenders.choose(&mut self.rng) {
                chosen.push((option.attacker, *defender));
            }
        }
        chosen
    }

    fn choose_blockers(
        &mut self,
        view: &GameStateView,
        combat: &Combat,
        available: &[CardId],
        attackers: &[CardId],
    ) -> SmallVec<[(CardId, CardId); 8]> {
        let game = view.game();
        let mut chosen = SmallVec::new();
        for blocker_id in available {
            if !self.rng.gen_bool(0.5) {
                continue;
            }
            let Some(blocker) = view.get_card(*blocker_id) else {
                continue;
            };
            let legal: Vec<CardId> = attackers
                .iter()
                .copied()
                .filter(|a| {
                    view.get_card(*a)
                        .is_some_and(|attacker| combat_util::can_block_attacker(game, attacker, blocker, Some(combat)))
                })
                .collect();
            if let Some(attacker) = legal.choose(&mut self.rng) {
                chosen.push((*blocker_id, *attacker));
            }
        }
        chosen
    }

    fn order_blockers(&mut self, _view: &GameStateView, _attacker: CardId, blockers: &[CardId]) -> Vec<CardId> {
        let mut order = blockers.to_vec();
        order.shuffle(&mut self.rng);
        order
    }

    fn order_attackers(&mut self, _view: &GameStateView, _blocker: CardId, attackers: &[CardId]) -> Vec<CardId> {
        let mut order = attackers.to_vec();
        order.shuffle(&mut self.rng);
        order
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
        view.available_mana() >= cost && self.rng.gen_bool(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameState;

    #[test]
    fn test_seeded_determinism() {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        let (p1, p2) = (game.players[0].id, game.players[1].id);
        let options: Vec<AttackOption> = (0..8)
            .map(|i| {
                let id = game.create_creature(p1, &format!("Soldier {i}"), 1, 1);
                let mut defenders = SmallVec::new();
                defenders.push(Defender::Player(p2));
                AttackOption { attacker: id, defenders }
            })
            .collect();
        let combat = Combat::new(&game, p1);
        let view = GameStateView::new(&game, p1);

        let mut controller1 = RandomController::with_seed(p1, 42);
        let mut controller2 = RandomController::with_seed(p1, 42);

        // Same seed should produce same choices
        let first = controller1.choose_attackers(&view, &combat, &options);
        let second = controller2.choose_attackers(&view, &combat, &options);
        assert_eq!(first, second);
        assert!(first.iter().all(|(a, _)| options.iter().any(|o| o.attacker == *a)));
    }

    #[test]
    fn test_shuffled_order_is_a_permutation() {
        let game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        let p1 = game.players[0].id;
        let view = GameStateView::new(&game, p1);
        let mut controller = RandomController::with_seed(p1, 7);
        let blockers: Vec<CardId> = (1..=5).map(CardId::new).collect();

        let mut order = controller.order_blockers(&view, CardId::new(0), &blockers);
        order.sort();
        assert_eq!(order, blockers);
    }
}
