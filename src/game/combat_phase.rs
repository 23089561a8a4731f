//! Combat phase driver
//!
//! Runs one full combat phase against a `GameState`: asks the controllers
//! for attacks and blocks, re-prompts or falls back when a declaration is
//! illegal, then resolves first-strike and regular damage with state-based
//! actions in between.

use crate::core::{CardId, PlayerId};
use crate::game::controller::{AttackOption, ControllerSeats, GameStateView};
use crate::game::{
    combat_util, AttackConstraints, Combat, CombatOptions, Defender, GameState, Step, TriggerSink,
};
use crate::Result;
use serde::{Deserialize, Serialize};

/// What happened during a combat phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatReport {
    pub attackers: Vec<(CardId, Defender)>,
    /// (blocker, attacker) pairs as finalized
    pub blocks: Vec<(CardId, CardId)>,
    /// Permanents put into graveyards by state-based actions
    pub died: Vec<CardId>,
    /// Life totals after combat, in seat order
    pub life: Vec<(PlayerId, i32)>,
    /// The attack was replaced with the least-violating declaration
    pub attack_fallback: bool,
    /// Defending players whose blocks were dropped after too many bad attempts
    pub block_fallbacks: Vec<PlayerId>,
}

/// Combat phase manager
pub struct CombatPhase<'a> {
    pub game: &'a mut GameState,
    options: CombatOptions,
}

impl<'a> CombatPhase<'a> {
    pub fn new(game: &'a mut GameState) -> Self {
        CombatPhase {
            game,
            options: CombatOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CombatOptions) -> Self {
        self.game.logger.set_verbosity(options.verbosity);
        self.options = options;
        self
    }

    /// Run beginning of combat through end of combat for `attacking_player`
    pub fn run(
        &mut self,
        attacking_player: PlayerId,
        seats: &mut ControllerSeats<'_>,
        sink: &mut dyn TriggerSink,
    ) -> Result<CombatReport> {
        let mut report = CombatReport::default();

        // MTG Rules 507: beginning of combat
        self.game.turn.set_step(Step::BeginCombat);
        let mut combat = Combat::with_options(self.game, attacking_player, self.options.clone());

        // MTG Rules 508: declare attackers
        self.game.turn.set_step(Step::DeclareAttackers);
        report.attack_fallback = self.declare_attackers(&mut combat, seats)?;
        combat.finish_attacker_declaration(self.game, sink)?;
        report.attackers = combat.attack_assignment();

        if report.attackers.is_empty() {
            self.game.logger.combat_summary(format_args!(
                "{} doesn't attack",
                self.game.player_name(attacking_player)
            ));
            self.game.turn.set_step(Step::EndCombat);
            combat.end_combat(self.game, sink);
            report.life = self.life_totals();
            return Ok(report);
        }

        // MTG Rules 509: declare blockers
        self.game.turn.set_step(Step::DeclareBlockers);
        for defending_player in combat.defending_players(self.game) {
            if !self.declare_blockers(&mut combat, defending_player, seats)? {
                report.block_fallbacks.push(defending_player);
            }
        }
        combat.finalize_blockers(self.game, sink)?;
        for blocker in combat.all_blockers() {
            for attacker in combat.attackers_blocked_by(blocker) {
                report.blocks.push((blocker, attacker));
            }
        }

        if self.options.skip_damage {
            self.game.turn.set_step(Step::EndCombat);
            combat.cancel(self.game, sink);
            report.life = self.life_totals();
            return Ok(report);
        }

        // MTG Rules 510: combat damage, with a first-strike step when needed
        combat.order_for_damage_assignment(self.game, seats)?;
        if combat.has_first_strike_combatants(self.game) {
            combat.resolve_first_strike_damage(self.game, seats, sink)?;
            report.died.extend(self.game.check_state_based_actions()?);
            combat.remove_absent_combatants(self.game);
        }
        combat.resolve_regular_damage(self.game, seats, sink)?;
        report.died.extend(self.game.check_state_based_actions()?);
        combat.remove_absent_combatants(self.game);

        // MTG Rules 511: end of combat
        self.game.turn.set_step(Step::EndCombat);
        combat.end_combat(self.game, sink);
        report.life = self.life_totals();
        Ok(report)
    }

    /// Ask the attacking player for attackers; returns true when the
    /// declaration had to be replaced
    fn declare_attackers(&mut self, combat: &mut Combat, seats: &mut ControllerSeats<'_>) -> Result<bool> {
        let attacking_player = combat.attacking_player();
        let constraints = AttackConstraints::compute(self.game, attacking_player);
        let options: Vec<AttackOption> = constraints
            .candidates
            .iter()
            .map(|c| AttackOption {
                attacker: c.attacker,
                defenders: c.defenders.clone(),
            })
            .collect();

        let Some(controller) = seats.get(attacking_player) else {
            self.game.logger.warn(format_args!(
                "No decision maker for {}; no attack",
                self.game.player_name(attacking_player)
            ));
            return Ok(false);
        };

        let chosen = {
            let view = GameStateView::new(self.game, attacking_player);
            controller.choose_attackers(&view, combat, &options)
        };

        for (attacker, defender) in chosen {
            if let Err(reason) = combat.declare_attacker(self.game, attacker, defender) {
                self.game.logger.warn(format_args!("Rejected attacker: {reason}"));
                let view = GameStateView::new(self.game, attacking_player);
                controller.on_declaration_rejected(&view, &reason);
            }
        }

        let replaced = match combat.validate_attacker_declaration(self.game) {
            Ok(()) => false,
            Err(reason) => {
                self.game
                    .logger
                    .warn(format_args!("Rejected attack declaration: {reason}; using the best legal attack"));
                {
                    let view = GameStateView::new(self.game, attacking_player);
                    controller.on_declaration_rejected(&view, &reason);
                }
                let (_, best) = constraints.best_assignment(self.options.max_search_nodes);
                combat.clear_attackers(self.game);
                for (attacker, defender) in best {
                    combat.add_attacker(self.game, attacker, defender);
                }
                true
            }
        };

        // MTG Rules 508.1g-h: costs are paid once the declaration is final.
        // An attacker whose cost isn't paid is withdrawn and pays nothing.
        for (attacker, defender) in combat.attack_assignment() {
            let tax = combat_util::attack_tax(self.game, defender);
            if tax == 0 {
                continue;
            }
            let agreed = {
                let view = GameStateView::new(self.game, attacking_player);
                controller.pay_optional_cost(&view, attacker, tax)
            };
            let paid = agreed && self.game.get_player_mut(attacking_player)?.mana_pool.pay_generic(tax);
            if !paid {
                self.game.logger.combat(format_args!(
                    "{} doesn't pay {} to attack",
                    self.game.card_name(attacker),
                    tax
                ));
                combat.withdraw_attacker(self.game, attacker);
            }
        }
        Ok(replaced)
    }

    /// Ask `defending_player` for blocks, re-prompting on illegal answers;
    /// returns false when every attempt failed and no blocks were declared
    fn declare_blockers(
        &mut self,
        combat: &mut Combat,
        defending_player: PlayerId,
        seats: &mut ControllerSeats<'_>,
    ) -> Result<bool> {
        let attackers: Vec<CardId> = combat
            .attackers()
            .into_iter()
            .filter(|a| combat.defending_player_of(self.game, *a) == Some(defending_player))
            .collect();
        if attackers.is_empty() {
            return Ok(true);
        }
        let available: Vec<CardId> = self
            .game
            .creatures_controlled_by(defending_player)
            .filter(|c| combat_util::can_block(self.game, c))
            .map(|c| c.id)
            .collect();
        let Some(controller) = seats.get(defending_player) else {
            return Ok(true);
        };

        for attempt in 1..=self.options.max_block_attempts.max(1) {
            let blocks = {
                let view = GameStateView::new(self.game, defending_player);
                controller.choose_blockers(&view, combat, &available, &attackers)
            };

            let mut result = Ok(());
            for (blocker, attacker) in blocks {
                if let Err(reason) = combat.declare_blocker(self.game, attacker, blocker) {
                    result = Err(reason);
                    break;
                }
            }
            if result.is_ok() {
                result = combat.validate_blocker_declaration(self.game, defending_player);
            }

            match result {
                Ok(()) => return Ok(true),
                Err(reason) => {
                    self.game.logger.warn(format_args!(
                        "Rejected blocks from {} (attempt {attempt}): {reason}",
                        self.game.player_name(defending_player)
                    ));
                    let view = GameStateView::new(self.game, defending_player);
                    controller.on_declaration_rejected(&view, &reason);
                    self.withdraw_blocks(combat, defending_player);
                }
            }
        }

        self.game.logger.warn(format_args!(
            "{} declares no blocks",
            self.game.player_name(defending_player)
        ));
        Ok(false)
    }

    fn withdraw_blocks(&mut self, combat: &mut Combat, defending_player: PlayerId) {
        for blocker in combat.all_blockers() {
            let controlled = self
                .game
                .cards
                .get(blocker)
                .map(|c| c.controller == defending_player)
                .unwrap_or(false);
            if !controlled {
                continue;
            }
            for attacker in combat.attackers_blocked_by(blocker) {
                combat.remove_blocker(self.game, attacker, blocker);
            }
        }
    }

    fn life_totals(&self) -> Vec<(PlayerId, i32)> {
        self.game.players.iter().map(|p| (p.id, p.life)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Keyword, ManaPool, StaticRule};
    use crate::error::CombatViolation;
    use crate::game::{EventLog, ScriptedController, ZeroController};

    #[test]
    fn test_zero_controllers_attack_with_everything() {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        let (p1, p2) = (game.players[0].id, game.players[1].id);
        game.create_creature(p1, "Grizzly Bears", 2, 2);
        game.create_creature(p1, "Hill Giant", 3, 3);
        let mut alice = ZeroController::new(p1);
        let mut bob = ZeroController::new(p2);
        let mut seats = ControllerSeats::pair(&mut alice, &mut bob);
        let mut log = EventLog::new();

        let report = CombatPhase::new(&mut game).run(p1, &mut seats, &mut log).unwrap();

        assert_eq!(report.attackers.len(), 2);
        assert!(report.blocks.is_empty());
        assert_eq!(game.get_player(p2).unwrap().life, 15);
        assert_eq!(game.current_step(), Step::EndCombat);
    }

    #[test]
    fn test_illegal_blocks_fall_back_to_no_blocks() {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        let (p1, p2) = (game.players[0].id, game.players[1].id);
        let bird = game.create_creature(p1, "Bird", 1, 1);
        game.cards.get_mut(bird).unwrap().keywords.push(Keyword::Flying);
        let bear = game.create_creature(p2, "Bear", 2, 2);
        let mut alice = ZeroController::new(p1);
        let mut bob = ScriptedController::new(p2).with_blocks(vec![(bear, bird)]);
        let mut log = EventLog::new();

        let report = {
            let mut seats = ControllerSeats::pair(&mut alice, &mut bob);
            CombatPhase::new(&mut game)
                .with_options(CombatOptions::default().with_max_block_attempts(2))
                .run(p1, &mut seats, &mut log)
                .unwrap()
        };

        assert_eq!(report.block_fallbacks, vec![p2]);
        assert_eq!(bob.rejections().len(), 2);
        assert!(matches!(bob.rejections()[0], CombatViolation::CannotBlock { .. }));
        assert_eq!(game.get_player(p2).unwrap().life, 19);
    }

    #[test]
    fn test_attack_tax_must_be_paid() {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        let (p1, p2) = (game.players[0].id, game.players[1].id);
        let a = game.create_creature(p1, "A", 2, 2);
        let b = game.create_creature(p1, "B", 2, 2);
        game.create_permanent(p2, "Propaganda", |c| {
            c.static_rules.push(StaticRule::AttackTax(2));
        });
        game.players[0].mana_pool = ManaPool::colorless(3);
        let mut alice = ScriptedController::new(p1)
            .with_attacks(vec![(a, Defender::Player(p2)), (b, Defender::Player(p2))]);
        let mut bob = ZeroController::new(p2);
        let mut seats = ControllerSeats::pair(&mut alice, &mut bob);
        let mut log = EventLog::new();

        let report = CombatPhase::new(&mut game).run(p1, &mut seats, &mut log).unwrap();

        // Only enough mana for one of them
        assert_eq!(report.attackers, vec![(a, Defender::Player(p2))]);
        assert_eq!(game.players[0].mana_pool.total(), 1);
        assert_eq!(game.get_player(p2).unwrap().life, 18);
    }

    #[test]
    fn test_rejected_attacker_pays_no_tax() {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        let (p1, p2) = (game.players[0].id, game.players[1].id);
        let tired = game.create_creature(p1, "Tired Bear", 2, 2);
        game.cards.get_mut(tired).unwrap().tap();
        game.create_permanent(p2, "Ghostly Prison", |c| {
            c.static_rules.push(StaticRule::AttackTax(2));
        });
        game.players[0].mana_pool = ManaPool::colorless(2);
        let mut alice = ScriptedController::new(p1).with_attacks(vec![(tired, Defender::Player(p2))]);
        let mut bob = ZeroController::new(p2);
        let mut seats = ControllerSeats::pair(&mut alice, &mut bob);
        let mut log = EventLog::new();

        let report = CombatPhase::new(&mut game).run(p1, &mut seats, &mut log).unwrap();

        assert!(report.attackers.is_empty());
        assert_eq!(game.players[0].mana_pool.total(), 2);
    }

    #[test]
    fn test_fallback_charges_only_the_final_attack() {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        let (p1, p2) = (game.players[0].id, game.players[1].id);
        let a = game.create_creature(p1, "A", 1, 1);
        let b = game.create_creature(p1, "B", 1, 1);
        game.create_permanent(p2, "Silent Arbiter", |c| {
            c.static_rules.push(StaticRule::MaxAttackersPerCombat(1));
            c.static_rules.push(StaticRule::AttackTax(1));
        });
        game.players[0].mana_pool = ManaPool::colorless(5);
        let mut alice =
            ScriptedController::new(p1).with_attacks(vec![(a, Defender::Player(p2)), (b, Defender::Player(p2))]);
        let mut bob = ZeroController::new(p2);
        let mut seats = ControllerSeats::pair(&mut alice, &mut bob);
        let mut log = EventLog::new();

        let report = CombatPhase::new(&mut game).run(p1, &mut seats, &mut log).unwrap();

        // Two attackers break the cap; staying home is the fallback and costs nothing
        assert!(report.attack_fallback);
        assert!(report.attackers.is_empty());
        assert_eq!(game.players[0].mana_pool.total(), 5);
    }

    #[test]
    fn test_skip_damage_cancels_combat() {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        let (p1, p2) = (game.players[0].id, game.players[1].id);
        game.create_creature(p1, "Hill Giant", 3, 3);
        let mut alice = ZeroController::new(p1);
        let mut bob = ZeroController::new(p2);
        let mut seats = ControllerSeats::pair(&mut alice, &mut bob);
        let mut log = EventLog::new();

        let report = CombatPhase::new(&mut game)
            .with_options(CombatOptions::default().with_skip_damage(true))
            .run(p1, &mut seats, &mut log)
            .unwrap();

        assert_eq!(report.attackers.len(), 1);
        assert_eq!(game.get_player(p2).unwrap().life, 20);
        assert!(matches!(
            log.events().last(),
            Some(crate::game::CombatEvent::CombatEnded { .. })
        ));
    }
}
