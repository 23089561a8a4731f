//! Attack requirements and restrictions across the whole declaration
//!
//! Some rules only make sense for the declaration as a whole: "no more than
//! two creatures can attack each combat", "no more than one creature can
//! attack you", "attacks each combat if able". A declaration is acceptable
//! when it violates as few of these as any legal declaration could (MTG
//! Rules 508.1d), so validation searches for the best achievable count.

use crate::core::{CardId, Keyword, PlayerId, StaticRule};
use crate::error::CombatViolation;
use crate::game::{combat_util, Defender, GameState};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};

/// Caps and obligations imposed by permanents on the battlefield
#[derive(Debug, Clone, Default)]
pub struct GlobalAttackRestrictions {
    /// Most creatures that may attack in total
    pub max_total: Option<usize>,

    /// Most creatures that may attack each player (and their planeswalkers)
    pub defender_max: BTreeMap<Defender, usize>,

    /// Players who must be attacked by at least one creature if able
    pub compelled: BTreeSet<PlayerId>,

    controllers: BTreeMap<Defender, PlayerId>,
}

/// How a declaration breaks the global restrictions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalViolations {
    pub total_excess: usize,
    pub defender_excess: BTreeMap<Defender, usize>,
    pub unattacked_compelled: Vec<PlayerId>,
}

impl GlobalViolations {
    pub fn count(&self) -> usize {
        self.total_excess + self.defender_excess.values().sum::<usize>() + self.unattacked_compelled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

impl GlobalAttackRestrictions {
    pub fn compute(state: &GameState, attacking_player: PlayerId) -> Self {
        let mut restrictions = GlobalAttackRestrictions::default();

        for (source, rule) in state.static_rules() {
            match rule {
                StaticRule::MaxAttackersPerCombat(n) => {
                    let n = *n as usize;
                    restrictions.max_total = Some(restrictions.max_total.map_or(n, |m| m.min(n)));
                }
                StaticRule::MaxAttackersAgainstController(n) if source.controller != attacking_player => {
                    let entry = restrictions
                        .defender_max
                        .entry(Defender::Player(source.controller))
                        .or_insert(*n as usize);
                    *entry = (*entry).min(*n as usize);
                }
                StaticRule::MustAttackController if source.controller != attacking_player => {
                    restrictions.compelled.insert(source.controller);
                }
                _ => {}
            }
        }

        for defender in combat_util::attackable_defenders(state, attacking_player) {
            if let Some(controller) = defender.controller(state) {
                restrictions.controllers.insert(defender, controller);
            }
        }
        restrictions
    }

    fn controller_of(&self, defender: &Defender) -> Option<PlayerId> {
        match defender {
            Defender::Player(p) => Some(*p),
            Defender::Planeswalker(_) => self.controllers.get(defender).copied(),
        }
    }

    pub fn violations(&self, assignment: &[(CardId, Defender)]) -> GlobalViolations {
        let mut result = GlobalViolations {
            total_excess: self.max_total.map_or(0, |max| assignment.len().saturating_sub(max)),
            ..Default::default()
        };

        let mut per_player: BTreeMap<PlayerId, usize> = BTreeMap::new();
        for (_, defender) in assignment {
            if let Some(p) = self.controller_of(defender) {
                *per_player.entry(p).or_default() += 1;
            }
        }

        for (defender, max) in &self.defender_max {
            let Some(p) = self.controller_of(defender) else {
                continue;
            };
            let excess = per_player.get(&p).copied().unwrap_or(0).saturating_sub(*max);
            if excess > 0 {
                result.defender_excess.insert(*defender, excess);
            }
        }

        for p in &self.compelled {
            if !per_player.contains_key(p) {
                result.unattacked_compelled.push(*p);
            }
        }
        result
    }

    pub fn is_legal(&self, assignment: &[(CardId, Defender)]) -> bool {
        self.violations(assignment).is_empty()
    }
}

/// One creature that could attack, and what it could attack
#[derive(Debug, Clone)]
pub struct AttackCandidate {
    pub attacker: CardId,
    pub name: String,
    pub defenders: SmallVec<[Defender; 4]>,
    /// "Attacks each combat if able", or goaded
    pub must_attack: bool,
    pub cant_attack_alone: bool,
}

/// Everything needed to score an attack declaration
#[derive(Debug, Clone)]
pub struct AttackConstraints {
    pub restrictions: GlobalAttackRestrictions,
    pub candidates: Vec<AttackCandidate>,
}

impl AttackConstraints {
    pub fn compute(state: &GameState, attacking_player: PlayerId) -> Self {
        let defenders = combat_util::attackable_defenders(state, attacking_player);
        let candidates = state
            .creatures_controlled_by(attacking_player)
            .filter(|card| combat_util::can_attack(state, card))
            .filter_map(|card| {
                let options: SmallVec<[Defender; 4]> = defenders
                    .iter()
                    .copied()
                    .filter(|d| combat_util::can_attack_defender(state, card, *d))
                    .collect();
                if options.is_empty() {
                    return None;
                }
                Some(AttackCandidate {
                    attacker: card.id,
                    name: card.name.to_string(),
                    defenders: options,
                    must_attack: card.has_keyword(&Keyword::AttacksEachCombat) || !card.goaded_by.is_empty(),
                    cant_attack_alone: card.has_keyword(&Keyword::CantAttackAlone)
                        || card.has_keyword(&Keyword::CantAttackOrBlockAlone),
                })
            })
            .collect();

        AttackConstraints {
            restrictions: GlobalAttackRestrictions::compute(state, attacking_player),
            candidates,
        }
    }

    pub fn candidate(&self, attacker: CardId) -> Option<&AttackCandidate> {
        self.candidates.iter().find(|c| c.attacker == attacker)
    }

    /// Total requirement and restriction violations of `assignment`
    pub fn violation_count(&self, assignment: &[(CardId, Defender)]) -> usize {
        let global = self.restrictions.violations(assignment).count();
        let unmet = self
            .candidates
            .iter()
            .filter(|c| c.must_attack && !assignment.iter().any(|(a, _)| *a == c.attacker))
            .count();
        let alone = match assignment {
            [(only, _)] => self.candidate(*only).map_or(0, |c| c.cant_attack_alone as usize),
            _ => 0,
        };
        global + unmet + alone
    }

    /// Search for the declaration with the fewest violations
    ///
    /// Depth-first over each candidate's choices (stay home, or one of its
    /// defenders), pruning branches whose violations can only grow past the
    /// best found. Gives up after `max_nodes` nodes and returns the best
    /// declaration seen so far.
    pub fn best_assignment(&self, max_nodes: usize) -> (usize, Vec<(CardId, Defender)>) {
        let mut search = Search {
            constraints: self,
            best_count: self.violation_count(&[]),
            best: Vec::new(),
            current: Vec::new(),
            nodes: 0,
            max_nodes,
        };
        if search.best_count > 0 {
            search.visit(0, 0);
        }
        (search.best_count, search.best)
    }

    /// Accept `assignment` if every attacker may attack its defender and no
    /// declaration has fewer violations
    pub fn validate(&self, assignment: &[(CardId, Defender)], max_nodes: usize) -> Result<(), CombatViolation> {
        for (attacker, defender) in assignment {
            match self.candidate(*attacker) {
                Some(c) if c.defenders.contains(defender) => {}
                Some(c) => {
                    return Err(CombatViolation::CannotAttackDefender {
                        attacker: *attacker,
                        name: c.name.clone(),
                        defender: *defender,
                    })
                }
                None => {
                    return Err(CombatViolation::CannotAttack {
                        attacker: *attacker,
                        name: format!("card {attacker}"),
                    })
                }
            }
        }

        let violations = self.violation_count(assignment);
        if violations == 0 {
            return Ok(());
        }
        let (best, _) = self.best_assignment(max_nodes);
        if violations <= best {
            Ok(())
        } else {
            Err(CombatViolation::AttackNotOptimal { violations, best })
        }
    }
}

struct Search<'a> {
    constraints: &'a AttackConstraints,
    best_count: usize,
    best: Vec<(CardId, Defender)>,
    current: Vec<(CardId, Defender)>,
    nodes: usize,
    max_nodes: usize,
}

impl Search<'_> {
    /// `unmet` counts must-attack candidates before `index` left at home
    fn visit(&mut self, index: usize, unmet: usize) {
        if self.nodes >= self.max_nodes || self.best_count == 0 {
            return;
        }
        self.nodes += 1;

        // Caps only get worse as attackers are added
        let global = self.constraints.restrictions.violations(&self.current);
        let lower_bound = global.total_excess + global.defender_excess.values().sum::<usize>() + unmet;
        if lower_bound >= self.best_count {
            return;
        }

        let Some(candidate) = self.constraints.candidates.get(index) else {
            let count = self.constraints.violation_count(&self.current);
            if count < self.best_count {
                self.best_count = count;
                self.best = self.current.clone();
            }
            return;
        };

        for defender in candidate.defenders.iter().copied() {
            self.current.push((candidate.attacker, defender));
            self.visit(index + 1, unmet);
            self.current.pop();
        }
        self.visit(index + 1, unmet + candidate.must_attack as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CardType;
    use crate::game::Step;

    fn setup() -> (GameState, PlayerId, PlayerId) {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        game.turn.set_step(Step::DeclareAttackers);
        let p1 = game.players[0].id;
        let p2 = game.players[1].id;
        (game, p1, p2)
    }

    fn add_rule(game: &mut GameState, controller: PlayerId, rule: StaticRule) {
        game.create_permanent(controller, "Rule Source", |c| {
            c.types.push(CardType::Enchantment);
            c.static_rules.push(rule);
        });
    }

    #[test]
    fn test_unrestricted_declaration_is_legal() {
        let (mut game, p1, p2) = setup();
        let a = game.create_creature(p1, "A", 1, 1);
        let b = game.create_creature(p1, "B", 1, 1);
        let constraints = AttackConstraints::compute(&game, p1);

        assert_eq!(constraints.candidates.len(), 2);
        let all = [(a, Defender::Player(p2)), (b, Defender::Player(p2))];
        assert!(constraints.validate(&all, 1000).is_ok());
        assert!(constraints.validate(&[], 1000).is_ok());
    }

    #[test]
    fn test_max_attackers_per_combat() {
        let (mut game, p1, p2) = setup();
        let a = game.create_creature(p1, "A", 1, 1);
        let b = game.create_creature(p1, "B", 1, 1);
        add_rule(&mut game, p2, StaticRule::MaxAttackersPerCombat(1));
        let constraints = AttackConstraints::compute(&game, p1);

        let both = [(a, Defender::Player(p2)), (b, Defender::Player(p2))];
        assert_eq!(constraints.restrictions.violations(&both).total_excess, 1);
        assert_eq!(
            constraints.validate(&both, 1000),
            Err(CombatViolation::AttackNotOptimal { violations: 1, best: 0 })
        );
        assert!(constraints.validate(&both[..1], 1000).is_ok());
    }

    #[test]
    fn test_attacks_each_combat_conflicts_with_cap() {
        let (mut game, p1, p2) = setup();
        let a = game.create_creature(p1, "Berserker A", 2, 2);
        let b = game.create_creature(p1, "Berserker B", 2, 2);
        for id in [a, b] {
            game.cards.get_mut(id).unwrap().keywords.push(Keyword::AttacksEachCombat);
        }
        add_rule(&mut game, p2, StaticRule::MaxAttackersAgainstController(1));
        let constraints = AttackConstraints::compute(&game, p1);

        // Some requirement or restriction has to give
        let (best, assignment) = constraints.best_assignment(1000);
        assert_eq!(best, 1);
        assert_eq!(constraints.violation_count(&assignment), 1);
        assert!(constraints.validate(&[(b, Defender::Player(p2))], 1000).is_ok());
        assert_eq!(
            constraints.validate(&[], 1000),
            Err(CombatViolation::AttackNotOptimal { violations: 2, best: 1 })
        );
    }

    #[test]
    fn test_cant_attack_alone() {
        let (mut game, p1, p2) = setup();
        let loner = game.create_creature(p1, "Loner", 3, 3);
        game.cards.get_mut(loner).unwrap().keywords.push(Keyword::CantAttackAlone);
        let friend = game.create_creature(p1, "Friend", 1, 1);
        let constraints = AttackConstraints::compute(&game, p1);

        assert_eq!(constraints.violation_count(&[(loner, Defender::Player(p2))]), 1);
        assert!(constraints.validate(&[(loner, Defender::Player(p2))], 1000).is_err());
        assert!(constraints
            .validate(&[(loner, Defender::Player(p2)), (friend, Defender::Player(p2))], 1000)
            .is_ok());
    }

    #[test]
    fn test_compelled_player() {
        let mut game = GameState::new(&["A", "B", "C"], 20);
        game.turn.set_step(Step::DeclareAttackers);
        let ids: Vec<PlayerId> = game.player_ids().collect();
        let bear = game.create_creature(ids[0], "Bear", 2, 2);
        add_rule(&mut game, ids[2], StaticRule::MustAttackController);
        let constraints = AttackConstraints::compute(&game, ids[0]);

        assert_eq!(
            constraints.validate(&[(bear, Defender::Player(ids[1]))], 1000),
            Err(CombatViolation::AttackNotOptimal { violations: 1, best: 0 })
        );
        assert!(constraints.validate(&[(bear, Defender::Player(ids[2]))], 1000).is_ok());
    }

    #[test]
    fn test_illegal_defender_is_reported() {
        let (mut game, p1, p2) = setup();
        let bear = game.create_creature(p1, "Bear", 2, 2);
        let constraints = AttackConstraints::compute(&game, p1);

        let err = constraints.validate(&[(bear, Defender::Player(p1))], 1000).unwrap_err();
        assert!(matches!(err, CombatViolation::CannotAttackDefender { .. }));
        assert!(constraints.validate(&[(bear, Defender::Player(p2))], 1000).is_ok());
    }

    #[test]
    fn test_search_budget_returns_best_so_far() {
        let (mut game, p1, p2) = setup();
        for i in 0..6 {
            let id = game.create_creature(p1, &format!("Berserker {i}"), 1, 1);
            game.cards.get_mut(id).unwrap().keywords.push(Keyword::AttacksEachCombat);
        }
        add_rule(&mut game, p2, StaticRule::MaxAttackersPerCombat(3));
        let constraints = AttackConstraints::compute(&game, p1);

        let (best, _) = constraints.best_assignment(1);
        // Only the root node was visited: the empty baseline stands
        assert_eq!(best, 6);
        let (best, assignment) = constraints.best_assignment(100_000);
        assert_eq!(best, 3);
        assert_eq!(constraints.violation_count(&assignment), 3);
    }
}
