//! Combat damage assignment and dealing
//!
//! Each damage step runs in two halves. First every eligible combatant
//! assigns its damage (blockers before attackers), building up a
//! `CombatDamageMap` without touching the game. Then the whole map is dealt
//! at once: prevention, lifelink, life and loyalty loss, marked damage, and
//! finally the damage events.

use crate::core::{Card, CardId, CounterType, PlayerId};
use crate::game::combat::IdTranslator;
use crate::game::controller::{ControllerSeats, GameStateView};
use crate::game::state::PreventionEffects;
use crate::game::{Combat, CombatEvent, CombatStage, Defender, GameState, Step, TriggerSink};
use crate::Result;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

/// Recipient of combat damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DamageTarget {
    Player(PlayerId),
    /// A creature or planeswalker
    Card(CardId),
}

impl From<Defender> for DamageTarget {
    fn from(defender: Defender) -> Self {
        match defender {
            Defender::Player(p) => DamageTarget::Player(p),
            Defender::Planeswalker(c) => DamageTarget::Card(c),
        }
    }
}

impl fmt::Display for DamageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DamageTarget::Player(p) => write!(f, "player {p}"),
            DamageTarget::Card(c) => write!(f, "card {c}"),
        }
    }
}

/// Damage assigned but not yet dealt, keyed by (source, target)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombatDamageMap {
    entries: BTreeMap<(CardId, DamageTarget), i32>,
}

impl CombatDamageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to whatever `source` already assigned to `target`
    pub fn add(&mut self, source: CardId, target: DamageTarget, amount: i32) {
        if amount > 0 {
            *self.entries.entry((source, target)).or_default() += amount;
        }
    }

    pub fn amount(&self, source: CardId, target: DamageTarget) -> i32 {
        self.entries.get(&(source, target)).copied().unwrap_or(0)
    }

    pub fn total_to(&self, target: DamageTarget) -> i32 {
        self.entries
            .iter()
            .filter(|((_, t), _)| *t == target)
            .map(|(_, amount)| amount)
            .sum()
    }

    pub fn total_from(&self, source: CardId) -> i32 {
        self.entries
            .iter()
            .filter(|((s, _), _)| *s == source)
            .map(|(_, amount)| amount)
            .sum()
    }

    pub fn total(&self) -> i32 {
        self.entries.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CardId, DamageTarget, i32)> + '_ {
        self.entries.iter().map(|((s, t), a)| (*s, *t, *a))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop everything `card` deals or is dealt
    pub fn remove_involving(&mut self, card: CardId) {
        self.entries
            .retain(|(source, target), _| *source != card && *target != DamageTarget::Card(card));
    }

    pub(crate) fn remap(&self, translator: &dyn IdTranslator) -> CombatDamageMap {
        let mut copy = CombatDamageMap::new();
        for (source, target, amount) in self.iter() {
            let Some(source) = translator.card(source) else {
                continue;
            };
            let target = match target {
                DamageTarget::Player(p) => DamageTarget::Player(translator.player(p)),
                DamageTarget::Card(c) => match translator.card(c) {
                    Some(c) => DamageTarget::Card(c),
                    None => continue,
                },
            };
            copy.add(source, target, amount);
        }
        copy
    }
}

/// One creature in a damage assignment order, with the damage it still
/// needs to be dealt lethal damage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageSlot {
    pub target: CardId,
    pub lethal: i32,
}

/// A decision maker's split of one source's damage
pub type DamageAssignment = SmallVec<[(DamageTarget, i32); 4]>;

/// Lethal damage to each slot in order, then the rest to `trample_to`, or
/// piled onto the last slot without trample
pub fn default_assignment(slots: &[DamageSlot], trample_to: Option<DamageTarget>, damage: i32) -> DamageAssignment {
    let mut assignment = DamageAssignment::new();
    let mut remaining = damage.max(0);

    for slot in slots {
        let amount = slot.lethal.max(0).min(remaining);
        remaining -= amount;
        assignment.push((DamageTarget::Card(slot.target), amount));
    }

    if remaining > 0 {
        match (trample_to, assignment.last_mut()) {
            (Some(target), _) => assignment.push((target, remaining)),
            (None, Some(last)) => last.1 += remaining,
            (None, None) => {}
        }
    }
    assignment.retain(|(_, amount)| *amount > 0);
    assignment
}

/// MTG Rules 510.1c-d: a slot may only receive damage once every slot
/// before it has lethal, and the trample target only once all of them do
pub fn is_valid_assignment(
    slots: &[DamageSlot],
    trample_to: Option<DamageTarget>,
    damage: i32,
    assignment: &[(DamageTarget, i32)],
) -> bool {
    let mut per_slot = vec![0i32; slots.len()];
    let mut trampled = 0;
    let mut total = 0;

    for (target, amount) in assignment {
        if *amount < 0 {
            return false;
        }
        total += amount;
        match slots
            .iter()
            .position(|s| DamageTarget::Card(s.target) == *target)
        {
            Some(i) => per_slot[i] += amount,
            None if Some(*target) == trample_to => trampled += amount,
            None => return false,
        }
    }
    if total != damage.max(0) {
        return false;
    }

    let mut short = false;
    for (slot, assigned) in slots.iter().zip(&per_slot) {
        if short && *assigned > 0 {
            return false;
        }
        if *assigned < slot.lethal {
            short = true;
        }
    }
    !(short && trampled > 0)
}

fn apply_prevention(
    prevention: &mut PreventionEffects,
    proposed: Vec<(CardId, DamageTarget, i32)>,
) -> Vec<(CardId, DamageTarget, i32)> {
    if prevention.all_combat_damage {
        return Vec::new();
    }
    let mut dealt = Vec::with_capacity(proposed.len());
    for (source, target, mut amount) in proposed {
        if prevention.sources.contains(&source) {
            continue;
        }
        let shield = match target {
            DamageTarget::Player(p) => prevention.player_shields.get_mut(&p),
            DamageTarget::Card(c) => prevention.card_shields.get_mut(&c),
        };
        if let Some(shield) = shield {
            let prevented = (*shield).min(amount);
            *shield -= prevented;
            amount -= prevented;
        }
        if amount > 0 {
            dealt.push((source, target, amount));
        }
    }
    prevention.card_shields.retain(|_, s| *s > 0);
    prevention.player_shields.retain(|_, s| *s > 0);
    dealt
}

impl Combat {
    /// Does `card` deal damage in this pass? (MTG Rules 510.4)
    fn deals_damage_in_pass(&self, card: &Card, first_strike: bool) -> bool {
        if first_strike {
            card.deals_first_strike_damage()
        } else {
            !self.dealt_first_strike.contains(&card.id) || card.has_double_strike()
        }
    }

    /// Damage still needed to destroy `target`, counting damage already
    /// assigned this pass
    fn remaining_lethal(&self, state: &GameState, target: CardId, deathtouch: bool) -> i32 {
        let Ok(card) = state.cards.get(target) else {
            return 0;
        };
        let already = self.pending_damage.total_to(DamageTarget::Card(target));
        let remaining = (card.lethal_damage() - already).max(0);
        if deathtouch && remaining > 0 {
            // 702.2c: any damage from a deathtouch source is lethal
            1
        } else {
            remaining
        }
    }

    /// What `defender` takes damage as, if it's still around
    fn defender_target(&self, state: &GameState, defender: Defender) -> Option<DamageTarget> {
        match defender {
            Defender::Player(_) => Some(defender.into()),
            Defender::Planeswalker(c) if state.is_on_battlefield(c) => Some(defender.into()),
            Defender::Planeswalker(_) => None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn ask_assignment(
        &self,
        state: &GameState,
        seats: &mut ControllerSeats<'_>,
        chooser: PlayerId,
        source: CardId,
        slots: &[DamageSlot],
        trample_to: Option<DamageTarget>,
        damage: i32,
    ) -> DamageAssignment {
        let fallback = default_assignment(slots, trample_to, damage);
        let Some(controller) = seats.get(chooser) else {
            return fallback;
        };
        let view = GameStateView::new(state, chooser);
        let chosen = controller.assign_combat_damage(&view, source, slots, trample_to, damage);
        if !self.options.validate_damage_assignments || is_valid_assignment(slots, trample_to, damage, &chosen) {
            chosen
        } else {
            state.logger.warn(format_args!(
                "Damage assignment for {} ignores the damage order; using the default split",
                state.card_name(source)
            ));
            fallback
        }
    }

    /// Fill `pending_damage` for one damage step
    pub(crate) fn assign_combat_damage(
        &mut self,
        state: &GameState,
        seats: &mut ControllerSeats<'_>,
        first_strike: bool,
    ) {
        self.pending_damage.clear();

        // Blockers first
        for blocker_id in self.all_blockers() {
            let Ok(blocker) = state.cards.get(blocker_id) else {
                continue;
            };
            if !state.is_on_battlefield(blocker_id) || !self.deals_damage_in_pass(blocker, first_strike) {
                continue;
            }
            if first_strike {
                self.dealt_first_strike.insert(blocker_id);
            }
            let power = blocker.current_power();
            let attackers: Vec<CardId> = self
                .attackers_blocked_by(blocker_id)
                .into_iter()
                .filter(|a| state.is_on_battlefield(*a))
                .collect();
            if power <= 0 || attackers.is_empty() {
                continue;
            }
            if let [only] = attackers.as_slice() {
                self.pending_damage.add(blocker_id, DamageTarget::Card(*only), power);
                continue;
            }

            // 702.22j: with banding among the attackers, the attacking
            // player divides the blocker's damage
            let banding = attackers
                .iter()
                .filter_map(|a| state.cards.get(*a).ok())
                .any(|a| a.has_banding());
            let chooser = if banding {
                self.attacking_player
            } else {
                blocker.controller
            };
            let slots: Vec<DamageSlot> = attackers
                .iter()
                .map(|a| DamageSlot {
                    target: *a,
                    lethal: self.remaining_lethal(state, *a, blocker.has_deathtouch()),
                })
                .collect();
            let assignment = self.ask_assignment(state, seats, chooser, blocker_id, &slots, None, power);
            for (target, amount) in assignment {
                self.pending_damage.add(blocker_id, target, amount);
            }
        }

        for attacker_id in self.attackers() {
            let Ok(attacker) = state.cards.get(attacker_id) else {
                continue;
            };
            if !state.is_on_battlefield(attacker_id) || !self.deals_damage_in_pass(attacker, first_strike) {
                continue;
            }
            if first_strike {
                self.dealt_first_strike.insert(attacker_id);
            }
            let power = attacker.current_power();
            let Some(defender) = self.defender_of(attacker_id) else {
                continue;
            };
            if power <= 0 {
                continue;
            }
            let defender_target = self.defender_target(state, defender);

            if !self.is_blocked(attacker_id) {
                if let Some(target) = defender_target {
                    self.pending_damage.add(attacker_id, target, power);
                }
                continue;
            }

            let blockers: Vec<CardId> = self
                .blockers_of(attacker_id)
                .into_iter()
                .filter(|b| state.is_on_battlefield(*b))
                .collect();
            let trample_to = if attacker.has_trample() { defender_target } else { None };

            // 702.19e: a blocked trampler with no blockers left hits the defender
            if blockers.is_empty() {
                if let Some(target) = trample_to {
                    self.pending_damage.add(attacker_id, target, power);
                }
                continue;
            }
            if let ([only], None) = (blockers.as_slice(), trample_to) {
                self.pending_damage.add(attacker_id, DamageTarget::Card(*only), power);
                continue;
            }

            let slots: Vec<DamageSlot> = blockers
                .iter()
                .map(|b| DamageSlot {
                    target: *b,
                    lethal: self.remaining_lethal(state, *b, attacker.has_deathtouch()),
                })
                .collect();
            let assignment =
                self.ask_assignment(state, seats, attacker.controller, attacker_id, &slots, trample_to, power);
            for (target, amount) in assignment {
                self.pending_damage.add(attacker_id, target, amount);
            }
        }
    }

    /// Deal everything in `pending_damage` simultaneously
    pub(crate) fn deal_assigned_damage(&mut self, state: &mut GameState, sink: &mut dyn TriggerSink, first_strike: bool) {
        let proposed: Vec<(CardId, DamageTarget, i32)> = self.pending_damage.iter().collect();
        self.pending_damage.clear();
        let dealt = apply_prevention(&mut state.prevention, proposed);

        let mut by_source: BTreeMap<CardId, (Vec<DamageTarget>, i32)> = BTreeMap::new();
        let mut by_target: BTreeMap<DamageTarget, (Vec<CardId>, i32)> = BTreeMap::new();
        for (source, target, amount) in &dealt {
            let entry = by_source.entry(*source).or_default();
            entry.0.push(*target);
            entry.1 += amount;
            let entry = by_target.entry(*target).or_default();
            entry.0.push(*source);
            entry.1 += amount;
        }

        // 702.15b: lifelink applies as the damage is dealt
        for (source, (_, total)) in &by_source {
            let controller = match state.cards.get(*source) {
                Ok(card) if card.has_lifelink() => card.controller,
                _ => continue,
            };
            if let Ok(player) = state.get_player_mut(controller) {
                player.gain_life(*total);
            }
        }

        for (source, target, amount) in &dealt {
            let deathtouch = state
                .cards
                .get(*source)
                .map(|c| c.has_deathtouch())
                .unwrap_or(false);
            match target {
                DamageTarget::Player(p) => {
                    if let Ok(player) = state.get_player_mut(*p) {
                        player.lose_life(*amount);
                    }
                }
                DamageTarget::Card(c) => {
                    if let Ok(card) = state.cards.get_mut(*c) {
                        if card.is_planeswalker() {
                            let loyalty = (*amount).clamp(0, u8::MAX as i32) as u8;
                            card.remove_counters(&CounterType::loyalty(), loyalty);
                        }
                        if card.is_creature() {
                            card.damage += amount;
                            if deathtouch {
                                card.deathtouch_damaged = true;
                            }
                        }
                    }
                }
            }

            let target_name = match target {
                DamageTarget::Player(p) => state.player_name(*p),
                DamageTarget::Card(c) => state.card_name(*c),
            };
            state.logger.combat(format_args!(
                "{} deals {} damage to {}",
                state.card_name(*source),
                amount,
                target_name
            ));
            sink.fire(CombatEvent::DamageDealt {
                source: *source,
                target: *target,
                amount: *amount,
                first_strike,
            });
        }

        for (source, (targets, total)) in by_source {
            sink.fire(CombatEvent::CombatDamageDoneOnce { source, targets, total });
        }
        for (target, (sources, total)) in by_target {
            sink.fire(CombatEvent::DealtCombatDamageOnce { target, sources, total });
        }
    }

    /// First combat damage step: only first strike and double strike
    /// combatants deal damage
    pub fn resolve_first_strike_damage(
        &mut self,
        state: &mut GameState,
        seats: &mut ControllerSeats<'_>,
        sink: &mut dyn TriggerSink,
    ) -> Result<()> {
        self.expect_stage(
            |s| matches!(s, CombatStage::BlockersValidated | CombatStage::DamageOrdered),
            "BlockersValidated or DamageOrdered",
        )?;
        if !self.orders_built {
            self.order_for_damage_assignment(state, seats)?;
        }
        state.turn.set_step(Step::FirstStrikeDamage);
        state.logger.combat(format_args!("First strike combat damage"));

        self.assign_combat_damage(state, seats, true);
        self.deal_assigned_damage(state, sink, true);
        self.stage = CombatStage::FirstStrikeDamageResolved;
        Ok(())
    }

    /// Regular combat damage step: everyone who hasn't dealt first-strike
    /// damage, plus double strikers again
    pub fn resolve_regular_damage(
        &mut self,
        state: &mut GameState,
        seats: &mut ControllerSeats<'_>,
        sink: &mut dyn TriggerSink,
    ) -> Result<()> {
        self.expect_stage(
            |s| {
                matches!(
                    s,
                    CombatStage::BlockersValidated | CombatStage::DamageOrdered | CombatStage::FirstStrikeDamageResolved
                )
            },
            "BlockersValidated, DamageOrdered or FirstStrikeDamageResolved",
        )?;
        if !self.orders_built {
            self.order_for_damage_assignment(state, seats)?;
        }
        state.turn.set_step(Step::CombatDamage);
        state.logger.combat(format_args!("Combat damage"));

        self.assign_combat_damage(state, seats, false);
        self.deal_assigned_damage(state, sink, false);
        self.stage = CombatStage::RegularDamageResolved;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CardType, Keyword};
    use crate::game::{EventLog, ZeroController};

    fn slot(id: u32, lethal: i32) -> DamageSlot {
        DamageSlot {
            target: CardId::new(id),
            lethal,
        }
    }

    fn card(id: u32) -> DamageTarget {
        DamageTarget::Card(CardId::new(id))
    }

    #[test]
    fn test_default_assignment_with_trample() {
        let player = DamageTarget::Player(PlayerId::new(1));
        let slots = [slot(10, 2), slot(11, 3)];

        let split = default_assignment(&slots, Some(player), 7);
        assert_eq!(split.as_slice(), &[(card(10), 2), (card(11), 3), (player, 2)]);

        let split = default_assignment(&slots, None, 7);
        assert_eq!(split.as_slice(), &[(card(10), 2), (card(11), 5)]);

        let split = default_assignment(&slots, None, 1);
        assert_eq!(split.as_slice(), &[(card(10), 1)]);
    }

    #[test]
    fn test_assignment_must_follow_order() {
        let player = DamageTarget::Player(PlayerId::new(1));
        let slots = [slot(10, 2), slot(11, 3)];

        assert!(is_valid_assignment(&slots, None, 4, &[(card(10), 2), (card(11), 2)]));
        assert!(is_valid_assignment(&slots, None, 4, &[(card(10), 4)]));
        // Skipping ahead before the first blocker has lethal
        assert!(!is_valid_assignment(&slots, None, 4, &[(card(10), 1), (card(11), 3)]));
        // Trample only after everything has lethal
        assert!(!is_valid_assignment(&slots, Some(player), 5, &[(card(10), 2), (player, 3)]));
        assert!(is_valid_assignment(&slots, Some(player), 6, &[(card(10), 2), (card(11), 3), (player, 1)]));
        // Must assign exactly the damage dealt
        assert!(!is_valid_assignment(&slots, None, 4, &[(card(10), 2)]));
    }

    #[test]
    fn test_prevention_shields_are_consumed() {
        let mut prevention = PreventionEffects::default();
        let p = PlayerId::new(1);
        prevention.player_shields.insert(p, 3);
        prevention.sources.insert(CardId::new(9));

        let dealt = apply_prevention(
            &mut prevention,
            vec![
                (CardId::new(5), DamageTarget::Player(p), 2),
                (CardId::new(6), DamageTarget::Player(p), 2),
                (CardId::new(9), DamageTarget::Player(p), 4),
            ],
        );
        assert_eq!(dealt, vec![(CardId::new(6), DamageTarget::Player(p), 1)]);
        assert!(prevention.player_shields.is_empty());
    }

    fn blocked_combat(game: &mut GameState, attacker: CardId, blockers: &[CardId]) -> Combat {
        let p1 = game.players[0].id;
        let p2 = game.players[1].id;
        let mut combat = Combat::new(game, p1);
        let mut log = EventLog::new();
        combat.add_attacker(game, attacker, Defender::Player(p2));
        combat.finish_attacker_declaration(game, &mut log).unwrap();
        for b in blockers {
            combat.add_blocker(game, attacker, *b);
        }
        combat.finalize_blockers(game, &mut log).unwrap();
        combat
    }

    #[test]
    fn test_unblocked_attacker_hits_player() {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        let (p1, p2) = (game.players[0].id, game.players[1].id);
        let giant = game.create_creature(p1, "Hill Giant", 3, 3);
        let mut combat = blocked_combat(&mut game, giant, &[]);
        let mut alice = ZeroController::new(p1);
        let mut bob = ZeroController::new(p2);
        let mut seats = ControllerSeats::pair(&mut alice, &mut bob);
        let mut log = EventLog::new();

        combat.resolve_regular_damage(&mut game, &mut seats, &mut log).unwrap();

        assert_eq!(game.get_player(p2).unwrap().life, 17);
        assert_eq!(combat.stage(), CombatStage::RegularDamageResolved);
        assert_eq!(
            log.events()[0],
            CombatEvent::DamageDealt {
                source: giant,
                target: DamageTarget::Player(p2),
                amount: 3,
                first_strike: false,
            }
        );
    }

    #[test]
    fn test_first_strike_kills_before_regular_damage() {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        let (p1, p2) = (game.players[0].id, game.players[1].id);
        let knight = game.create_creature(p1, "White Knight", 2, 2);
        game.cards.get_mut(knight).unwrap().keywords.push(Keyword::FirstStrike);
        let bear = game.create_creature(p2, "Grizzly Bears", 2, 2);
        let mut combat = blocked_combat(&mut game, knight, &[bear]);
        let mut alice = ZeroController::new(p1);
        let mut bob = ZeroController::new(p2);
        let mut seats = ControllerSeats::pair(&mut alice, &mut bob);
        let mut log = EventLog::new();

        combat.resolve_first_strike_damage(&mut game, &mut seats, &mut log).unwrap();
        assert!(combat.dealt_first_strike_damage(knight));
        let dead = game.check_state_based_actions().unwrap();
        assert_eq!(dead, vec![bear]);
        combat.remove_absent_combatants(&mut game);

        combat.resolve_regular_damage(&mut game, &mut seats, &mut log).unwrap();
        assert_eq!(game.cards.get(knight).unwrap().damage, 0);
        // The knight stays blocked and deals no regular damage
        assert_eq!(game.get_player(p2).unwrap().life, 20);
    }

    #[test]
    fn test_late_blocker_is_appended_and_soaks_trample() {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        let (p1, p2) = (game.players[0].id, game.players[1].id);
        let wurm = game.create_creature(p1, "Trampling Wurm", 6, 6);
        game.cards.get_mut(wurm).unwrap().keywords.push(Keyword::Trample);
        let a = game.create_creature(p2, "A", 2, 2);
        let b = game.create_creature(p2, "B", 2, 2);
        let wall = game.create_creature(p2, "Wall", 0, 3);
        let mut combat = blocked_combat(&mut game, wurm, &[a, b]);
        let mut alice = ZeroController::new(p1);
        let mut bob = ZeroController::new(p2);
        let mut seats = ControllerSeats::pair(&mut alice, &mut bob);
        let mut log = EventLog::new();

        combat.order_for_damage_assignment(&game, &mut seats).unwrap();
        assert_eq!(combat.blockers_of(wurm), vec![a, b]);

        // Enters the battlefield blocking after the orders were built
        assert!(combat.add_blocker(&mut game, wurm, wall));
        assert_eq!(combat.blockers_of(wurm), vec![a, b, wall]);
        assert_eq!(combat.attackers_blocked_by(wall), vec![wurm]);
        assert_eq!(combat.stage(), CombatStage::DamageOrdered);

        combat.resolve_regular_damage(&mut game, &mut seats, &mut log).unwrap();

        // 2 + 2 + 3 lethal exceeds 6 power, so nothing tramples over
        assert_eq!(game.get_player(p2).unwrap().life, 20);
        assert_eq!(game.cards.get(wall).unwrap().damage, 2);
        assert_eq!(
            log.count_matching(|e| matches!(
                e,
                CombatEvent::DamageDealt {
                    target: DamageTarget::Player(_),
                    ..
                }
            )),
            0
        );
    }

    #[test]
    fn test_cancel_after_first_strike_discards_pending_damage() {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        let (p1, p2) = (game.players[0].id, game.players[1].id);
        let knight = game.create_creature(p1, "White Knight", 2, 2);
        game.cards.get_mut(knight).unwrap().keywords.push(Keyword::FirstStrike);
        let giant = game.create_creature(p1, "Hill Giant", 3, 3);
        let mut combat = Combat::new(&game, p1);
        let mut log = EventLog::new();
        combat.add_attacker(&mut game, knight, Defender::Player(p2));
        combat.add_attacker(&mut game, giant, Defender::Player(p2));
        combat.finish_attacker_declaration(&mut game, &mut log).unwrap();
        combat.finalize_blockers(&mut game, &mut log).unwrap();
        let mut alice = ZeroController::new(p1);
        let mut bob = ZeroController::new(p2);
        let mut seats = ControllerSeats::pair(&mut alice, &mut bob);

        combat.resolve_first_strike_damage(&mut game, &mut seats, &mut log).unwrap();
        assert_eq!(game.get_player(p2).unwrap().life, 18);
        combat.assign_combat_damage(&game, &mut seats, false);
        assert_eq!(combat.stage(), CombatStage::FirstStrikeDamageResolved);
        assert_eq!(combat.pending_damage().total(), 3);

        combat.cancel(&mut game, &mut log);

        assert_eq!(combat.stage(), CombatStage::Ended);
        assert!(combat.pending_damage().is_empty());
        assert_eq!(game.get_player(p2).unwrap().life, 18);
        assert_eq!(
            log.count_matching(|e| matches!(e, CombatEvent::DamageDealt { first_strike: false, .. })),
            0
        );
        assert!(matches!(log.events().last(), Some(CombatEvent::CombatEnded { .. })));
        assert!(!game.cards.get(giant).unwrap().view.attacking);
    }

    #[test]
    fn test_deathtouch_and_lifelink() {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        let (p1, p2) = (game.players[0].id, game.players[1].id);
        let viper = game.create_creature(p1, "Vampire Viper", 1, 1);
        {
            let card = game.cards.get_mut(viper).unwrap();
            card.keywords.push(Keyword::Deathtouch);
            card.keywords.push(Keyword::Lifelink);
        }
        let wurm = game.create_creature(p2, "Craw Wurm", 6, 4);
        let mut combat = blocked_combat(&mut game, viper, &[wurm]);
        let mut alice = ZeroController::new(p1);
        let mut bob = ZeroController::new(p2);
        let mut seats = ControllerSeats::pair(&mut alice, &mut bob);
        let mut log = EventLog::new();

        combat.resolve_regular_damage(&mut game, &mut seats, &mut log).unwrap();
        assert_eq!(game.get_player(p1).unwrap().life, 21);

        let dead = game.check_state_based_actions().unwrap();
        assert!(dead.contains(&viper));
        assert!(dead.contains(&wurm));
        assert_eq!(
            log.count_matching(|e| matches!(e, CombatEvent::DealtCombatDamageOnce { .. })),
            2
        );
    }

    #[test]
    fn test_planeswalker_loses_loyalty() {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        let (p1, p2) = (game.players[0].id, game.players[1].id);
        let bear = game.create_creature(p1, "Grizzly Bears", 2, 2);
        let jace = game.create_permanent(p2, "Jace", |c| {
            c.types.push(CardType::Planeswalker);
            c.add_counter(CounterType::loyalty(), 3);
        });
        let mut combat = Combat::new(&game, p1);
        let mut log = EventLog::new();
        combat.add_attacker(&mut game, bear, Defender::Planeswalker(jace));
        combat.finish_attacker_declaration(&mut game, &mut log).unwrap();
        combat.finalize_blockers(&mut game, &mut log).unwrap();
        let mut alice = ZeroController::new(p1);
        let mut bob = ZeroController::new(p2);
        let mut seats = ControllerSeats::pair(&mut alice, &mut bob);

        combat.resolve_regular_damage(&mut game, &mut seats, &mut log).unwrap();

        assert_eq!(game.cards.get(jace).unwrap().loyalty(), 1);
        assert_eq!(game.get_player(p2).unwrap().life, 20);
    }

    #[test]
    fn test_prevent_all_combat_damage() {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        let (p1, p2) = (game.players[0].id, game.players[1].id);
        let giant = game.create_creature(p1, "Hill Giant", 3, 3);
        game.prevention.all_combat_damage = true;
        let mut combat = blocked_combat(&mut game, giant, &[]);
        let mut alice = ZeroController::new(p1);
        let mut bob = ZeroController::new(p2);
        let mut seats = ControllerSeats::pair(&mut alice, &mut bob);
        let mut log = EventLog::new();

        combat.resolve_regular_damage(&mut game, &mut seats, &mut log).unwrap();
        assert_eq!(game.get_player(p2).unwrap().life, 20);
        assert!(log.events().is_empty());
    }

    #[test]
    fn test_damage_before_blockers_is_rejected() {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        let (p1, p2) = (game.players[0].id, game.players[1].id);
        let mut combat = Combat::new(&game, p1);
        let mut alice = ZeroController::new(p1);
        let mut bob = ZeroController::new(p2);
        let mut seats = ControllerSeats::pair(&mut alice, &mut bob);
        let mut log = EventLog::new();

        let err = combat
            .resolve_regular_damage(&mut game, &mut seats, &mut log)
            .unwrap_err();
        assert!(matches!(err, crate::MtgError::InvalidCombatStage { .. }));
    }
}
