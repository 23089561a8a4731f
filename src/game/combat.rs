//! Combat system for MTG
//!
//! `Combat` is the session object for one combat phase. It records who
//! attacks whom (as bands), who blocks which band, the damage assignment
//! orders, damage waiting to be dealt, and last-known combat information for
//! creatures that have left combat. It only stores ids: cards and players
//! live in `GameState`, which every operation receives explicitly.
//!
//! Stages advance strictly in order:
//! `Initialized → AttackersDeclared → AttackersValidated → BlockersDeclared →
//! BlockersValidated → DamageOrdered → FirstStrikeDamageResolved →
//! RegularDamageResolved → Ended`, except that `cancel` may jump to `Ended`
//! from anywhere.

use crate::core::{CardId, PlayerId};
use crate::error::CombatViolation;
use crate::game::band::{AttackingBand, BandId, BlockedState};
use crate::game::controller::{ControllerSeats, GameStateView};
use crate::game::{combat_util, CombatDamageMap, CombatEvent, CombatOptions, GameState, TriggerSink};
use crate::{MtgError, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Something that can be attacked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Defender {
    Player(PlayerId),
    Planeswalker(CardId),
}

impl Defender {
    /// The player who is, or controls, this defender
    pub fn controller(&self, state: &GameState) -> Option<PlayerId> {
        match self {
            Defender::Player(p) => Some(*p),
            Defender::Planeswalker(c) => state.cards.get(*c).ok().map(|card| card.controller),
        }
    }

    /// Still present in the game and attackable
    pub fn is_valid(&self, state: &GameState) -> bool {
        match self {
            Defender::Player(p) => state.get_player(*p).map(|pl| !pl.has_lost).unwrap_or(false),
            Defender::Planeswalker(c) => {
                state.is_on_battlefield(*c)
                    && state.cards.get(*c).map(|card| card.is_planeswalker()).unwrap_or(false)
            }
        }
    }

    pub fn describe(&self, state: &GameState) -> String {
        match self {
            Defender::Player(p) => state.player_name(*p),
            Defender::Planeswalker(c) => state.card_name(*c),
        }
    }
}

impl fmt::Display for Defender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Defender::Player(p) => write!(f, "player {p}"),
            Defender::Planeswalker(c) => write!(f, "planeswalker {c}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CombatStage {
    Initialized,
    AttackersDeclared,
    AttackersValidated,
    BlockersDeclared,
    BlockersValidated,
    DamageOrdered,
    FirstStrikeDamageResolved,
    RegularDamageResolved,
    Ended,
}

/// Combat role of a creature captured just before it left combat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatLki {
    pub was_attacker: bool,
    pub was_blocker: bool,
    /// The band it attacked in, or the bands it blocked
    pub bands: SmallVec<[BandId; 2]>,
    pub defender: Option<Defender>,
}

/// Maps ids of one game onto another for what-if copies
pub trait IdTranslator {
    /// `None` drops the card from the copy
    fn card(&self, id: CardId) -> Option<CardId>;
    fn player(&self, id: PlayerId) -> PlayerId;
}

/// Table-backed `IdTranslator`; unmapped players keep their id
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    pub cards: FxHashMap<CardId, CardId>,
    pub players: FxHashMap<PlayerId, PlayerId>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_card(&mut self, from: CardId, to: CardId) -> &mut Self {
        self.cards.insert(from, to);
        self
    }

    pub fn map_player(&mut self, from: PlayerId, to: PlayerId) -> &mut Self {
        self.players.insert(from, to);
        self
    }
}

impl IdTranslator for IdMap {
    fn card(&self, id: CardId) -> Option<CardId> {
        self.cards.get(&id).copied()
    }

    fn player(&self, id: PlayerId) -> PlayerId {
        self.players.get(&id).copied().unwrap_or(id)
    }
}

/// Combat session for one combat phase
///
/// Uses BTreeMap throughout for deterministic iteration order.
#[derive(Debug, Clone)]
pub struct Combat {
    pub(crate) attacking_player: PlayerId,
    pub(crate) stage: CombatStage,
    pub(crate) options: CombatOptions,

    /// Everything the attacking player could attack when combat began
    pub(crate) defenders: Vec<Defender>,

    pub(crate) bands: BTreeMap<BandId, AttackingBand>,
    next_band: u32,

    /// band -> creatures blocking it, in declaration order
    pub(crate) blockers: BTreeMap<BandId, SmallVec<[CardId; 2]>>,

    /// attacker -> blockers in damage assignment order
    pub(crate) blocker_order: BTreeMap<CardId, Vec<CardId>>,

    /// blocker -> attackers in damage assignment order
    pub(crate) attacker_order: BTreeMap<CardId, Vec<CardId>>,
    pub(crate) orders_built: bool,

    /// What each attacker was originally declared against; kept after the
    /// attacker leaves combat so queued abilities can still find it
    pub(crate) original_defenders: BTreeMap<CardId, Defender>,

    /// Creatures that dealt damage in the first-strike step
    pub(crate) dealt_first_strike: BTreeSet<CardId>,

    /// Damage assigned in the current pass but not yet dealt
    pub(crate) pending_damage: CombatDamageMap,

    pub(crate) lki: BTreeMap<CardId, CombatLki>,
}

impl Combat {
    /// Begin combat for `attacking_player`, enumerating what they can attack
    pub fn new(state: &GameState, attacking_player: PlayerId) -> Self {
        Self::with_options(state, attacking_player, CombatOptions::default())
    }

    pub fn with_options(state: &GameState, attacking_player: PlayerId, options: CombatOptions) -> Self {
        let defenders = combat_util::attackable_defenders(state, attacking_player);
        state.logger.combat(format_args!(
            "{} begins combat with {} possible defender(s)",
            state.player_name(attacking_player),
            defenders.len()
        ));
        Combat {
            attacking_player,
            stage: CombatStage::Initialized,
            options,
            defenders,
            bands: BTreeMap::new(),
            next_band: 0,
            blockers: BTreeMap::new(),
            blocker_order: BTreeMap::new(),
            attacker_order: BTreeMap::new(),
            orders_built: false,
            original_defenders: BTreeMap::new(),
            dealt_first_strike: BTreeSet::new(),
            pending_damage: CombatDamageMap::new(),
            lki: BTreeMap::new(),
        }
    }

    pub fn options(&self) -> &CombatOptions {
        &self.options
    }

    pub fn attacking_player(&self) -> PlayerId {
        self.attacking_player
    }

    pub fn stage(&self) -> CombatStage {
        self.stage
    }

    pub fn defenders(&self) -> &[Defender] {
        &self.defenders
    }

    /// Distinct players being defended against, in defender order
    pub fn defending_players(&self, state: &GameState) -> Vec<PlayerId> {
        let mut players = Vec::new();
        for defender in &self.defenders {
            if let Some(p) = defender.controller(state) {
                if !players.contains(&p) {
                    players.push(p);
                }
            }
        }
        players
    }

    pub(crate) fn expect_stage(
        &self,
        allowed: impl Fn(CombatStage) -> bool,
        expected: &'static str,
    ) -> Result<()> {
        if allowed(self.stage) {
            Ok(())
        } else {
            Err(MtgError::InvalidCombatStage {
                actual: self.stage,
                expected,
            })
        }
    }

    // ---------------------------------------------------------------------
    // Attackers
    // ---------------------------------------------------------------------

    /// Put `attacker` into a new band attacking `defender`
    ///
    /// No legality checks beyond reference consistency: this is also how
    /// creatures are put onto the battlefield attacking. A stale id is
    /// logged and ignored.
    pub fn add_attacker(&mut self, state: &mut GameState, attacker: CardId, defender: Defender) -> bool {
        if self.stage == CombatStage::Ended {
            state.logger.warn(format_args!(
                "Ignoring attacker {}: combat has ended",
                state.card_name(attacker)
            ));
            return false;
        }
        if !state.is_on_battlefield(attacker) {
            state.logger.warn(format_args!(
                "Ignoring attacker {}: not on the battlefield",
                state.card_name(attacker)
            ));
            return false;
        }
        if !self.defenders.contains(&defender) || !defender.is_valid(state) {
            state.logger.warn(format_args!(
                "Ignoring attacker {}: {} can't be attacked",
                state.card_name(attacker),
                defender
            ));
            return false;
        }

        self.detach_attacker(state, attacker);
        let id = BandId(self.next_band);
        self.next_band += 1;
        self.bands.insert(id, AttackingBand::new(id, defender, attacker));
        self.original_defenders.insert(attacker, defender);
        self.set_attacking_view(state, attacker, true);

        state.logger.combat(format_args!(
            "{} attacks {}",
            state.card_name(attacker),
            defender.describe(state)
        ));
        if self.stage == CombatStage::Initialized {
            self.stage = CombatStage::AttackersDeclared;
        }
        true
    }

    /// Move `attacker` into an existing band (banding)
    pub fn add_attacker_to_band(&mut self, state: &mut GameState, attacker: CardId, band: BandId) -> bool {
        let defender = match self.bands.get(&band) {
            Some(b) if b.contains(attacker) => return true,
            Some(b) => b.defender,
            None => {
                state.logger.warn(format_args!(
                    "Ignoring attacker {}: {band} no longer exists",
                    state.card_name(attacker)
                ));
                return false;
            }
        };
        if !state.is_on_battlefield(attacker) {
            state.logger.warn(format_args!(
                "Ignoring attacker {}: not on the battlefield",
                state.card_name(attacker)
            ));
            return false;
        }

        self.detach_attacker(state, attacker);
        if let Some(b) = self.bands.get_mut(&band) {
            b.add(attacker);
        }
        self.original_defenders.insert(attacker, defender);
        self.set_attacking_view(state, attacker, true);
        state.logger.combat(format_args!(
            "{} joins {band} attacking {}",
            state.card_name(attacker),
            defender.describe(state)
        ));
        if self.stage == CombatStage::Initialized {
            self.stage = CombatStage::AttackersDeclared;
        }
        true
    }

    /// Declare `attacker` against `defender` after checking that it may attack
    pub fn declare_attacker(
        &mut self,
        state: &mut GameState,
        attacker: CardId,
        defender: Defender,
    ) -> std::result::Result<(), CombatViolation> {
        let name = state.card_name(attacker);
        if self.stage > CombatStage::AttackersDeclared {
            return Err(CombatViolation::CannotAttack { attacker, name });
        }

        let (may_attack, may_attack_defender) = match state.cards.get(attacker) {
            Ok(card) => (
                card.controller == self.attacking_player && combat_util::can_attack(state, card),
                combat_util::can_attack_defender(state, card, defender),
            ),
            Err(_) => {
                state
                    .logger
                    .warn(format_args!("Ignoring attacker {attacker}: no such card"));
                (false, false)
            }
        };
        if !may_attack {
            return Err(CombatViolation::CannotAttack { attacker, name });
        }
        if !may_attack_defender || !self.add_attacker(state, attacker, defender) {
            return Err(CombatViolation::CannotAttackDefender {
                attacker,
                name,
                defender,
            });
        }
        Ok(())
    }

    /// Undeclare a single attacker during the declaration, before any block
    ///
    /// Unlike `remove_from_combat` nothing is remembered about it.
    pub fn withdraw_attacker(&mut self, state: &mut GameState, attacker: CardId) -> bool {
        if self.stage > CombatStage::AttackersDeclared || self.detach_attacker(state, attacker).is_none() {
            return false;
        }
        self.original_defenders.remove(&attacker);
        self.set_attacking_view(state, attacker, false);
        state
            .logger
            .combat(format_args!("{} no longer attacks", state.card_name(attacker)));
        if self.bands.is_empty() {
            self.stage = CombatStage::Initialized;
        }
        true
    }

    /// Withdraw every declared attacker so the declaration can be redone
    pub fn clear_attackers(&mut self, state: &mut GameState) {
        for attacker in self.attackers() {
            self.set_attacking_view(state, attacker, false);
        }
        for blocker in self.all_blockers() {
            self.set_blocking_view(state, blocker, false);
        }
        self.bands.clear();
        self.blockers.clear();
        self.blocker_order.clear();
        self.attacker_order.clear();
        self.original_defenders.clear();
        self.orders_built = false;
        if self.stage <= CombatStage::AttackersDeclared {
            self.stage = CombatStage::Initialized;
        }
    }

    /// Declared attackers with their defenders, in band order
    pub fn attack_assignment(&self) -> Vec<(CardId, Defender)> {
        self.bands
            .values()
            .flat_map(|b| b.attackers.iter().map(move |a| (*a, b.defender)))
            .collect()
    }

    /// Check the declared attack against every requirement and restriction
    ///
    /// A declaration with violations is still accepted when no declaration
    /// could have fewer.
    pub fn validate_attacker_declaration(&self, state: &GameState) -> std::result::Result<(), CombatViolation> {
        crate::game::AttackConstraints::compute(state, self.attacking_player)
            .validate(&self.attack_assignment(), self.options.max_search_nodes)
    }

    /// Lock in the attack: tap attackers without vigilance and fire the
    /// attack triggers
    pub fn finish_attacker_declaration(&mut self, state: &mut GameState, sink: &mut dyn TriggerSink) -> Result<()> {
        self.expect_stage(
            |s| matches!(s, CombatStage::Initialized | CombatStage::AttackersDeclared),
            "Initialized or AttackersDeclared",
        )?;

        let assignment = self.attack_assignment();
        for (attacker, _) in &assignment {
            if let Ok(card) = state.cards.get_mut(*attacker) {
                if !card.has_vigilance() {
                    card.tap();
                }
            }
        }
        self.stage = CombatStage::AttackersValidated;

        state.logger.combat_summary(format_args!(
            "{} attacks with {} creature(s)",
            state.player_name(self.attacking_player),
            assignment.len()
        ));
        sink.fire(CombatEvent::AttackersDeclared {
            attacking_player: self.attacking_player,
            attackers: assignment.clone(),
        });
        for (attacker, defender) in &assignment {
            let others = assignment
                .iter()
                .map(|(a, _)| *a)
                .filter(|a| a != attacker)
                .collect();
            sink.fire(CombatEvent::Attacks {
                attacker: *attacker,
                defender: *defender,
                others,
            });
        }
        Ok(())
    }

    fn detach_attacker(&mut self, state: &mut GameState, attacker: CardId) -> Option<BandId> {
        let band_id = self.band_id_of(attacker)?;
        let now_empty = match self.bands.get_mut(&band_id) {
            Some(band) => {
                band.remove(attacker);
                band.is_empty()
            }
            None => false,
        };
        if now_empty {
            // Blockers left with nothing to block still blocked this combat
            // (MTG Rules 506.4)
            let orphans: Vec<CardId> = self
                .blockers
                .get(&band_id)
                .map(|list| list.to_vec())
                .unwrap_or_default();
            for blocker in orphans {
                let elsewhere = self
                    .blockers
                    .iter()
                    .any(|(id, list)| *id != band_id && list.contains(&blocker));
                if !elsewhere {
                    self.capture_lki(blocker);
                }
            }
            self.bands.remove(&band_id);
            // An emptied band can't be blocked any more
            if let Some(orphans) = self.blockers.remove(&band_id) {
                for blocker in orphans {
                    if !self.is_blocking(blocker) {
                        self.set_blocking_view(state, blocker, false);
                        self.attacker_order.remove(&blocker);
                    }
                }
            }
        }
        Some(band_id)
    }

    // ---------------------------------------------------------------------
    // Blockers
    // ---------------------------------------------------------------------

    /// Record `blocker` as blocking the band `attacker` is in
    ///
    /// When damage assignment orders already exist the blocker is appended
    /// to them rather than rebuilding the orders.
    pub fn add_blocker(&mut self, state: &mut GameState, attacker: CardId, blocker: CardId) -> bool {
        if self.stage == CombatStage::Ended {
            state.logger.warn(format_args!(
                "Ignoring blocker {}: combat has ended",
                state.card_name(blocker)
            ));
            return false;
        }
        let Some(band_id) = self.band_id_of(attacker) else {
            state.logger.warn(format_args!(
                "Ignoring blocker {}: {} is not attacking",
                state.card_name(blocker),
                state.card_name(attacker)
            ));
            return false;
        };
        if !state.is_on_battlefield(blocker) {
            state.logger.warn(format_args!(
                "Ignoring blocker {}: not on the battlefield",
                state.card_name(blocker)
            ));
            return false;
        }

        let list = self.blockers.entry(band_id).or_default();
        if !list.contains(&blocker) {
            list.push(blocker);
        }

        if self.orders_built {
            let members: Vec<CardId> = self
                .bands
                .get(&band_id)
                .map(|b| b.attackers.to_vec())
                .unwrap_or_default();
            for member in &members {
                let order = self.blocker_order.entry(*member).or_default();
                if !order.contains(&blocker) {
                    order.push(blocker);
                }
            }
            let order = self.attacker_order.entry(blocker).or_default();
            for member in members {
                if !order.contains(&member) {
                    order.push(member);
                }
            }
            if let Some(band) = self.bands.get_mut(&band_id) {
                band.blocked = BlockedState::Blocked;
            }
        }

        self.set_blocking_view(state, blocker, true);
        state.logger.combat(format_args!(
            "{} blocks {}",
            state.card_name(blocker),
            state.card_name(attacker)
        ));
        if self.stage == CombatStage::AttackersValidated {
            self.stage = CombatStage::BlockersDeclared;
        }
        true
    }

    /// Declare a block after checking the blocker may block this attacker
    pub fn declare_blocker(
        &mut self,
        state: &mut GameState,
        attacker: CardId,
        blocker: CardId,
    ) -> std::result::Result<(), CombatViolation> {
        let violation = || CombatViolation::CannotBlock {
            blocker,
            blocker_name: state.card_name(blocker),
            attacker,
            attacker_name: state.card_name(attacker),
        };
        let legal = match (state.cards.get(attacker), state.cards.get(blocker)) {
            (Ok(a), Ok(b)) => combat_util::can_block_attacker(state, a, b, Some(&*self)),
            _ => false,
        };
        if !legal {
            return Err(violation());
        }
        let err = violation();
        if !self.add_blocker(state, attacker, blocker) {
            return Err(err);
        }
        Ok(())
    }

    /// Undo one block
    pub fn remove_blocker(&mut self, state: &mut GameState, attacker: CardId, blocker: CardId) -> bool {
        let Some(band_id) = self.band_id_of(attacker) else {
            return false;
        };
        let removed = match self.blockers.get_mut(&band_id) {
            Some(list) => match list.iter().position(|b| *b == blocker) {
                Some(pos) => {
                    list.remove(pos);
                    true
                }
                None => false,
            },
            None => false,
        };
        if !removed {
            return false;
        }

        let members: Vec<CardId> = self
            .bands
            .get(&band_id)
            .map(|b| b.attackers.to_vec())
            .unwrap_or_default();
        for member in &members {
            if let Some(order) = self.blocker_order.get_mut(member) {
                order.retain(|b| *b != blocker);
            }
        }
        if let Some(order) = self.attacker_order.get_mut(&blocker) {
            order.retain(|a| !members.contains(a));
        }
        if !self.is_blocking(blocker) {
            self.attacker_order.remove(&blocker);
            self.set_blocking_view(state, blocker, false);
        }
        true
    }

    /// Withdraw every block so the declaration can be redone
    pub fn clear_blockers(&mut self, state: &mut GameState) {
        for blocker in self.all_blockers() {
            self.set_blocking_view(state, blocker, false);
        }
        self.blockers.clear();
        self.blocker_order.clear();
        self.attacker_order.clear();
        self.orders_built = false;
        for band in self.bands.values_mut() {
            band.blocked = BlockedState::Undetermined;
        }
        if self.stage == CombatStage::BlockersDeclared {
            self.stage = CombatStage::AttackersValidated;
        }
    }

    /// Check `defending_player`'s blocks; the error names the first problem
    pub fn validate_blocker_declaration(
        &self,
        state: &GameState,
        defending_player: PlayerId,
    ) -> std::result::Result<(), CombatViolation> {
        combat_util::validate_blocks(state, self, defending_player)
    }

    /// Fix every band's blocked state and fire block triggers
    pub fn finalize_blockers(&mut self, state: &mut GameState, sink: &mut dyn TriggerSink) -> Result<()> {
        self.expect_stage(
            |s| matches!(s, CombatStage::AttackersValidated | CombatStage::BlockersDeclared),
            "AttackersValidated or BlockersDeclared",
        )?;

        for defending_player in self.defending_players(state) {
            let mut blocks = Vec::new();
            for blocker in self.all_blockers() {
                let controlled = state
                    .cards
                    .get(blocker)
                    .map(|c| c.controller == defending_player)
                    .unwrap_or(false);
                if controlled {
                    for attacker in self.attackers_blocked_by(blocker) {
                        blocks.push((blocker, attacker));
                    }
                }
            }
            sink.fire(CombatEvent::BlockersDeclared {
                defending_player,
                blocks,
            });
        }

        let band_ids: Vec<BandId> = self.bands.keys().copied().collect();
        for band_id in band_ids {
            let blockers: Vec<CardId> = self
                .blockers
                .get(&band_id)
                .map(|l| l.to_vec())
                .unwrap_or_default();
            let Some(band) = self.bands.get_mut(&band_id) else {
                continue;
            };
            let blocked = band.determine_blocked(!blockers.is_empty());
            let defender = band.defender;
            for attacker in band.attackers.clone() {
                match blocked {
                    BlockedState::Blocked => {
                        state.logger.combat(format_args!(
                            "{} is blocked by {} creature(s)",
                            state.card_name(attacker),
                            blockers.len()
                        ));
                        sink.fire(CombatEvent::AttackerBlocked {
                            attacker,
                            blockers: blockers.clone(),
                        });
                    }
                    _ => {
                        state
                            .logger
                            .combat(format_args!("{} is unblocked", state.card_name(attacker)));
                        sink.fire(CombatEvent::AttackerUnblocked { attacker, defender });
                    }
                }
            }
        }

        self.stage = CombatStage::BlockersValidated;
        Ok(())
    }

    /// Force the blocked state of `attacker`'s band ("becomes blocked",
    /// "is no longer blocked" style effects)
    pub fn set_blocked(&mut self, attacker: CardId, blocked: bool) -> bool {
        let Some(band_id) = self.band_id_of(attacker) else {
            return false;
        };
        match self.bands.get_mut(&band_id) {
            Some(band) => {
                band.blocked = if blocked {
                    BlockedState::Blocked
                } else {
                    BlockedState::Unblocked
                };
                true
            }
            None => false,
        }
    }

    // ---------------------------------------------------------------------
    // Damage assignment order
    // ---------------------------------------------------------------------

    /// Replace `attacker`'s blocker order; must be a permutation of its blockers
    pub fn set_blocker_order(&mut self, attacker: CardId, order: Vec<CardId>) -> Result<()> {
        let expected = self.declared_blockers_of(attacker);
        if !is_permutation(&expected, &order) {
            return Err(MtgError::InvalidBlockerOrder {
                attacker,
                expected,
                provided: order,
            });
        }
        self.blocker_order.insert(attacker, order);
        Ok(())
    }

    /// Replace `blocker`'s attacker order; must be a permutation of what it blocks
    pub fn set_attacker_order(&mut self, blocker: CardId, order: Vec<CardId>) -> Result<()> {
        let expected = self.declared_attackers_blocked_by(blocker);
        if !is_permutation(&expected, &order) {
            return Err(MtgError::InvalidAttackerOrder {
                blocker,
                expected,
                provided: order,
            });
        }
        self.attacker_order.insert(blocker, order);
        Ok(())
    }

    /// Ask the attacking player to order blockers for every attacker with
    /// two or more; one or zero blockers keep their declared order
    pub fn order_blockers_for_damage_assignment(&mut self, state: &GameState, seats: &mut ControllerSeats<'_>) {
        for attacker in self.attackers() {
            let blockers = self.declared_blockers_of(attacker);
            let order = if blockers.len() <= 1 {
                blockers.clone()
            } else {
                let chooser = state
                    .cards
                    .get(attacker)
                    .map(|c| c.controller)
                    .unwrap_or(self.attacking_player);
                match seats.get(chooser) {
                    Some(controller) => {
                        let view = GameStateView::new(state, chooser);
                        controller.order_blockers(&view, attacker, &blockers)
                    }
                    None => {
                        state.logger.warn(format_args!(
                            "No decision maker for {}; keeping declared blocker order",
                            state.player_name(chooser)
                        ));
                        blockers.clone()
                    }
                }
            };
            if let Err(e) = self.set_blocker_order(attacker, order) {
                state
                    .logger
                    .warn(format_args!("{e}; keeping declared blocker order"));
                self.blocker_order.insert(attacker, blockers);
            }
        }
    }

    /// Ask each blocking player to order attackers for every blocker that
    /// blocks two or more
    pub fn order_attackers_for_damage_assignment(&mut self, state: &GameState, seats: &mut ControllerSeats<'_>) {
        for blocker in self.all_blockers() {
            let attackers = self.declared_attackers_blocked_by(blocker);
            let order = if attackers.len() <= 1 {
                attackers.clone()
            } else {
                let chooser = match state.cards.get(blocker) {
                    Ok(c) => c.controller,
                    Err(_) => continue,
                };
                match seats.get(chooser) {
                    Some(controller) => {
                        let view = GameStateView::new(state, chooser);
                        controller.order_attackers(&view, blocker, &attackers)
                    }
                    None => {
                        state.logger.warn(format_args!(
                            "No decision maker for {}; keeping declared attacker order",
                            state.player_name(chooser)
                        ));
                        attackers.clone()
                    }
                }
            };
            if let Err(e) = self.set_attacker_order(blocker, order) {
                state
                    .logger
                    .warn(format_args!("{e}; keeping declared attacker order"));
                self.attacker_order.insert(blocker, attackers);
            }
        }
    }

    /// Build both damage assignment orders once blocks are final
    pub fn order_for_damage_assignment(&mut self, state: &GameState, seats: &mut ControllerSeats<'_>) -> Result<()> {
        self.expect_stage(|s| s == CombatStage::BlockersValidated, "BlockersValidated")?;
        self.order_blockers_for_damage_assignment(state, seats);
        self.order_attackers_for_damage_assignment(state, seats);
        self.orders_built = true;
        self.stage = CombatStage::DamageOrdered;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Removal and teardown
    // ---------------------------------------------------------------------

    fn capture_lki(&mut self, card: CardId) {
        if self.lki.contains_key(&card) {
            return;
        }
        let was_attacker = self.is_attacking(card);
        let was_blocker = self.is_blocking(card);
        if !was_attacker && !was_blocker {
            return;
        }
        let mut bands: SmallVec<[BandId; 2]> = SmallVec::new();
        if let Some(id) = self.band_id_of(card) {
            bands.push(id);
        }
        for (band_id, list) in &self.blockers {
            if list.contains(&card) {
                bands.push(*band_id);
            }
        }
        let lki = CombatLki {
            was_attacker,
            was_blocker,
            bands,
            defender: self.defender_of(card),
        };
        self.lki.insert(card, lki);
    }

    /// Take a creature out of combat
    ///
    /// Its combat role is remembered first, then it is detached from its
    /// band or blocks and purged from every damage assignment order. A
    /// blocked attacker stays blocked when its blockers leave.
    pub fn remove_from_combat(&mut self, state: &mut GameState, card: CardId) -> bool {
        let was_attacker = self.is_attacking(card);
        let was_blocker = self.is_blocking(card);
        if !was_attacker && !was_blocker {
            return false;
        }
        self.capture_lki(card);

        if was_attacker {
            self.detach_attacker(state, card);
            self.blocker_order.remove(&card);
            for order in self.attacker_order.values_mut() {
                order.retain(|a| *a != card);
            }
        }
        if was_blocker {
            for list in self.blockers.values_mut() {
                list.retain(|b| *b != card);
            }
            self.attacker_order.remove(&card);
            for order in self.blocker_order.values_mut() {
                order.retain(|b| *b != card);
            }
        }
        self.pending_damage.remove_involving(card);

        if let Ok(c) = state.cards.get_mut(card) {
            c.view = Default::default();
        }
        state
            .logger
            .combat(format_args!("{} is removed from combat", state.card_name(card)));
        true
    }

    /// Remove every combatant that is no longer on the battlefield
    pub fn remove_absent_combatants(&mut self, state: &mut GameState) -> Vec<CardId> {
        let mut absent: Vec<CardId> = self
            .attackers()
            .into_iter()
            .chain(self.all_blockers())
            .filter(|c| !state.is_on_battlefield(*c))
            .collect();
        absent.dedup();
        absent.retain(|c| self.remove_from_combat(state, *c));
        absent
    }

    /// Tear down the session
    ///
    /// Every combatant gets a last-known snapshot and its presentation flags
    /// cleared; then all per-combat collections are emptied, the LKI cache
    /// last.
    pub fn end_combat(&mut self, state: &mut GameState, sink: &mut dyn TriggerSink) {
        if self.stage == CombatStage::Ended {
            return;
        }
        let combatants: Vec<CardId> = self
            .attackers()
            .into_iter()
            .chain(self.all_blockers())
            .collect();
        for card in combatants {
            self.capture_lki(card);
            if let Ok(c) = state.cards.get_mut(card) {
                c.view = Default::default();
            }
        }

        self.bands.clear();
        self.blockers.clear();
        self.blocker_order.clear();
        self.attacker_order.clear();
        self.orders_built = false;
        self.pending_damage.clear();
        self.dealt_first_strike.clear();
        self.original_defenders.clear();
        self.stage = CombatStage::Ended;

        state.logger.combat(format_args!("Combat ends"));
        sink.fire(CombatEvent::CombatEnded {
            attacking_player: self.attacking_player,
        });
        self.lki.clear();
    }

    /// Abort combat from any stage, discarding damage not yet dealt
    pub fn cancel(&mut self, state: &mut GameState, sink: &mut dyn TriggerSink) {
        if !self.pending_damage.is_empty() {
            state.logger.combat(format_args!(
                "Discarding {} undealt combat damage",
                self.pending_damage.total()
            ));
        }
        self.pending_damage.clear();
        self.end_combat(state, sink);
    }

    /// Deep copy with every id passed through `translator`
    ///
    /// Cards the translator drops disappear from the copy, along with any
    /// band they leave empty.
    pub fn copy_remapped(&self, translator: &dyn IdTranslator) -> Combat {
        let map_defender = |d: &Defender| match d {
            Defender::Player(p) => Some(Defender::Player(translator.player(*p))),
            Defender::Planeswalker(c) => translator.card(*c).map(Defender::Planeswalker),
        };
        let map_cards = |ids: &[CardId]| -> Vec<CardId> { ids.iter().filter_map(|c| translator.card(*c)).collect() };

        let mut bands = BTreeMap::new();
        for (id, band) in &self.bands {
            let Some(defender) = map_defender(&band.defender) else {
                continue;
            };
            let attackers: SmallVec<[CardId; 2]> = band.attackers.iter().filter_map(|c| translator.card(*c)).collect();
            if attackers.is_empty() {
                continue;
            }
            bands.insert(
                *id,
                AttackingBand {
                    id: *id,
                    defender,
                    attackers,
                    blocked: band.blocked,
                },
            );
        }

        let blockers = self
            .blockers
            .iter()
            .filter(|(id, _)| bands.contains_key(*id))
            .map(|(id, list)| (*id, list.iter().filter_map(|c| translator.card(*c)).collect()))
            .collect();
        let remap_orders = |orders: &BTreeMap<CardId, Vec<CardId>>| {
            orders
                .iter()
                .filter_map(|(k, v)| translator.card(*k).map(|k| (k, map_cards(v))))
                .collect()
        };

        Combat {
            attacking_player: translator.player(self.attacking_player),
            stage: self.stage,
            options: self.options.clone(),
            defenders: self.defenders.iter().filter_map(map_defender).collect(),
            bands,
            next_band: self.next_band,
            blockers,
            blocker_order: remap_orders(&self.blocker_order),
            attacker_order: remap_orders(&self.attacker_order),
            orders_built: self.orders_built,
            original_defenders: self
                .original_defenders
                .iter()
                .filter_map(|(k, d)| Some((translator.card(*k)?, map_defender(d)?)))
                .collect(),
            dealt_first_strike: self
                .dealt_first_strike
                .iter()
                .filter_map(|c| translator.card(*c))
                .collect(),
            pending_damage: self.pending_damage.remap(translator),
            lki: self
                .lki
                .iter()
                .filter_map(|(k, lki)| {
                    let mut copy = lki.clone();
                    copy.defender = lki.defender.as_ref().and_then(map_defender);
                    Some((translator.card(*k)?, copy))
                })
                .collect(),
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn band(&self, id: BandId) -> Option<&AttackingBand> {
        self.bands.get(&id)
    }

    pub fn bands(&self) -> impl Iterator<Item = &AttackingBand> + '_ {
        self.bands.values()
    }

    pub fn band_id_of(&self, attacker: CardId) -> Option<BandId> {
        self.bands.values().find(|b| b.contains(attacker)).map(|b| b.id)
    }

    pub fn band_of(&self, attacker: CardId) -> Option<&AttackingBand> {
        self.bands.values().find(|b| b.contains(attacker))
    }

    pub fn bands_attacking(&self, defender: Defender) -> Vec<BandId> {
        self.bands
            .values()
            .filter(|b| b.defender == defender)
            .map(|b| b.id)
            .collect()
    }

    /// All attackers in band order
    pub fn attackers(&self) -> Vec<CardId> {
        self.bands.values().flat_map(|b| b.attackers.iter().copied()).collect()
    }

    pub fn attackers_of(&self, defender: Defender) -> Vec<CardId> {
        self.bands
            .values()
            .filter(|b| b.defender == defender)
            .flat_map(|b| b.attackers.iter().copied())
            .collect()
    }

    pub fn is_attacking(&self, card: CardId) -> bool {
        self.band_id_of(card).is_some()
    }

    pub fn is_blocking(&self, card: CardId) -> bool {
        self.blockers.values().any(|list| list.contains(&card))
    }

    pub fn defender_of(&self, attacker: CardId) -> Option<Defender> {
        self.band_of(attacker).map(|b| b.defender)
    }

    /// The player being attacked by `attacker`, directly or through a planeswalker
    pub fn defending_player_of(&self, state: &GameState, attacker: CardId) -> Option<PlayerId> {
        self.defender_of(attacker)
            .or_else(|| self.original_defenders.get(&attacker).copied())
            .and_then(|d| d.controller(state))
    }

    /// What `attacker` was declared against, even after it left combat
    pub fn original_defender_of(&self, attacker: CardId) -> Option<Defender> {
        self.original_defenders
            .get(&attacker)
            .copied()
            .or_else(|| self.lki.get(&attacker).and_then(|l| l.defender))
    }

    /// Blockers of `attacker`'s band in declaration order
    pub fn declared_blockers_of(&self, attacker: CardId) -> Vec<CardId> {
        self.band_id_of(attacker)
            .and_then(|id| self.blockers.get(&id))
            .map(|l| l.to_vec())
            .unwrap_or_default()
    }

    /// Blockers of `attacker` in damage assignment order once ordered
    pub fn blockers_of(&self, attacker: CardId) -> Vec<CardId> {
        match self.blocker_order.get(&attacker) {
            Some(order) => order.clone(),
            None => self.declared_blockers_of(attacker),
        }
    }

    fn declared_attackers_blocked_by(&self, blocker: CardId) -> Vec<CardId> {
        self.blockers
            .iter()
            .filter(|(_, list)| list.contains(&blocker))
            .filter_map(|(id, _)| self.bands.get(id))
            .flat_map(|b| b.attackers.iter().copied())
            .collect()
    }

    /// Attackers `blocker` blocks, in damage assignment order once ordered
    pub fn attackers_blocked_by(&self, blocker: CardId) -> Vec<CardId> {
        match self.attacker_order.get(&blocker) {
            Some(order) => order.clone(),
            None => self.declared_attackers_blocked_by(blocker),
        }
    }

    /// Every blocking creature, each once, ordered by the band it first
    /// blocks and then by declaration within that band
    pub fn all_blockers(&self) -> Vec<CardId> {
        let mut all = Vec::new();
        for list in self.blockers.values() {
            for b in list {
                if !all.contains(b) {
                    all.push(*b);
                }
            }
        }
        all
    }

    /// Blocked state of `attacker`'s band; before blockers are finalized this
    /// reflects whether anything blocks it yet
    pub fn is_blocked(&self, attacker: CardId) -> bool {
        match self.band_of(attacker) {
            Some(band) => match band.blocked {
                BlockedState::Blocked => true,
                BlockedState::Unblocked => false,
                BlockedState::Undetermined => !self.declared_blockers_of(attacker).is_empty(),
            },
            None => false,
        }
    }

    pub fn is_unblocked(&self, attacker: CardId) -> bool {
        self.is_attacking(attacker) && !self.is_blocked(attacker)
    }

    pub fn was_attacking(&self, card: CardId) -> bool {
        self.is_attacking(card) || self.lki.get(&card).is_some_and(|l| l.was_attacker)
    }

    pub fn was_blocking(&self, card: CardId) -> bool {
        self.is_blocking(card) || self.lki.get(&card).is_some_and(|l| l.was_blocker)
    }

    pub fn lki(&self, card: CardId) -> Option<&CombatLki> {
        self.lki.get(&card)
    }

    pub fn pending_damage(&self) -> &CombatDamageMap {
        &self.pending_damage
    }

    pub fn dealt_first_strike_damage(&self, card: CardId) -> bool {
        self.dealt_first_strike.contains(&card)
    }

    /// Does any combatant deal damage in a first-strike step?
    pub fn has_first_strike_combatants(&self, state: &GameState) -> bool {
        self.attackers()
            .into_iter()
            .chain(self.all_blockers())
            .filter_map(|c| state.cards.get(c).ok())
            .any(|c| c.deals_first_strike_damage())
    }

    fn set_attacking_view(&self, state: &mut GameState, card: CardId, attacking: bool) {
        if let Ok(c) = state.cards.get_mut(card) {
            c.view.attacking = attacking;
        }
    }

    fn set_blocking_view(&self, state: &mut GameState, card: CardId, blocking: bool) {
        if let Ok(c) = state.cards.get_mut(card) {
            c.view.blocking = blocking;
        }
    }
}

fn is_permutation(expected: &[CardId], provided: &[CardId]) -> bool {
    if expected.len() != provided.len() {
        return false;
    }
    let mut a = expected.to_vec();
    let mut b = provided.to_vec();
    a.sort();
    b.sort();
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Keyword;
    use crate::game::{EventLog, Step};

    fn setup() -> (GameState, PlayerId, PlayerId) {
        let mut game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
        game.logger.enable_capture();
        game.turn.set_step(Step::DeclareAttackers);
        let p1 = game.players[0].id;
        let p2 = game.players[1].id;
        (game, p1, p2)
    }

    #[test]
    fn test_declare_attacker() {
        let (mut game, p1, p2) = setup();
        let bear = game.create_creature(p1, "Grizzly Bears", 2, 2);
        let mut combat = Combat::new(&game, p1);
        assert_eq!(combat.defenders(), &[Defender::Player(p2)]);

        combat.declare_attacker(&mut game, bear, Defender::Player(p2)).unwrap();

        assert!(combat.is_attacking(bear));
        assert_eq!(combat.defender_of(bear), Some(Defender::Player(p2)));
        assert_eq!(combat.defending_player_of(&game, bear), Some(p2));
        assert_eq!(combat.stage(), CombatStage::AttackersDeclared);
        assert!(game.cards.get(bear).unwrap().view.attacking);
    }

    #[test]
    fn test_readding_attacker_moves_it() {
        let (mut game, p1, p2) = setup();
        let bear = game.create_creature(p1, "Grizzly Bears", 2, 2);
        let walker = game.create_permanent(p2, "Jace", |c| {
            c.types.push(crate::core::CardType::Planeswalker);
            c.add_counter(crate::core::CounterType::loyalty(), 3);
        });
        let mut combat = Combat::new(&game, p1);

        assert!(combat.add_attacker(&mut game, bear, Defender::Player(p2)));
        assert!(combat.add_attacker(&mut game, bear, Defender::Planeswalker(walker)));

        assert_eq!(combat.bands().count(), 1);
        assert_eq!(combat.defender_of(bear), Some(Defender::Planeswalker(walker)));
        assert_eq!(combat.defending_player_of(&game, bear), Some(p2));
    }

    #[test]
    fn test_stale_defender_is_a_logged_noop() {
        let (mut game, p1, _p2) = setup();
        let bear = game.create_creature(p1, "Grizzly Bears", 2, 2);
        let mut combat = Combat::new(&game, p1);

        assert!(!combat.add_attacker(&mut game, bear, Defender::Planeswalker(CardId::new(999))));
        assert!(!combat.is_attacking(bear));
        assert_eq!(game.logger.logs().in_category("warning").count(), 1);
    }

    #[test]
    fn test_tapped_creature_cannot_be_declared() {
        let (mut game, p1, p2) = setup();
        let bear = game.create_creature(p1, "Grizzly Bears", 2, 2);
        game.cards.get_mut(bear).unwrap().tap();
        let mut combat = Combat::new(&game, p1);

        let err = combat.declare_attacker(&mut game, bear, Defender::Player(p2)).unwrap_err();
        assert!(matches!(err, CombatViolation::CannotAttack { .. }));
        assert_eq!(err.to_string(), format!("Grizzly Bears ({bear}) can't attack"));
    }

    #[test]
    fn test_finish_declaration_taps_without_vigilance() {
        let (mut game, p1, p2) = setup();
        let bear = game.create_creature(p1, "Grizzly Bears", 2, 2);
        let knight = game.create_creature(p1, "Vigilant Knight", 2, 2);
        game.cards.get_mut(knight).unwrap().keywords.push(Keyword::Vigilance);
        let mut combat = Combat::new(&game, p1);
        let mut log = EventLog::new();

        combat.declare_attacker(&mut game, bear, Defender::Player(p2)).unwrap();
        combat.declare_attacker(&mut game, knight, Defender::Player(p2)).unwrap();
        combat.finish_attacker_declaration(&mut game, &mut log).unwrap();

        assert!(game.cards.get(bear).unwrap().tapped);
        assert!(!game.cards.get(knight).unwrap().tapped);
        assert_eq!(combat.stage(), CombatStage::AttackersValidated);
        assert_eq!(
            log.events()[1],
            CombatEvent::Attacks {
                attacker: bear,
                defender: Defender::Player(p2),
                others: vec![knight],
            }
        );
    }

    #[test]
    fn test_blockers_and_queries() {
        let (mut game, p1, p2) = setup();
        let giant = game.create_creature(p1, "Hill Giant", 3, 3);
        let wall = game.create_creature(p2, "Wall", 0, 4);
        let bear = game.create_creature(p2, "Bear", 2, 2);
        let mut combat = Combat::new(&game, p1);
        let mut log = EventLog::new();

        combat.declare_attacker(&mut game, giant, Defender::Player(p2)).unwrap();
        combat.finish_attacker_declaration(&mut game, &mut log).unwrap();
        combat.declare_blocker(&mut game, giant, wall).unwrap();
        combat.declare_blocker(&mut game, giant, bear).unwrap();

        assert_eq!(combat.stage(), CombatStage::BlockersDeclared);
        assert_eq!(combat.blockers_of(giant), vec![wall, bear]);
        assert_eq!(combat.attackers_blocked_by(bear), vec![giant]);
        assert!(combat.is_blocking(wall));
        assert!(combat.is_blocked(giant));

        combat.finalize_blockers(&mut game, &mut log).unwrap();
        assert_eq!(combat.stage(), CombatStage::BlockersValidated);
        assert_eq!(
            log.count_matching(|e| matches!(e, CombatEvent::AttackerBlocked { .. })),
            1
        );
    }

    #[test]
    fn test_unblocked_band_fires_unblocked_once_per_member() {
        let (mut game, p1, p2) = setup();
        let a = game.create_creature(p1, "A", 1, 1);
        let b = game.create_creature(p1, "B", 1, 1);
        let mut combat = Combat::new(&game, p1);
        let mut log = EventLog::new();

        combat.add_attacker(&mut game, a, Defender::Player(p2));
        let band = combat.band_id_of(a).unwrap();
        combat.add_attacker_to_band(&mut game, b, band);
        combat.finish_attacker_declaration(&mut game, &mut log).unwrap();
        combat.finalize_blockers(&mut game, &mut log).unwrap();

        assert_eq!(
            log.count_matching(|e| matches!(e, CombatEvent::AttackerUnblocked { .. })),
            2
        );
        assert!(combat.is_unblocked(a));
        // Forced state overrides the automatic determination
        assert!(combat.set_blocked(a, true));
        assert!(combat.is_blocked(b));
    }

    #[test]
    fn test_set_blocker_order_requires_permutation() {
        let (mut game, p1, p2) = setup();
        let giant = game.create_creature(p1, "Hill Giant", 3, 3);
        let x = game.create_creature(p2, "X", 1, 1);
        let y = game.create_creature(p2, "Y", 1, 1);
        let mut combat = Combat::new(&game, p1);
        combat.add_attacker(&mut game, giant, Defender::Player(p2));
        combat.add_blocker(&mut game, giant, x);
        combat.add_blocker(&mut game, giant, y);

        assert!(combat.set_blocker_order(giant, vec![y, x]).is_ok());
        assert_eq!(combat.blockers_of(giant), vec![y, x]);
        let err = combat.set_blocker_order(giant, vec![y]).unwrap_err();
        assert!(matches!(err, MtgError::InvalidBlockerOrder { .. }));
    }

    #[test]
    fn test_remove_from_combat_keeps_lki() {
        let (mut game, p1, p2) = setup();
        let giant = game.create_creature(p1, "Hill Giant", 3, 3);
        let x = game.create_creature(p2, "X", 1, 1);
        let y = game.create_creature(p2, "Y", 1, 1);
        let mut combat = Combat::new(&game, p1);
        combat.add_attacker(&mut game, giant, Defender::Player(p2));
        combat.add_blocker(&mut game, giant, x);
        combat.add_blocker(&mut game, giant, y);
        combat.set_blocker_order(giant, vec![x, y]).unwrap();

        assert!(combat.remove_from_combat(&mut game, x));
        assert!(!combat.is_blocking(x));
        assert!(combat.was_blocking(x));
        assert_eq!(combat.blockers_of(giant), vec![y]);
        // Still blocked even though one blocker left
        assert!(combat.is_blocked(giant));

        assert!(combat.remove_from_combat(&mut game, giant));
        assert!(combat.was_attacking(giant));
        assert_eq!(combat.original_defender_of(giant), Some(Defender::Player(p2)));
        assert_eq!(combat.lki(giant).map(|l| l.defender), Some(Some(Defender::Player(p2))));
        // The emptied band took y's block with it, but y still blocked
        assert!(!combat.is_blocking(y));
        assert!(combat.was_blocking(y));
        assert!(combat.lki(y).is_some_and(|l| l.was_blocker && !l.was_attacker));
        assert!(!combat.remove_from_combat(&mut game, giant));
    }

    #[test]
    fn test_all_blockers_follow_band_order() {
        let (mut game, p1, p2) = setup();
        let giant = game.create_creature(p1, "Hill Giant", 3, 3);
        let bear = game.create_creature(p1, "Grizzly Bears", 2, 2);
        let x = game.create_creature(p2, "X", 1, 1);
        let y = game.create_creature(p2, "Y", 1, 1);
        let z = game.create_creature(p2, "Z", 1, 1);
        let mut combat = Combat::new(&game, p1);
        combat.add_attacker(&mut game, giant, Defender::Player(p2));
        combat.add_attacker(&mut game, bear, Defender::Player(p2));
        combat.add_blocker(&mut game, bear, x);
        combat.add_blocker(&mut game, giant, z);
        combat.add_blocker(&mut game, giant, y);

        // The giant's band was formed first
        assert_eq!(combat.all_blockers(), vec![z, y, x]);
    }

    #[test]
    fn test_withdrawn_attacker_leaves_no_trace() {
        let (mut game, p1, p2) = setup();
        let giant = game.create_creature(p1, "Hill Giant", 3, 3);
        let bear = game.create_creature(p1, "Grizzly Bears", 2, 2);
        let mut combat = Combat::new(&game, p1);
        combat.add_attacker(&mut game, giant, Defender::Player(p2));
        combat.add_attacker(&mut game, bear, Defender::Player(p2));

        assert!(combat.withdraw_attacker(&mut game, giant));
        assert_eq!(combat.attackers(), vec![bear]);
        assert!(!combat.was_attacking(giant));
        assert_eq!(combat.original_defender_of(giant), None);
        assert!(!game.cards.get(giant).unwrap().view.attacking);
        assert!(!combat.withdraw_attacker(&mut game, giant));
    }

    #[test]
    fn test_end_combat_clears_everything() {
        let (mut game, p1, p2) = setup();
        let giant = game.create_creature(p1, "Hill Giant", 3, 3);
        let wall = game.create_creature(p2, "Wall", 0, 4);
        let mut combat = Combat::new(&game, p1);
        let mut log = EventLog::new();
        combat.add_attacker(&mut game, giant, Defender::Player(p2));
        combat.add_blocker(&mut game, giant, wall);

        combat.end_combat(&mut game, &mut log);

        assert_eq!(combat.stage(), CombatStage::Ended);
        assert!(combat.attackers().is_empty());
        assert!(combat.all_blockers().is_empty());
        assert!(combat.lki(giant).is_none());
        assert!(!game.cards.get(giant).unwrap().view.attacking);
        assert!(!game.cards.get(wall).unwrap().view.blocking);
        assert_eq!(log.events(), &[CombatEvent::CombatEnded { attacking_player: p1 }]);

        // Ending twice is harmless
        combat.end_combat(&mut game, &mut log);
        assert_eq!(log.events().len(), 1);
    }

    #[test]
    fn test_copy_remapped() {
        let (mut game, p1, p2) = setup();
        let giant = game.create_creature(p1, "Hill Giant", 3, 3);
        let bear = game.create_creature(p1, "Bear", 2, 2);
        let wall = game.create_creature(p2, "Wall", 0, 4);
        let mut combat = Combat::new(&game, p1);
        combat.add_attacker(&mut game, giant, Defender::Player(p2));
        combat.add_attacker(&mut game, bear, Defender::Player(p2));
        combat.add_blocker(&mut game, giant, wall);

        let mut map = IdMap::new();
        map.map_card(giant, CardId::new(100)).map_card(wall, CardId::new(102));
        let copy = combat.copy_remapped(&map);

        assert_eq!(copy.attackers(), vec![CardId::new(100)]);
        assert_eq!(copy.blockers_of(CardId::new(100)), vec![CardId::new(102)]);
        assert_eq!(copy.attacking_player(), p1);
        // The original is untouched
        assert_eq!(combat.attackers(), vec![giant, bear]);
    }
}
