//! Scripted controller for tests and scenario files
//!
//! This controller follows a predetermined combat plan: fixed attacks,
//! fixed blocks, and optional damage orders and splits. Anything the plan
//! doesn't cover falls back to the declared order and the default split.

use crate::core::{CardId, PlayerId};
use crate::error::CombatViolation;
use crate::game::controller::{AttackOption, CombatController, GameStateView};
use crate::game::damage::default_assignment;
use crate::game::{Combat, DamageAssignment, DamageSlot, DamageTarget, Defender};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// A controller that plays back a predetermined combat plan
pub struct ScriptedController {
    player_id: PlayerId,
    attacks: Vec<(CardId, Defender)>,
    blocks: Vec<(CardId, CardId)>,
    blocker_orders: FxHashMap<CardId, Vec<CardId>>,
    attacker_orders: FxHashMap<CardId, Vec<CardId>>,
    damage: FxHashMap<CardId, DamageAssignment>,
    pays_costs: bool,
    rejections: Vec<CombatViolation>,
}

impl ScriptedController {
    pub fn new(player_id: PlayerId) -> Self {
        ScriptedController {
            player_id,
            attacks: Vec::new(),
            blocks: Vec::new(),
            blocker_orders: FxHashMap::default(),
            attacker_orders: FxHashMap::default(),
            damage: FxHashMap::default(),
            pays_costs: true,
            rejections: Vec::new(),
        }
    }

    pub fn with_attacks(mut self, attacks: Vec<(CardId, Defender)>) -> Self {
        self.attacks = attacks;
        self
    }

    /// Blocks as (blocker, attacker) pairs
    pub fn with_blocks(mut self, blocks: Vec<(CardId, CardId)>) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn with_blocker_order(mut self, attacker: CardId, order: Vec<CardId>) -> Self {
        self.blocker_orders.insert(attacker, order);
        self
    }

    pub fn with_attacker_order(mut self, blocker: CardId, order: Vec<CardId>) -> Self {
        self.attacker_orders.insert(blocker, order);
        self
    }

    pub fn with_damage(mut self, source: CardId, assignment: DamageAssignment) -> Self {
        self.damage.insert(source, assignment);
        self
    }

    pub fn refusing_costs(mut self) -> Self {
        self.pays_costs = false;
        self
    }

    /// Declarations the engine rejected, oldest first
    pub fn rejections(&self) -> &[CombatViolation] {
        &self.rejections
    }
}

impl CombatController for ScriptedController {
    fn player_id(&self) -> PlayerId {
        self.player_id
    }

    fn choose_attackers(
        &mut self,
        _view: &GameStateView,
        _combat: &Combat,
        _options: &[AttackOption],
    ) -> SmallVec<[(CardId, Defender); 8]> {
        self.attacks.iter().copied().collect()
    }

    fn choose_blockers(
        &mut self,
        _view: &GameStateView,
        _combat: &Combat,
        _available: &[CardId],
        _attackers: &[CardId],
    ) -> SmallVec<[(CardId, CardId); 8]> {
        self.blocks.iter().copied().collect()
    }

    fn order_blockers(&mut self, _view: &GameStateView, attacker: CardId, blockers: &[CardId]) -> Vec<CardId> {
        self.blocker_orders
            .get(&attacker)
            .cloned()
            .unwrap_or_else(|| blockers.to_vec())
    }

    fn order_attackers(&mut self, _view: &GameStateView, blocker: CardId, attackers: &[CardId]) -> Vec<CardId> {
        self.attacker_orders
            .get(&blocker)
            .cloned()
            .unwrap_or_else(|| attackers.to_vec())
    }

    fn assign_combat_damage(
        &mut self,
        _view: &GameStateView,
        source: CardId,
        slots: &[DamageSlot],
        trample_to: Option<DamageTarget>,
        damage: i32,
    ) -> DamageAssignment {
        self.damage
            .get(&source)
            .cloned()
            .unwrap_or_else(|| default_assignment(slots, trample_to, damage))
    }

    fn pay_optional_cost(&mut self, view: &GameStateView, _attacker: CardId, cost: u32) -> bool {
        self.pays_costs && view.available_mana() >= cost
    }

    fn on_declaration_rejected(&mut self, _view: &GameStateView, reason: &CombatViolation) {
        self.rejections.push(reason.clone());
    }
}
