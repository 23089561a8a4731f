//! Combat decision makers and the game state view they see
//!
//! The combat engine calls a controller whenever a player has a choice to
//! make: which creatures attack, how to block, the damage assignment order,
//! how to split damage, and whether to pay optional attack costs. The
//! controller inspects a read-only view of the game state to make choices.

use crate::core::{Card, CardId, PlayerId};
use crate::error::CombatViolation;
use crate::game::{Combat, DamageAssignment, DamageSlot, DamageTarget, Defender, GameState};
use smallvec::SmallVec;

/// Read-only view of game state for controllers
///
/// This provides access to game information without allowing mutation.
pub struct GameStateView<'a> {
    game: &'a GameState,
    player_id: PlayerId,
}

impl<'a> GameStateView<'a> {
    /// Create a new view of the game state from a player's perspective
    pub fn new(game: &'a GameState, player_id: PlayerId) -> Self {
        GameStateView { game, player_id }
    }

    /// Get the player ID this view is for
    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Full game state, for predicates that need it
    pub fn game(&self) -> &'a GameState {
        self.game
    }

    /// Get cards on the battlefield
    pub fn battlefield(&self) -> &[CardId] {
        &self.game.battlefield.cards
    }

    pub fn get_card(&self, card_id: CardId) -> Option<&'a Card> {
        self.game.cards.get(card_id).ok()
    }

    /// Get a card's name
    pub fn card_name(&self, card_id: CardId) -> Option<String> {
        self.get_card(card_id).map(|c| c.name.to_string())
    }

    pub fn player_name(&self) -> String {
        self.game.player_name(self.player_id)
    }

    /// Get player's current life total
    pub fn life(&self) -> i32 {
        self.game.get_player(self.player_id).map(|p| p.life).unwrap_or(0)
    }

    /// Generic mana the player has floating
    pub fn available_mana(&self) -> u32 {
        self.game
            .get_player(self.player_id)
            .map(|p| p.mana_pool.total())
            .unwrap_or(0)
    }

    pub fn power(&self, card_id: CardId) -> i32 {
        self.get_card(card_id).map(|c| c.current_power()).unwrap_or(0)
    }

    pub fn toughness(&self, card_id: CardId) -> i32 {
        self.get_card(card_id).map(|c| c.current_toughness()).unwrap_or(0)
    }
}

/// A creature that may attack and the defenders it may attack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOption {
    pub attacker: CardId,
    pub defenders: SmallVec<[Defender; 4]>,
}

/// Combat decision maker
///
/// Implement this trait to create AI players or connect to UI. Answers are
/// checked by the engine; an illegal answer is rejected and either asked
/// again or replaced with a legal default.
pub trait CombatController {
    /// Get the player ID this controller is responsible for
    fn player_id(&self) -> PlayerId;

    /// Pick attackers and what each attacks
    fn choose_attackers(
        &mut self,
        view: &GameStateView,
        combat: &Combat,
        options: &[AttackOption],
    ) -> SmallVec<[(CardId, Defender); 8]>;

    /// Pick blocks as (blocker, attacker) pairs
    ///
    /// `available` are this player's creatures that can block; `attackers`
    /// are the creatures attacking this player or their planeswalkers.
    fn choose_blockers(
        &mut self,
        view: &GameStateView,
        combat: &Combat,
        available: &[CardId],
        attackers: &[CardId],
    ) -> SmallVec<[(CardId, CardId); 8]>;

    /// Order the creatures blocking `attacker` for damage assignment
    fn order_blockers(&mut self, view: &GameStateView, attacker: CardId, blockers: &[CardId]) -> Vec<CardId>;

    /// Order the attackers `blocker` blocks for damage assignment
    fn order_attackers(&mut self, view: &GameStateView, blocker: CardId, attackers: &[CardId]) -> Vec<CardId>;

    /// Split `damage` from `source` among `slots`, in order, plus
    /// `trample_to` when the source has trample
    fn assign_combat_damage(
        &mut self,
        view: &GameStateView,
        source: CardId,
        slots: &[DamageSlot],
        trample_to: Option<DamageTarget>,
        damage: i32,
    ) -> DamageAssignment;

    /// Pay `cost` generic mana so `attacker` may attack?
    fn pay_optional_cost(&mut self, view: &GameStateView, attacker: CardId, cost: u32) -> bool;

    /// Called when a declaration was rejected, before asking again
    fn on_declaration_rejected(&mut self, _view: &GameStateView, _reason: &CombatViolation) {}
}

/// The decision makers taking part in a combat, found by player
pub struct ControllerSeats<'a> {
    controllers: Vec<&'a mut dyn CombatController>,
}

impl<'a> ControllerSeats<'a> {
    pub fn new(controllers: Vec<&'a mut dyn CombatController>) -> Self {
        ControllerSeats { controllers }
    }

    /// Two-player seating
    pub fn pair(first: &'a mut dyn CombatController, second: &'a mut dyn CombatController) -> Self {
        ControllerSeats {
            controllers: vec![first, second],
        }
    }

    pub fn get(&mut self, player: PlayerId) -> Option<&mut (dyn CombatController + 'a)> {
        self.controllers
            .iter_mut()
            .find(|c| c.player_id() == player)
            .map(|c| &mut **c)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}
