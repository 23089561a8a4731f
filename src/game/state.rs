//! Main game state structure
//!
//! Combat only needs a slice of the full game: permanents on the battlefield,
//! players and their life totals, graveyards for creatures that die, the
//! current step, and the damage prevention shields that are active.

use crate::core::{Card, CardId, EntityId, EntityStore, Player, PlayerId, StaticRule};
use crate::game::{GameLogger, Step, TurnStructure};
use crate::zones::{CardZone, PlayerZones, Zone};
use crate::{MtgError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Active damage prevention, consulted once per damage pass
#[derive(Debug, Clone, Default)]
pub struct PreventionEffects {
    /// "Prevent all combat damage that would be dealt this turn"
    pub all_combat_damage: bool,

    /// Sources whose combat damage is prevented
    pub sources: BTreeSet<CardId>,

    /// Remaining "prevent the next N damage" shields on permanents
    pub card_shields: BTreeMap<CardId, i32>,

    /// Remaining "prevent the next N damage" shields on players
    pub player_shields: BTreeMap<PlayerId, i32>,
}

impl PreventionEffects {
    pub fn is_empty(&self) -> bool {
        !self.all_combat_damage
            && self.sources.is_empty()
            && self.card_shields.is_empty()
            && self.player_shields.is_empty()
    }
}

/// Complete game state
///
/// Designed to be cheaply clonable for what-if evaluation.
#[derive(Debug, Clone)]
pub struct GameState {
    /// All cards in the game
    pub cards: EntityStore<Card>,

    /// All players in the game (Vec for stable ordering, small count)
    pub players: Vec<Player>,

    /// Zones for each player
    pub player_zones: Vec<(PlayerId, PlayerZones)>,

    /// Shared battlefield (all players)
    pub battlefield: CardZone,

    /// Turn structure
    pub turn: TurnStructure,

    pub prevention: PreventionEffects,

    /// Unified entity ID generator (shared across all entity types)
    next_entity_id: u32,

    /// Centralized logger for game events
    pub logger: GameLogger,
}

impl GameState {
    /// Create a game with the named players; the first one is active
    pub fn new(player_names: &[&str], starting_life: i32) -> Self {
        let mut next_id = 0;
        let mut players = Vec::with_capacity(player_names.len());
        let mut player_zones = Vec::with_capacity(player_names.len());

        for name in player_names {
            let id = PlayerId::new(next_id);
            next_id += 1;
            players.push(Player::new(id, *name, starting_life));
            player_zones.push((id, PlayerZones::new(id)));
        }

        // The battlefield doesn't belong to anyone, but a zone needs an owner id
        let shared_id = PlayerId::new(next_id);
        next_id += 1;
        let active = players.first().map(|p| p.id).unwrap_or(shared_id);

        GameState {
            cards: EntityStore::new(),
            players,
            player_zones,
            battlefield: CardZone::new(Zone::Battlefield, shared_id),
            turn: TurnStructure::new(active),
            prevention: PreventionEffects::default(),
            next_entity_id: next_id,
            logger: GameLogger::new(),
        }
    }

    /// Create a new game with two players
    pub fn new_two_player(player1_name: String, player2_name: String, starting_life: i32) -> Self {
        Self::new(&[player1_name.as_str(), player2_name.as_str()], starting_life)
    }

    /// Get next entity ID (unified across all entity types)
    pub fn next_id<T>(&mut self) -> EntityId<T> {
        let id = EntityId::new(self.next_entity_id);
        self.next_entity_id += 1;
        id
    }

    pub fn next_card_id(&mut self) -> CardId {
        self.next_id()
    }

    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.iter().map(|p| p.id)
    }

    /// Get a player by ID
    pub fn get_player(&self, id: PlayerId) -> Result<&Player> {
        self.players
            .iter()
            .find(|p| p.id == id)
            .ok_or(MtgError::EntityNotFound(id.as_u32()))
    }

    /// Get a mutable player by ID
    pub fn get_player_mut(&mut self, id: PlayerId) -> Result<&mut Player> {
        self.players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(MtgError::EntityNotFound(id.as_u32()))
    }

    pub fn get_player_zones(&self, player_id: PlayerId) -> Option<&PlayerZones> {
        self.player_zones
            .iter()
            .find(|(id, _)| *id == player_id)
            .map(|(_, zones)| zones)
    }

    pub fn get_player_zones_mut(&mut self, player_id: PlayerId) -> Option<&mut PlayerZones> {
        self.player_zones
            .iter_mut()
            .find(|(id, _)| *id == player_id)
            .map(|(_, zones)| zones)
    }

    /// Players still in the game other than `player`, in seat order
    pub fn opponents_of(&self, player: PlayerId) -> impl Iterator<Item = PlayerId> + '_ {
        self.players
            .iter()
            .filter(move |p| p.id != player && !p.has_lost)
            .map(|p| p.id)
    }

    /// Name for log lines; unknown ids render as their number
    pub fn card_name(&self, card_id: CardId) -> String {
        self.cards
            .get(card_id)
            .map(|c| c.name.to_string())
            .unwrap_or_else(|_| format!("card {card_id}"))
    }

    pub fn player_name(&self, player_id: PlayerId) -> String {
        self.get_player(player_id)
            .map(|p| p.name.to_string())
            .unwrap_or_else(|_| format!("player {player_id}"))
    }

    /// Put a card onto the battlefield under its owner's control
    pub fn add_to_battlefield(&mut self, card: Card) -> CardId {
        let id = card.id;
        self.cards.insert(id, card);
        self.battlefield.add(id);
        id
    }

    /// Create a vanilla creature on the battlefield, ready to attack
    pub fn create_creature(&mut self, owner: PlayerId, name: &str, power: i8, toughness: i8) -> CardId {
        let id = self.next_card_id();
        self.add_to_battlefield(Card::creature(id, name, owner, power, toughness))
    }

    /// Create a permanent on the battlefield after letting `build` configure it
    pub fn create_permanent(
        &mut self,
        owner: PlayerId,
        name: &str,
        build: impl FnOnce(&mut Card),
    ) -> CardId {
        let id = self.next_card_id();
        let mut card = Card::new(id, name, owner);
        build(&mut card);
        self.add_to_battlefield(card)
    }

    /// On the battlefield and not phased out
    pub fn is_on_battlefield(&self, card_id: CardId) -> bool {
        self.battlefield.contains(card_id)
            && self.cards.get(card_id).map(|c| !c.phased_out).unwrap_or(false)
    }

    /// Permanents on the battlefield in stable order (phased-out ones excluded)
    pub fn battlefield_cards(&self) -> impl Iterator<Item = &Card> + '_ {
        self.battlefield
            .cards
            .iter()
            .filter_map(|id| self.cards.get(*id).ok())
            .filter(|c| !c.phased_out)
    }

    pub fn creatures_controlled_by(&self, player: PlayerId) -> impl Iterator<Item = &Card> + '_ {
        self.battlefield_cards()
            .filter(move |c| c.controller == player && c.is_creature())
    }

    pub fn lands_controlled_by(&self, player: PlayerId) -> impl Iterator<Item = &Card> + '_ {
        self.battlefield_cards()
            .filter(move |c| c.controller == player && c.is_land())
    }

    pub fn planeswalkers_controlled_by(&self, player: PlayerId) -> impl Iterator<Item = &Card> + '_ {
        self.battlefield_cards()
            .filter(move |c| c.controller == player && c.is_planeswalker())
    }

    /// Every static combat rule in play, with the permanent imposing it
    pub fn static_rules(&self) -> impl Iterator<Item = (&Card, &StaticRule)> + '_ {
        self.battlefield_cards()
            .flat_map(|c| c.static_rules.iter().map(move |r| (c, r)))
    }

    pub fn current_step(&self) -> Step {
        self.turn.current_step
    }

    pub fn active_player(&self) -> PlayerId {
        self.turn.active_player
    }

    /// Move a card from one zone to another
    pub fn move_card(&mut self, card_id: CardId, from: Zone, to: Zone, owner: PlayerId) -> Result<()> {
        let removed = match from {
            Zone::Battlefield => self.battlefield.remove(card_id),
            _ => self
                .get_player_zones_mut(owner)
                .and_then(|zones| zones.get_zone_mut(from))
                .map(|zone| zone.remove(card_id))
                .unwrap_or(false),
        };

        if !removed {
            return Err(MtgError::InvalidAction(format!(
                "Card {card_id} not found in source zone {from:?}"
            )));
        }

        match to {
            Zone::Battlefield => self.battlefield.add(card_id),
            _ => {
                if let Some(zone) = self
                    .get_player_zones_mut(owner)
                    .and_then(|zones| zones.get_zone_mut(to))
                {
                    zone.add(card_id);
                }
            }
        }

        // A permanent that changes zones becomes a new object
        if from == Zone::Battlefield {
            if let Ok(card) = self.cards.get_mut(card_id) {
                card.damage = 0;
                card.deathtouch_damaged = false;
                card.tapped = false;
                card.view = Default::default();
                card.controller = card.owner;
            }
        }

        Ok(())
    }

    /// Destroy creatures with lethal damage and planeswalkers with no loyalty
    ///
    /// Returns the ids that were moved to their owners' graveyards, in
    /// battlefield order.
    pub fn check_state_based_actions(&mut self) -> Result<Vec<CardId>> {
        let doomed: Vec<(CardId, PlayerId)> = self
            .battlefield_cards()
            .filter(|c| {
                let lethal_creature = c.is_creature()
                    && (c.current_toughness() <= 0
                        || c.damage >= c.current_toughness()
                        || (c.deathtouch_damaged && c.damage > 0));
                let dead_walker = c.is_planeswalker() && c.loyalty() == 0;
                lethal_creature || dead_walker
            })
            .map(|c| (c.id, c.owner))
            .collect();

        let mut moved = Vec::with_capacity(doomed.len());
        for (card_id, owner) in doomed {
            self.logger.combat(format_args!(
                "{} is put into its owner's graveyard",
                self.card_name(card_id)
            ));
            self.move_card(card_id, Zone::Battlefield, Zone::Graveyard, owner)?;
            moved.push(card_id);
        }
        Ok(moved)
    }

    /// Clear damage marked on permanents (cleanup step)
    pub fn clear_damage(&mut self) {
        let ids: Vec<CardId> = self.battlefield.cards.clone();
        for id in ids {
            if let Ok(card) = self.cards.get_mut(id) {
                card.damage = 0;
                card.deathtouch_damaged = false;
            }
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.players.iter().filter(|p| !p.has_lost).count() <= 1
    }
}
