//! Combat scenario files
//!
//! A scenario is a JSON description of a board about to enter combat: the
//! players, the permanents each controls, and optionally the attacks,
//! blocks and damage orders to script. Card references inside a scenario
//! use the file's own numeric ids; players are referenced by seat index.
//!
//! ```json
//! {
//!   "players": [{ "name": "Alice" }, { "name": "Bob", "life": 12 }],
//!   "permanents": [
//!     { "id": 1, "name": "Serra Angel", "controller": 0, "power": 4, "toughness": 4,
//!       "keywords": ["Flying", "Vigilance"] },
//!     { "id": 2, "name": "Giant Spider", "controller": 1, "power": 2, "toughness": 4,
//!       "keywords": ["Reach"] }
//!   ],
//!   "attacks": [{ "attacker": 1, "defender": { "player": 1 } }],
//!   "blocks": [{ "blocker": 2, "attacker": 1 }]
//! }
//! ```

use crate::core::{
    CardId, CardType, Color, CounterType, Keyword, ManaPool, PlayerId, StaticRule, Subtype, Supertype,
};
use crate::game::{CombatOptions, Defender, GameState, ScriptedController, Step};
use crate::{MtgError, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::path::Path;

fn default_life() -> i32 {
    20
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPlayer {
    pub name: String,
    #[serde(default = "default_life")]
    pub life: i32,
    #[serde(default)]
    pub mana: ManaPool,
}

/// A permanent on the battlefield when combat begins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPermanent {
    pub id: u32,
    pub name: String,
    /// Seat index of the controller (also the owner)
    pub controller: usize,
    /// Defaults to `[Creature]` when power and toughness are given
    #[serde(default)]
    pub types: SmallVec<[CardType; 2]>,
    #[serde(default)]
    pub supertypes: SmallVec<[Supertype; 1]>,
    #[serde(default)]
    pub subtypes: Vec<String>,
    #[serde(default)]
    pub colors: SmallVec<[Color; 2]>,
    pub power: Option<i8>,
    pub toughness: Option<i8>,
    #[serde(default)]
    pub loyalty: u8,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
    #[serde(default)]
    pub static_rules: Vec<StaticRule>,
    #[serde(default)]
    pub tapped: bool,
    #[serde(default)]
    pub summoning_sick: bool,
    /// Seat indices of the players that goaded this creature
    #[serde(default)]
    pub goaded_by: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioDefender {
    /// Seat index
    Player(usize),
    /// Scenario id of a planeswalker
    Planeswalker(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioAttack {
    pub attacker: u32,
    pub defender: ScenarioDefender,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioBlock {
    pub blocker: u32,
    pub attacker: u32,
}

/// Damage assignment order for a combatant with several opponents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOrder {
    pub combatant: u32,
    pub order: Vec<u32>,
}

/// Scenario file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub description: Option<String>,
    pub players: Vec<ScenarioPlayer>,
    /// Seat index of the attacking player
    #[serde(default)]
    pub active_player: usize,
    #[serde(default)]
    pub permanents: Vec<ScenarioPermanent>,
    #[serde(default)]
    pub attacks: Vec<ScenarioAttack>,
    #[serde(default)]
    pub blocks: Vec<ScenarioBlock>,
    #[serde(default)]
    pub blocker_orders: Vec<ScenarioOrder>,
    #[serde(default)]
    pub attacker_orders: Vec<ScenarioOrder>,
    #[serde(default)]
    pub options: CombatOptions,
}

/// A scenario turned into a live game, with its ids resolved
pub struct LoadedScenario {
    pub game: GameState,
    pub attacking_player: PlayerId,
    pub attacks: Vec<(CardId, Defender)>,
    /// (blocker, attacker) pairs
    pub blocks: Vec<(CardId, CardId)>,
    pub blocker_orders: Vec<(CardId, Vec<CardId>)>,
    pub attacker_orders: Vec<(CardId, Vec<CardId>)>,
    pub options: CombatOptions,
    cards: FxHashMap<u32, CardId>,
}

impl Scenario {
    /// Load a scenario file from disk
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
            .map_err(|e| MtgError::ScenarioError(format!("{}: {e}", path.display())))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let scenario: Scenario =
            serde_json::from_str(contents).map_err(|e| MtgError::ScenarioError(e.to_string()))?;
        if scenario.players.len() < 2 {
            return Err(MtgError::ScenarioError(format!(
                "a combat needs at least two players, found {}",
                scenario.players.len()
            )));
        }
        if scenario.active_player >= scenario.players.len() {
            return Err(MtgError::ScenarioError(format!(
                "active player index {} out of range",
                scenario.active_player
            )));
        }
        Ok(scenario)
    }

    /// Build the game state at the beginning of combat
    pub fn build(&self) -> Result<LoadedScenario> {
        let names: Vec<&str> = self.players.iter().map(|p| p.name.as_str()).collect();
        let mut game = GameState::new(&names, 20);
        for (player, def) in game.players.iter_mut().zip(&self.players) {
            player.life = def.life;
            player.mana_pool = def.mana;
        }
        let seats: Vec<PlayerId> = game.player_ids().collect();
        let seat = |index: usize| {
            seats
                .get(index)
                .copied()
                .ok_or_else(|| MtgError::ScenarioError(format!("no player in seat {index}")))
        };

        let attacking_player = seat(self.active_player)?;
        game.turn.active_player = attacking_player;
        game.turn.set_step(Step::BeginCombat);
        game.logger.set_verbosity(self.options.verbosity);

        let mut cards: FxHashMap<u32, CardId> = FxHashMap::default();
        for def in &self.permanents {
            if cards.contains_key(&def.id) {
                return Err(MtgError::ScenarioError(format!("duplicate permanent id {}", def.id)));
            }
            let owner = seat(def.controller)?;
            let goaded_by = def
                .goaded_by
                .iter()
                .map(|i| seat(*i))
                .collect::<Result<SmallVec<[PlayerId; 2]>>>()?;
            let card_id = game.create_permanent(owner, &def.name, |card| {
                card.types = def.types.clone();
                if card.types.is_empty() && def.power.is_some() && def.toughness.is_some() {
                    card.types.push(CardType::Creature);
                }
                card.supertypes = def.supertypes.clone();
                card.subtypes = def.subtypes.iter().map(|s| Subtype::new(s.as_str())).collect();
                card.colors = def.colors.clone();
                card.power = def.power;
                card.toughness = def.toughness;
                if def.loyalty > 0 {
                    card.add_counter(CounterType::loyalty(), def.loyalty);
                }
                card.keywords = def.keywords.iter().copied().collect();
                card.static_rules = def.static_rules.iter().cloned().collect();
                card.tapped = def.tapped;
                card.summoning_sick = def.summoning_sick;
                card.goaded_by = goaded_by;
            });
            cards.insert(def.id, card_id);
        }

        let card = |id: u32| {
            cards
                .get(&id)
                .copied()
                .ok_or_else(|| MtgError::ScenarioError(format!("unknown permanent id {id}")))
        };

        let attacks = self
            .attacks
            .iter()
            .map(|a| {
                let defender = match a.defender {
                    ScenarioDefender::Player(i) => Defender::Player(seat(i)?),
                    ScenarioDefender::Planeswalker(id) => Defender::Planeswalker(card(id)?),
                };
                Ok((card(a.attacker)?, defender))
            })
            .collect::<Result<Vec<_>>>()?;
        let blocks = self
            .blocks
            .iter()
            .map(|b| Ok((card(b.blocker)?, card(b.attacker)?)))
            .collect::<Result<Vec<_>>>()?;
        let resolve_orders = |orders: &[ScenarioOrder]| {
            orders
                .iter()
                .map(|o| {
                    let order = o.order.iter().map(|id| card(*id)).collect::<Result<Vec<_>>>()?;
                    Ok((card(o.combatant)?, order))
                })
                .collect::<Result<Vec<_>>>()
        };
        let blocker_orders = resolve_orders(&self.blocker_orders)?;
        let attacker_orders = resolve_orders(&self.attacker_orders)?;

        Ok(LoadedScenario {
            game,
            attacking_player,
            attacks,
            blocks,
            blocker_orders,
            attacker_orders,
            options: self.options.clone(),
            cards,
        })
    }
}

impl LoadedScenario {
    /// Game id of the permanent with scenario id `id`
    pub fn card(&self, id: u32) -> Option<CardId> {
        self.cards.get(&id).copied()
    }

    /// A controller for `player` replaying the scripted part of the scenario
    /// that belongs to them
    pub fn scripted_controller(&self, player: PlayerId) -> ScriptedController {
        let controls = |card: CardId| {
            self.game
                .cards
                .get(card)
                .map(|c| c.controller == player)
                .unwrap_or(false)
        };

        let mut controller = ScriptedController::new(player);
        if player == self.attacking_player {
            controller = controller.with_attacks(self.attacks.clone());
        }
        let blocks: Vec<(CardId, CardId)> = self.blocks.iter().copied().filter(|(b, _)| controls(*b)).collect();
        controller = controller.with_blocks(blocks);
        for (attacker, order) in self.blocker_orders.iter().filter(|(a, _)| controls(*a)) {
            controller = controller.with_blocker_order(*attacker, order.clone());
        }
        for (blocker, order) in self.attacker_orders.iter().filter(|(b, _)| controls(*b)) {
            controller = controller.with_attacker_order(*blocker, order.clone());
        }
        controller
    }
}
