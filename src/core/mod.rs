//! Core game types and entities

pub mod card;
pub mod entity;
pub mod keywords;
pub mod mana;
pub mod player;
pub mod types;

pub use card::{Card, CardType, CombatView, Supertype};
pub use entity::{EntityId, EntityStore, GameEntity};
pub use keywords::{
    AttackCondition, CreatureFilter, Keyword, LandType, LandwalkKind, ProtectionFrom, RuleScope,
    StaticRule,
};
pub use mana::{Color, ManaPool};
pub use player::Player;
pub use types::{CardName, CounterType, PlayerName, Subtype};

pub type CardId = EntityId<Card>;
pub type PlayerId = EntityId<Player>;
