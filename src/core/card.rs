//! Card types and definitions

use crate::core::{
    CardId, CardName, Color, CounterType, EntityId, GameEntity, Keyword, LandwalkKind, PlayerId,
    ProtectionFrom, StaticRule, Subtype,
};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Card types in MTG
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    Creature,
    Instant,
    Sorcery,
    Enchantment,
    Artifact,
    Land,
    Planeswalker,
}

/// Supertypes that landwalk variants care about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Supertype {
    Basic,
    Legendary,
    Snow,
}

/// Presentation flags refreshed by combat for UI collaborators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatView {
    pub attacking: bool,
    pub blocking: bool,
}

/// Represents a card in the game
///
/// Cards have a unique EntityId but many cards can share the same card definition.
/// This struct represents the instance of a card during gameplay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    /// Unique ID for this card instance
    pub id: CardId,

    pub name: CardName,

    /// Card types (a card can be multiple types)
    pub types: SmallVec<[CardType; 2]>,

    pub supertypes: SmallVec<[Supertype; 1]>,

    /// Card subtypes (e.g., "Goblin", "Island")
    pub subtypes: SmallVec<[Subtype; 2]>,

    /// Colors of the card (empty means colorless)
    pub colors: SmallVec<[Color; 2]>,

    /// Power (for creatures)
    pub power: Option<i8>,

    /// Toughness (for creatures)
    pub toughness: Option<i8>,

    /// Player who owns this card
    pub owner: PlayerId,

    /// Current controller (can differ from owner)
    pub controller: PlayerId,

    pub tapped: bool,

    /// Came under its controller's control this turn
    pub summoning_sick: bool,

    pub phased_out: bool,

    /// Damage marked on this permanent this turn
    pub damage: i32,

    /// Dealt damage by a source with deathtouch since the last state-based check
    pub deathtouch_damaged: bool,

    /// Counters on this card: +1/+1, -1/-1, loyalty
    pub counters: SmallVec<[(CounterType, u8); 2]>,

    pub keywords: SmallVec<[Keyword; 4]>,

    /// Static combat rules this permanent imposes while on the battlefield
    pub static_rules: SmallVec<[StaticRule; 1]>,

    /// Players that goaded this creature
    pub goaded_by: SmallVec<[PlayerId; 2]>,

    pub view: CombatView,
}

impl Card {
    pub fn new(id: CardId, name: impl Into<CardName>, owner: PlayerId) -> Self {
        Card {
            id,
            name: name.into(),
            types: SmallVec::new(),
            supertypes: SmallVec::new(),
            subtypes: SmallVec::new(),
            colors: SmallVec::new(),
            power: None,
            toughness: None,
            owner,
            controller: owner,
            tapped: false,
            summoning_sick: false,
            phased_out: false,
            damage: 0,
            deathtouch_damaged: false,
            counters: SmallVec::new(),
            keywords: SmallVec::new(),
            static_rules: SmallVec::new(),
            goaded_by: SmallVec::new(),
            view: CombatView::default(),
        }
    }

    /// Convenience constructor for a vanilla creature
    pub fn creature(id: CardId, name: impl Into<CardName>, owner: PlayerId, power: i8, toughness: i8) -> Self {
        let mut card = Card::new(id, name, owner);
        card.types.push(CardType::Creature);
        card.power = Some(power);
        card.toughness = Some(toughness);
        card
    }

    pub fn is_type(&self, card_type: CardType) -> bool {
        self.types.contains(&card_type)
    }

    pub fn is_creature(&self) -> bool {
        self.is_type(CardType::Creature)
    }

    pub fn is_land(&self) -> bool {
        self.is_type(CardType::Land)
    }

    pub fn is_planeswalker(&self) -> bool {
        self.is_type(CardType::Planeswalker)
    }

    pub fn is_artifact(&self) -> bool {
        self.is_type(CardType::Artifact)
    }

    pub fn has_supertype(&self, supertype: Supertype) -> bool {
        self.supertypes.contains(&supertype)
    }

    pub fn has_color(&self, color: Color) -> bool {
        self.colors.contains(&color)
    }

    pub fn shares_color_with(&self, other: &Card) -> bool {
        self.colors.iter().any(|c| other.colors.contains(c))
    }

    pub fn tap(&mut self) {
        self.tapped = true;
    }

    pub fn untap(&mut self) {
        self.tapped = false;
    }

    pub fn add_counter(&mut self, counter_type: CounterType, amount: u8) {
        if let Some((_, count)) = self.counters.iter_mut().find(|(t, _)| *t == counter_type) {
            *count = count.saturating_add(amount);
        } else {
            self.counters.push((counter_type, amount));
        }
    }

    /// Remove up to `amount` counters, returning how many were removed
    pub fn remove_counters(&mut self, counter_type: &CounterType, amount: u8) -> u8 {
        match self.counters.iter_mut().find(|(t, _)| t == counter_type) {
            Some((_, count)) => {
                let removed = (*count).min(amount);
                *count -= removed;
                removed
            }
            None => 0,
        }
    }

    pub fn get_counter(&self, counter_type: &CounterType) -> u8 {
        self.counters
            .iter()
            .find(|(t, _)| t == counter_type)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub fn loyalty(&self) -> u8 {
        self.get_counter(&CounterType::loyalty())
    }

    /// Get current power (including counters)
    pub fn current_power(&self) -> i32 {
        let base = self.power.unwrap_or(0) as i32;
        base + self.get_counter(&CounterType::plus_one_plus_one()) as i32
            - self.get_counter(&CounterType::minus_one_minus_one()) as i32
    }

    /// Get current toughness (including counters)
    pub fn current_toughness(&self) -> i32 {
        let base = self.toughness.unwrap_or(0) as i32;
        base + self.get_counter(&CounterType::plus_one_plus_one()) as i32
            - self.get_counter(&CounterType::minus_one_minus_one()) as i32
    }

    /// Damage still needed to destroy this creature, ignoring damage assigned
    /// in the current step
    pub fn lethal_damage(&self) -> i32 {
        (self.current_toughness() - self.damage).max(0)
    }

    pub fn has_keyword(&self, keyword: &Keyword) -> bool {
        self.keywords.contains(keyword)
    }

    pub fn has_first_strike(&self) -> bool {
        self.has_keyword(&Keyword::FirstStrike)
    }

    pub fn has_double_strike(&self) -> bool {
        self.has_keyword(&Keyword::DoubleStrike)
    }

    /// Deals damage in the first combat damage step
    pub fn deals_first_strike_damage(&self) -> bool {
        self.has_first_strike() || self.has_double_strike()
    }

    pub fn has_trample(&self) -> bool {
        self.has_keyword(&Keyword::Trample)
    }

    pub fn has_deathtouch(&self) -> bool {
        self.has_keyword(&Keyword::Deathtouch)
    }

    pub fn has_lifelink(&self) -> bool {
        self.has_keyword(&Keyword::Lifelink)
    }

    pub fn has_vigilance(&self) -> bool {
        self.has_keyword(&Keyword::Vigilance)
    }

    pub fn has_banding(&self) -> bool {
        self.has_keyword(&Keyword::Banding)
    }

    pub fn landwalks(&self) -> impl Iterator<Item = LandwalkKind> + '_ {
        self.keywords.iter().filter_map(|k| match k {
            Keyword::Landwalk(kind) => Some(*kind),
            _ => None,
        })
    }

    pub fn protections(&self) -> impl Iterator<Item = ProtectionFrom> + '_ {
        self.keywords.iter().filter_map(|k| match k {
            Keyword::Protection(from) => Some(*from),
            _ => None,
        })
    }

    /// Is this permanent protected from `source` (for blocking purposes)?
    pub fn is_protected_from(&self, source: &Card) -> bool {
        self.protections().any(|from| match from {
            ProtectionFrom::Color(color) => source.has_color(color),
            ProtectionFrom::Artifacts => source.is_artifact(),
            ProtectionFrom::Creatures => source.is_creature(),
            ProtectionFrom::Everything => true,
        })
    }
}

impl GameEntity<Card> for Card {
    fn id(&self) -> EntityId<Card> {
        self.id
    }

    fn name(&self) -> &str {
        self.name.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_creation() {
        let owner = PlayerId::new(100);
        let card = Card::new(CardId::new(1), "Lightning Bolt", owner);

        assert_eq!(card.name.as_str(), "Lightning Bolt");
        assert_eq!(card.owner, owner);
        assert_eq!(card.controller, owner);
        assert!(!card.tapped);
        assert!(!card.is_creature());
    }

    #[test]
    fn test_card_counters() {
        let mut card = Card::creature(CardId::new(1), "Test Creature", PlayerId::new(0), 2, 2);

        card.add_counter(CounterType::plus_one_plus_one(), 2);
        assert_eq!(card.current_power(), 4);
        assert_eq!(card.current_toughness(), 4);

        card.add_counter(CounterType::minus_one_minus_one(), 1);
        assert_eq!(card.current_power(), 3);
        assert_eq!(card.current_toughness(), 3);
    }

    #[test]
    fn test_lethal_damage_accounts_for_marked_damage() {
        let mut card = Card::creature(CardId::new(1), "Hill Giant", PlayerId::new(0), 3, 3);
        assert_eq!(card.lethal_damage(), 3);
        card.damage = 2;
        assert_eq!(card.lethal_damage(), 1);
        card.damage = 5;
        assert_eq!(card.lethal_damage(), 0);
    }

    #[test]
    fn test_loyalty_counters() {
        let mut walker = Card::new(CardId::new(1), "Jace", PlayerId::new(0));
        walker.types.push(CardType::Planeswalker);
        walker.add_counter(CounterType::loyalty(), 3);
        assert_eq!(walker.remove_counters(&CounterType::loyalty(), 5), 3);
        assert_eq!(walker.loyalty(), 0);
    }

    #[test]
    fn test_protection_from_color() {
        let mut knight = Card::creature(CardId::new(1), "White Knight", PlayerId::new(0), 2, 2);
        knight.keywords.push(Keyword::Protection(ProtectionFrom::Color(Color::Black)));
        let mut zombie = Card::creature(CardId::new(2), "Zombie", PlayerId::new(1), 2, 2);
        zombie.colors.push(Color::Black);
        let bear = Card::creature(CardId::new(3), "Bear", PlayerId::new(1), 2, 2);

        assert!(knight.is_protected_from(&zombie));
        assert!(!knight.is_protected_from(&bear));
    }
}
