//! Combat-relevant abilities as typed variants
//!
//! Abilities are a closed set of tagged variants carrying their parameters,
//! looked up with `Card::has_keyword` or by pattern matching over
//! `Card::keywords`. Nothing here is matched by parsing ability text.

use crate::core::{Card, Color, Subtype};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Basic land types that landwalk and attack conditions refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LandType {
    Plains,
    Island,
    Swamp,
    Mountain,
    Forest,
    Desert,
}

impl LandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LandType::Plains => "Plains",
            LandType::Island => "Island",
            LandType::Swamp => "Swamp",
            LandType::Mountain => "Mountain",
            LandType::Forest => "Forest",
            LandType::Desert => "Desert",
        }
    }

    pub fn matches(&self, subtype: &Subtype) -> bool {
        subtype.as_str() == self.as_str()
    }
}

/// What a landwalk ability keys off in the defending player's lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LandwalkKind {
    /// Plainswalk, islandwalk, swampwalk, mountainwalk, forestwalk, desertwalk
    Basic(LandType),
    Nonbasic,
    Legendary,
    Snow,
}

/// Quality a protection ability names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtectionFrom {
    Color(Color),
    Artifacts,
    Creatures,
    Everything,
}

/// Condition for "can't attack unless ..." restrictions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackCondition {
    /// "can't attack unless defending player controls an Island"
    DefenderControlsLandType(LandType),
    /// "can't attack unless you control more creatures than defending player"
    ControllerControlsMoreCreatures,
}

/// Keyword abilities and per-card combat restrictions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    // Evasion and its exceptions
    Flying,
    Reach,
    Shadow,
    /// "can block creatures with shadow as though they didn't have shadow"
    CanBlockShadow,
    Horsemanship,
    Fear,
    Intimidate,
    Landwalk(LandwalkKind),
    /// "can block creatures with landwalk abilities as though they didn't have them"
    CanBlockLandwalk,
    Unblockable,
    Skulk,
    /// "can't be blocked by creatures with power N or less"
    CantBeBlockedByPowerAtMost(i8),

    // Blocker-count restrictions on the attacker
    Menace,
    /// "can't be blocked except by N or more creatures"
    CantBeBlockedByFewerThan(u8),
    CantBeBlockedByMoreThan(u8),
    /// "can't be blocked unless all creatures defending player controls block it"
    CantBeBlockedUnlessAllBlock,
    /// Lure: "all creatures able to block this do so"
    MustBeBlockedByAll,
    MustBeBlockedIfAble,

    Protection(ProtectionFrom),

    // Attacking
    Haste,
    Vigilance,
    Defender,
    CantAttack,
    CantAttackAlone,
    CantAttackUnless(AttackCondition),
    AttacksEachCombat,

    // Blocking
    CantBlock,
    CantBlockAlone,
    CantAttackOrBlockAlone,
    BlocksEachCombat,
    CanBlockAdditional(u8),
    CanBlockAny,
    CanBlockOnlyFlyers,
    CanBlockWhileTapped,

    // Damage
    FirstStrike,
    DoubleStrike,
    Trample,
    Deathtouch,
    Lifelink,
    Banding,
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Keyword::Landwalk(LandwalkKind::Basic(land)) => {
                write!(f, "{}walk", land.as_str())
            }
            Keyword::Landwalk(kind) => write!(f, "{kind:?} landwalk"),
            Keyword::Protection(ProtectionFrom::Color(c)) => write!(f, "Protection from {c}"),
            Keyword::Protection(from) => write!(f, "Protection from {from:?}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Which players a static rule applies to, relative to its source's controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleScope {
    AllPlayers,
    Opponents,
    Controller,
}

/// Small creature filter used by static "X can't block Y" rules
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreatureFilter {
    Any,
    Color(Color),
    Flying,
    WithoutFlying,
    PowerAtLeast(i8),
    PowerAtMost(i8),
    Subtype(Subtype),
}

impl CreatureFilter {
    pub fn matches(&self, card: &Card) -> bool {
        match self {
            CreatureFilter::Any => true,
            CreatureFilter::Color(color) => card.colors.contains(color),
            CreatureFilter::Flying => card.has_keyword(&Keyword::Flying),
            CreatureFilter::WithoutFlying => !card.has_keyword(&Keyword::Flying),
            CreatureFilter::PowerAtLeast(n) => card.current_power() >= *n as i32,
            CreatureFilter::PowerAtMost(n) => card.current_power() <= *n as i32,
            CreatureFilter::Subtype(subtype) => card.subtypes.contains(subtype),
        }
    }
}

/// Static combat rules a permanent imposes while it is on the battlefield
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StaticRule {
    /// "No more than N creatures can attack each combat"
    MaxAttackersPerCombat(u8),
    /// "No more than N creatures can attack you each combat"
    MaxAttackersAgainstController(u8),
    /// "No more than N creatures can block each combat"
    MaxBlockersPerCombat(u8),
    /// "Each player can't block with more than one creature"
    OneBlockerPerDefendingPlayer,
    CreaturesCantAttack(RuleScope),
    CreaturesCantBlock(RuleScope),
    /// "Creatures with power greater than N can't attack"
    CreaturesWithPowerAboveCantAttack(i8),
    /// "<blockers> can't block <attackers>"
    CantBlock {
        blockers: CreatureFilter,
        attackers: CreatureFilter,
    },
    /// "Each opponent attacks you or a planeswalker you control with at
    /// least one creature each combat if able"
    MustAttackController,
    /// "Creatures can't attack you or planeswalkers you control unless
    /// their controller pays N for each"
    AttackTax(u8),
}

impl RuleScope {
    /// Does a rule from a source controlled by `source_controller` affect
    /// creatures controlled by `affected`?
    pub fn applies_to(
        &self,
        source_controller: crate::core::PlayerId,
        affected: crate::core::PlayerId,
    ) -> bool {
        match self {
            RuleScope::AllPlayers => true,
            RuleScope::Opponents => source_controller != affected,
            RuleScope::Controller => source_controller == affected,
        }
    }
}
