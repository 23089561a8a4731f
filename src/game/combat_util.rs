//! Combat legality predicates
//!
//! Free functions answering "can this creature attack, block, or be blocked"
//! against the current game state. None of them change anything; `Combat`
//! and the controllers call them before committing a declaration.

use crate::core::{AttackCondition, Card, CardId, Color, Keyword, LandwalkKind, PlayerId, StaticRule, Supertype};
use crate::error::CombatViolation;
use crate::game::{Combat, Defender, GameState};

/// Opponents of `attacking_player` still in the game, each followed by the
/// planeswalkers they control
pub fn attackable_defenders(state: &GameState, attacking_player: PlayerId) -> Vec<Defender> {
    let mut defenders = Vec::new();
    for opponent in state.opponents_of(attacking_player) {
        defenders.push(Defender::Player(opponent));
        for walker in state.planeswalkers_controlled_by(opponent) {
            defenders.push(Defender::Planeswalker(walker.id));
        }
    }
    defenders
}

// ---------------------------------------------------------------------------
// Attacking
// ---------------------------------------------------------------------------

/// Can `card` attack at all this combat (ignoring who it would attack)?
pub fn can_attack(state: &GameState, card: &Card) -> bool {
    if !card.is_creature() || card.tapped || !state.is_on_battlefield(card.id) {
        return false;
    }
    // MTG Rules 302.6: summoning sickness
    if card.summoning_sick && !card.has_keyword(&Keyword::Haste) {
        return false;
    }
    if state.current_step().is_past_declare_attackers() {
        return false;
    }
    if card.has_keyword(&Keyword::Defender) || card.has_keyword(&Keyword::CantAttack) {
        return false;
    }

    for (source, rule) in state.static_rules() {
        match rule {
            StaticRule::CreaturesCantAttack(scope) if scope.applies_to(source.controller, card.controller) => {
                return false;
            }
            StaticRule::CreaturesWithPowerAboveCantAttack(n) if card.current_power() > *n as i32 => {
                return false;
            }
            _ => {}
        }
    }
    true
}

/// Can `card` attack this particular defender?
///
/// A goaded creature can't attack a player who goaded it while some other
/// defender is available.
pub fn can_attack_defender(state: &GameState, card: &Card, defender: Defender) -> bool {
    if !defender.is_valid(state) {
        return false;
    }
    let Some(defending_player) = defender.controller(state) else {
        return false;
    };
    if defending_player == card.controller {
        return false;
    }

    for keyword in &card.keywords {
        if let Keyword::CantAttackUnless(condition) = keyword {
            if !attack_condition_met(state, card, defending_player, condition) {
                return false;
            }
        }
    }

    if card.goaded_by.contains(&defending_player) {
        let has_alternative = attackable_defenders(state, card.controller)
            .iter()
            .filter_map(|d| d.controller(state))
            .any(|p| !card.goaded_by.contains(&p));
        if has_alternative {
            return false;
        }
    }
    true
}

fn attack_condition_met(
    state: &GameState,
    card: &Card,
    defending_player: PlayerId,
    condition: &AttackCondition,
) -> bool {
    match condition {
        AttackCondition::DefenderControlsLandType(land_type) => state
            .lands_controlled_by(defending_player)
            .any(|land| land.subtypes.iter().any(|s| land_type.matches(s))),
        AttackCondition::ControllerControlsMoreCreatures => {
            state.creatures_controlled_by(card.controller).count()
                > state.creatures_controlled_by(defending_player).count()
        }
    }
}

/// Generic mana the attacker must pay to attack `defender`
pub fn attack_tax(state: &GameState, defender: Defender) -> u32 {
    let Some(defending_player) = defender.controller(state) else {
        return 0;
    };
    state
        .static_rules()
        .filter(|(source, _)| source.controller == defending_player)
        .map(|(_, rule)| match rule {
            StaticRule::AttackTax(n) => *n as u32,
            _ => 0,
        })
        .sum()
}

// ---------------------------------------------------------------------------
// Blocking capacity
// ---------------------------------------------------------------------------

/// Can `card` block anything at all?
pub fn can_block(state: &GameState, card: &Card) -> bool {
    if !card.is_creature() || !state.is_on_battlefield(card.id) {
        return false;
    }
    if card.tapped && !card.has_keyword(&Keyword::CanBlockWhileTapped) {
        return false;
    }
    if card.has_keyword(&Keyword::CantBlock) {
        return false;
    }
    !state.static_rules().any(|(source, rule)| {
        matches!(rule, StaticRule::CreaturesCantBlock(scope) if scope.applies_to(source.controller, card.controller))
    })
}

/// How many attackers `card` may block; `None` means any number
pub fn max_blockable_attackers(card: &Card) -> Option<usize> {
    if card.has_keyword(&Keyword::CanBlockAny) {
        return None;
    }
    let extra: usize = card
        .keywords
        .iter()
        .map(|k| match k {
            Keyword::CanBlockAdditional(n) => *n as usize,
            _ => 0,
        })
        .sum();
    Some(1 + extra)
}

/// Has `card` room to block one more attacker in this combat?
pub fn can_block_more_creatures(card: &Card, combat: &Combat) -> bool {
    let blocking = combat.attackers_blocked_by(card.id).len();
    max_blockable_attackers(card).map_or(true, |max| blocking < max)
}

/// Can `card` be added as a blocker of one more attacker, honoring the
/// per-combat blocker caps?
pub fn can_block_in_combat(state: &GameState, card: &Card, combat: &Combat) -> bool {
    if !can_block(state, card) {
        return false;
    }
    let already_blocking = combat.is_blocking(card.id);
    if !already_blocking {
        let blockers = combat.all_blockers();
        for (_, rule) in state.static_rules() {
            match rule {
                StaticRule::MaxBlockersPerCombat(n) if blockers.len() >= *n as usize => return false,
                StaticRule::OneBlockerPerDefendingPlayer => {
                    let teammate_blocking = blockers.iter().any(|b| {
                        state
                            .cards
                            .get(*b)
                            .map(|c| c.controller == card.controller)
                            .unwrap_or(false)
                    });
                    if teammate_blocking {
                        return false;
                    }
                }
                _ => {}
            }
        }
    }
    can_block_more_creatures(card, combat)
}

// ---------------------------------------------------------------------------
// Evasion
// ---------------------------------------------------------------------------

/// Does `kind` landwalk matter against `defending_player`'s lands?
pub fn landwalk_applies(state: &GameState, kind: LandwalkKind, defending_player: PlayerId) -> bool {
    let mut lands = state.lands_controlled_by(defending_player);
    match kind {
        LandwalkKind::Basic(land_type) => lands.any(|l| l.subtypes.iter().any(|s| land_type.matches(s))),
        LandwalkKind::Nonbasic => lands.any(|l| !l.has_supertype(Supertype::Basic)),
        LandwalkKind::Legendary => lands.any(|l| l.has_supertype(Supertype::Legendary)),
        LandwalkKind::Snow => lands.any(|l| l.has_supertype(Supertype::Snow)),
    }
}

/// Could anything `defending_player` controls block `attacker`?
pub fn can_be_blocked(state: &GameState, attacker: &Card, defending_player: PlayerId) -> bool {
    if attacker.has_keyword(&Keyword::Unblockable) {
        return false;
    }
    let walks = attacker
        .landwalks()
        .any(|kind| landwalk_applies(state, kind, defending_player));
    if walks {
        return state
            .creatures_controlled_by(defending_player)
            .any(|c| c.has_keyword(&Keyword::CanBlockLandwalk));
    }
    true
}

/// Evasion, protection and "can't block" effects between one attacker and
/// one would-be blocker
pub fn can_be_blocked_by(state: &GameState, attacker: &Card, blocker: &Card) -> bool {
    let has = |card: &Card, k: Keyword| card.has_keyword(&k);

    if has(attacker, Keyword::Unblockable) {
        return false;
    }
    // 702.9b flying / 702.17b reach
    if has(attacker, Keyword::Flying) && !has(blocker, Keyword::Flying) && !has(blocker, Keyword::Reach) {
        return false;
    }
    if has(blocker, Keyword::CanBlockOnlyFlyers) && !has(attacker, Keyword::Flying) {
        return false;
    }
    // 702.28b shadow cuts both ways
    if has(attacker, Keyword::Shadow) && !has(blocker, Keyword::Shadow) && !has(blocker, Keyword::CanBlockShadow) {
        return false;
    }
    if has(blocker, Keyword::Shadow) && !has(attacker, Keyword::Shadow) {
        return false;
    }
    if has(attacker, Keyword::Horsemanship) && !has(blocker, Keyword::Horsemanship) {
        return false;
    }
    // 702.36b fear
    if has(attacker, Keyword::Fear) && !blocker.is_artifact() && !blocker.has_color(Color::Black) {
        return false;
    }
    // 702.13b intimidate
    if has(attacker, Keyword::Intimidate) && !blocker.is_artifact() && !blocker.shares_color_with(attacker) {
        return false;
    }
    // 702.118b skulk
    if has(attacker, Keyword::Skulk) && blocker.current_power() > attacker.current_power() {
        return false;
    }
    let power_floor = attacker.keywords.iter().find_map(|k| match k {
        Keyword::CantBeBlockedByPowerAtMost(n) => Some(*n as i32),
        _ => None,
    });
    if power_floor.is_some_and(|n| blocker.current_power() <= n) {
        return false;
    }
    if !has(blocker, Keyword::CanBlockLandwalk)
        && attacker
            .landwalks()
            .any(|kind| landwalk_applies(state, kind, blocker.controller))
    {
        return false;
    }
    // 702.16e protection
    if attacker.is_protected_from(blocker) {
        return false;
    }

    !state.static_rules().any(|(_, rule)| match rule {
        StaticRule::CantBlock { blockers, attackers } => blockers.matches(blocker) && attackers.matches(attacker),
        _ => false,
    })
}

/// Can `blocker` block `attacker`?
///
/// With a combat this also requires that `attacker` is attacking the
/// blocker's controller (or their planeswalker) and that the blocker has
/// capacity left. An existing block of the same pair is always accepted.
pub fn can_block_attacker(state: &GameState, attacker: &Card, blocker: &Card, combat: Option<&Combat>) -> bool {
    if !attacker.is_creature() || !can_block(state, blocker) {
        return false;
    }
    match combat {
        Some(combat) => {
            if !combat.is_attacking(attacker.id) {
                return false;
            }
            if combat.defending_player_of(state, attacker.id) != Some(blocker.controller) {
                return false;
            }
            let already = combat.attackers_blocked_by(blocker.id).contains(&attacker.id);
            if !already && !can_block_in_combat(state, blocker, combat) {
                return false;
            }
        }
        None => {
            if attacker.controller == blocker.controller {
                return false;
            }
        }
    }
    can_be_blocked_by(state, attacker, blocker)
}

// ---------------------------------------------------------------------------
// Blocker counts
// ---------------------------------------------------------------------------

/// Fewest creatures that may block `attacker` (menace and friends)
pub fn min_blockers(attacker: &Card) -> usize {
    attacker
        .keywords
        .iter()
        .map(|k| match k {
            Keyword::Menace => 2,
            Keyword::CantBeBlockedByFewerThan(n) => *n as usize,
            _ => 1,
        })
        .max()
        .unwrap_or(1)
        .max(1)
}

/// Most creatures that may block `attacker`, if limited
pub fn max_blockers(attacker: &Card) -> Option<usize> {
    attacker
        .keywords
        .iter()
        .filter_map(|k| match k {
            Keyword::CantBeBlockedByMoreThan(n) => Some(*n as usize),
            _ => None,
        })
        .min()
}

/// Creatures `defending_player` controls that could block at all
fn potential_blockers(state: &GameState, defending_player: PlayerId) -> impl Iterator<Item = &Card> + '_ {
    state
        .creatures_controlled_by(defending_player)
        .filter(move |c| can_block(state, c))
}

/// Is blocking `attacker` with exactly `amount` creatures allowed?
///
/// Zero is always allowed here; "must be blocked" requirements are checked
/// separately.
pub fn can_attacker_be_blocked_with_amount(
    state: &GameState,
    attacker: &Card,
    amount: usize,
    combat: Option<&Combat>,
) -> bool {
    if amount == 0 {
        return true;
    }
    if amount < min_blockers(attacker) {
        return false;
    }
    if max_blockers(attacker).is_some_and(|max| amount > max) {
        return false;
    }
    if attacker.has_keyword(&Keyword::CantBeBlockedUnlessAllBlock) {
        if let Some(defending) = combat.and_then(|c| c.defending_player_of(state, attacker.id)) {
            return amount >= potential_blockers(state, defending).count();
        }
    }
    true
}

/// Is `blocker` obliged to block something this combat and able to?
pub fn must_block_an_attacker(state: &GameState, blocker: &Card, combat: &Combat) -> bool {
    if !blocker.has_keyword(&Keyword::BlocksEachCombat) {
        return false;
    }
    combat
        .attackers()
        .iter()
        .filter_map(|a| state.cards.get(*a).ok())
        .any(|a| can_block_attacker(state, a, blocker, Some(combat)))
}

// ---------------------------------------------------------------------------
// Declaration validation
// ---------------------------------------------------------------------------

/// Check every block `defending_player` declared
///
/// Checks run in a fixed order and the first failure is reported: each
/// block's legality, per-combat caps, blocking alone, blocker counts per
/// attacker, then blocking requirements.
pub fn validate_blocks(
    state: &GameState,
    combat: &Combat,
    defending_player: PlayerId,
) -> Result<(), CombatViolation> {
    let all_blockers = combat.all_blockers();
    let blockers: Vec<&Card> = all_blockers
        .iter()
        .filter_map(|b| state.cards.get(*b).ok())
        .filter(|c| c.controller == defending_player)
        .collect();

    for blocker in &blockers {
        let blocked = combat.attackers_blocked_by(blocker.id);
        if max_blockable_attackers(blocker).is_some_and(|max| blocked.len() > max) {
            return Err(CombatViolation::BlockingTooManyAttackers {
                blocker: blocker.id,
                name: blocker.name.to_string(),
                blocking: blocked.len(),
            });
        }
        for attacker_id in blocked {
            let legal = state
                .cards
                .get(attacker_id)
                .map(|a| can_block_attacker(state, a, blocker, Some(combat)))
                .unwrap_or(false);
            if !legal {
                return Err(CombatViolation::CannotBlock {
                    blocker: blocker.id,
                    blocker_name: blocker.name.to_string(),
                    attacker: attacker_id,
                    attacker_name: state.card_name(attacker_id),
                });
            }
        }
    }

    for (_, rule) in state.static_rules() {
        match rule {
            StaticRule::MaxBlockersPerCombat(n) if all_blockers.len() > *n as usize => {
                return Err(CombatViolation::TooManyBlockersInCombat {
                    maximum: *n as usize,
                    provided: all_blockers.len(),
                });
            }
            StaticRule::OneBlockerPerDefendingPlayer if blockers.len() > 1 => {
                return Err(CombatViolation::OneBlockerPerPlayer {
                    player: defending_player,
                });
            }
            _ => {}
        }
    }

    if all_blockers.len() == 1 {
        if let Some(lone) = blockers.first() {
            if lone.has_keyword(&Keyword::CantBlockAlone) || lone.has_keyword(&Keyword::CantAttackOrBlockAlone) {
                return Err(CombatViolation::BlocksAlone {
                    blocker: lone.id,
                    name: lone.name.to_string(),
                });
            }
        }
    }

    let attackers: Vec<&Card> = combat
        .attackers()
        .iter()
        .filter(|a| combat.defending_player_of(state, **a) == Some(defending_player))
        .filter_map(|a| state.cards.get(*a).ok())
        .collect();

    for attacker in &attackers {
        let count = combat.declared_blockers_of(attacker.id).len();
        if count == 0 {
            continue;
        }
        let min = min_blockers(attacker);
        if count < min {
            return Err(CombatViolation::NotEnoughBlockers {
                attacker: attacker.id,
                name: attacker.name.to_string(),
                required: min,
                provided: count,
            });
        }
        if let Some(max) = max_blockers(attacker) {
            if count > max {
                return Err(CombatViolation::TooManyBlockers {
                    attacker: attacker.id,
                    name: attacker.name.to_string(),
                    maximum: max,
                    provided: count,
                });
            }
        }
        if !can_attacker_be_blocked_with_amount(state, attacker, count, Some(combat)) {
            return Err(CombatViolation::NotBlockedByAll {
                attacker: attacker.id,
                name: attacker.name.to_string(),
            });
        }
    }

    let lures: Vec<&Card> = attackers
        .iter()
        .copied()
        .filter(|a| a.has_keyword(&Keyword::MustBeBlockedByAll))
        .collect();
    for lure in &lures {
        for candidate in potential_blockers(state, defending_player) {
            let blocks_a_lure = combat
                .attackers_blocked_by(candidate.id)
                .iter()
                .any(|a| lures.iter().any(|l| l.id == *a));
            if !blocks_a_lure && can_be_blocked_by(state, lure, candidate) {
                return Err(CombatViolation::MustBlockLure {
                    blocker: candidate.id,
                    blocker_name: candidate.name.to_string(),
                    attacker: lure.id,
                    attacker_name: lure.name.to_string(),
                });
            }
        }
    }

    for candidate in potential_blockers(state, defending_player) {
        if !combat.is_blocking(candidate.id)
            && candidate.has_keyword(&Keyword::BlocksEachCombat)
            && attackers.iter().any(|a| can_be_blocked_by(state, a, candidate))
        {
            return Err(CombatViolation::MustBlock {
                blocker: candidate.id,
                name: candidate.name.to_string(),
            });
        }
    }

    for attacker in attackers.iter().filter(|a| a.has_keyword(&Keyword::MustBeBlockedIfAble)) {
        if !combat.declared_blockers_of(attacker.id).is_empty() {
            continue;
        }
        let free: Vec<CardId> = potential_blockers(state, defending_player)
            .filter(|c| can_block_more_creatures(c, combat) && can_be_blocked_by(state, attacker, c))
            .map(|c| c.id)
            .collect();
        if free.len() >= min_blockers(attacker) {
            return Err(CombatViolation::MustBeBlocked {
                attacker: attacker.id,
                name: attacker.name.to_string(),
            });
        }
    }

    Ok(())
}
