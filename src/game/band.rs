//! Attacking bands
//!
//! Every attacker belongs to exactly one band. Most bands hold a single
//! creature; banding lets several attack as a unit that is blocked or
//! unblocked together.

use crate::core::CardId;
use crate::game::Defender;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BandId(pub u32);

impl fmt::Display for BandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "band {}", self.0)
    }
}

/// Whether a band was blocked, decided once when blockers are finalized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockedState {
    #[default]
    Undetermined,
    Blocked,
    Unblocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackingBand {
    pub id: BandId,
    pub defender: Defender,
    /// Members in the order they joined
    pub attackers: SmallVec<[CardId; 2]>,
    pub blocked: BlockedState,
}

impl AttackingBand {
    pub fn new(id: BandId, defender: Defender, first: CardId) -> Self {
        let mut attackers = SmallVec::new();
        attackers.push(first);
        AttackingBand {
            id,
            defender,
            attackers,
            blocked: BlockedState::Undetermined,
        }
    }

    pub fn contains(&self, card: CardId) -> bool {
        self.attackers.contains(&card)
    }

    pub fn is_empty(&self) -> bool {
        self.attackers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.attackers.len()
    }

    pub fn add(&mut self, card: CardId) {
        if !self.contains(card) {
            self.attackers.push(card);
        }
    }

    pub fn remove(&mut self, card: CardId) -> bool {
        match self.attackers.iter().position(|&c| c == card) {
            Some(pos) => {
                self.attackers.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked == BlockedState::Blocked
    }

    /// Set once from the declared blockers; later calls keep the first answer
    pub fn determine_blocked(&mut self, has_blockers: bool) -> BlockedState {
        if self.blocked == BlockedState::Undetermined {
            self.blocked = if has_blockers {
                BlockedState::Blocked
            } else {
                BlockedState::Unblocked
            };
        }
        self.blocked
    }
}
