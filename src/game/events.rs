//! Combat events delivered to the external trigger system

use crate::core::{CardId, PlayerId};
use crate::game::{DamageTarget, Defender};
use serde::{Deserialize, Serialize};

/// Something that happened during combat that triggered abilities may care about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum CombatEvent {
    /// Attack declaration is final
    AttackersDeclared {
        attacking_player: PlayerId,
        attackers: Vec<(CardId, Defender)>,
    },
    /// Fired once per attacker; `others` are the creatures attacking alongside it
    Attacks {
        attacker: CardId,
        defender: Defender,
        others: Vec<CardId>,
    },
    BlockersDeclared {
        defending_player: PlayerId,
        blocks: Vec<(CardId, CardId)>,
    },
    AttackerBlocked {
        attacker: CardId,
        blockers: Vec<CardId>,
    },
    AttackerUnblocked {
        attacker: CardId,
        defender: Defender,
    },
    DamageDealt {
        source: CardId,
        target: DamageTarget,
        amount: i32,
        first_strike: bool,
    },
    /// One aggregate event per source after a damage pass
    CombatDamageDoneOnce {
        source: CardId,
        targets: Vec<DamageTarget>,
        total: i32,
    },
    /// One aggregate event per damaged target after a damage pass
    DealtCombatDamageOnce {
        target: DamageTarget,
        sources: Vec<CardId>,
        total: i32,
    },
    CombatEnded {
        attacking_player: PlayerId,
    },
}

/// Receiver for combat events
///
/// Events are delivered synchronously, in order, before the transition that
/// produced them returns.
pub trait TriggerSink {
    fn fire(&mut self, event: CombatEvent);
}

/// Sink that records every event, used by the CLI and tests
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<CombatEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[CombatEvent] {
        &self.events
    }

    pub fn take(&mut self) -> Vec<CombatEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn count_matching(&self, pred: impl Fn(&CombatEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl TriggerSink for EventLog {
    fn fire(&mut self, event: CombatEvent) {
        self.events.push(event);
    }
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TriggerSink for NullSink {
    fn fire(&mut self, _event: CombatEvent) {}
}
