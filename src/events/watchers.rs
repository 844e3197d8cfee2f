//! Watchers: per-turn bookkeeping of "how many X happened".
//!
//! A watcher observes every published event and records the ones it cares
//! about. Cards use them for conditions such as "if a creature died this
//! turn". Watchers are part of the game state, so bookmarks and rollback
//! restore them along with everything else. They are reset during the
//! cleanup step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{ObjectId, PlayerId};

use super::event::{Event, EventType};

/// What a watcher is keyed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WatcherScope {
    Game,
    Player,
    Object,
}

/// The built-in kinds of watcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WatcherKind {
    /// Spells cast, per caster.
    SpellsCast,
    /// Creatures put into a graveyard from the battlefield, per controller.
    CreaturesDied,
    /// Cards drawn, per player.
    CardsDrawn,
    /// Permanents that entered the battlefield, per controller.
    PermanentsEntered,
    /// Attackers declared, per attacking player.
    AttackersDeclared,
}

impl WatcherKind {
    pub const ALL: [WatcherKind; 5] = [
        WatcherKind::SpellsCast,
        WatcherKind::CreaturesDied,
        WatcherKind::CardsDrawn,
        WatcherKind::PermanentsEntered,
        WatcherKind::AttackersDeclared,
    ];

    /// The event type this watcher counts.
    #[must_use]
    pub const fn event_type(self) -> EventType {
        match self {
            WatcherKind::SpellsCast => EventType::SpellCast,
            WatcherKind::CreaturesDied => EventType::PermanentDies,
            WatcherKind::CardsDrawn => EventType::DrewCard,
            WatcherKind::PermanentsEntered => EventType::EntersTheBattlefield,
            WatcherKind::AttackersDeclared => EventType::AttackerDeclared,
        }
    }

    /// Default registry key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            WatcherKind::SpellsCast => "spells_cast",
            WatcherKind::CreaturesDied => "creatures_died",
            WatcherKind::CardsDrawn => "cards_drawn",
            WatcherKind::PermanentsEntered => "permanents_entered",
            WatcherKind::AttackersDeclared => "attackers_declared",
        }
    }
}

/// One watcher and what it has seen since the last reset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watcher {
    pub key: String,
    pub kind: WatcherKind,
    pub scope: WatcherScope,
    counts: BTreeMap<PlayerId, u32>,
    objects: BTreeMap<PlayerId, Vec<ObjectId>>,
    total: u32,
}

impl Watcher {
    #[must_use]
    pub fn new(kind: WatcherKind, scope: WatcherScope) -> Self {
        Self {
            key: kind.key().to_string(),
            kind,
            scope,
            counts: BTreeMap::new(),
            objects: BTreeMap::new(),
            total: 0,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Record an event if it is one this watcher counts.
    pub fn watch(&mut self, event: &Event) {
        if event.event_type != self.kind.event_type() {
            return;
        }
        // Only creatures count as "died".
        if self.kind == WatcherKind::CreaturesDied && !event.flag {
            return;
        }

        let amount = match self.kind {
            WatcherKind::CardsDrawn => event.amount.max(1) as u32,
            _ => 1,
        };
        self.total += amount;

        if let Some(player) = event.player {
            *self.counts.entry(player).or_insert(0) += amount;
            if let Some(source) = event.source {
                self.objects.entry(player).or_default().push(source);
            }
        }
    }

    /// Something was recorded since the last reset.
    #[must_use]
    pub fn condition_met(&self) -> bool {
        self.total > 0
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// How many recorded events are attributed to a player.
    #[must_use]
    pub fn count_for(&self, player: PlayerId) -> u32 {
        self.counts.get(&player).copied().unwrap_or(0)
    }

    /// Objects recorded for a player, in event order.
    #[must_use]
    pub fn objects_for(&self, player: PlayerId) -> &[ObjectId] {
        self.objects.get(&player).map_or(&[], Vec::as_slice)
    }

    pub fn reset(&mut self) {
        self.counts.clear();
        self.objects.clear();
        self.total = 0;
    }
}

/// All watchers of a game.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherRegistry {
    watchers: Vec<Watcher>,
}

impl WatcherRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with one game-scoped watcher of every kind.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for kind in WatcherKind::ALL {
            registry.add(Watcher::new(kind, WatcherScope::Game));
        }
        registry
    }

    /// Add a watcher, replacing any with the same key.
    pub fn add(&mut self, watcher: Watcher) {
        self.watchers.retain(|w| w.key != watcher.key);
        self.watchers.push(watcher);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Watcher> {
        self.watchers.iter().find(|w| w.key == key)
    }

    /// The default watcher of a kind.
    #[must_use]
    pub fn of_kind(&self, kind: WatcherKind) -> Option<&Watcher> {
        self.get(kind.key())
    }

    /// Feed an event to every watcher.
    pub fn notify(&mut self, event: &Event) {
        for watcher in &mut self.watchers {
            watcher.watch(event);
        }
    }

    pub fn reset_all(&mut self) {
        for watcher in &mut self.watchers {
            watcher.reset();
        }
    }

    pub fn reset_scope(&mut self, scope: WatcherScope) {
        for watcher in self.watchers.iter_mut().filter(|w| w.scope == scope) {
            watcher.reset();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }
}
