//! Stack items and the effects they carry.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::{ObjectId, PlayerId, StackItemId, Target, TriggerId};
use crate::zones::{CounterKind, Keyword};

/// One instruction executed when a spell or ability resolves.
///
/// Player effects with no player target apply to the controller. Object
/// effects apply to each object target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellEffect {
    /// Damage to each target.
    DealDamage { amount: i32 },
    GainLife { amount: i32 },
    LoseLife { amount: i32 },
    DrawCards { count: u32 },
    Destroy,
    Exile,
    /// +N/+N until end of turn.
    Pump { power: i32, toughness: i32 },
    /// Keyword until end of turn.
    GrantKeyword(Keyword),
    /// Prevent the next N damage to each target this turn; 0 prevents all.
    PreventDamage { shield: u32 },
    /// Counter each targeted stack item.
    CounterItem,
    /// The controller gains control of each targeted object.
    GainControl,
    AddCounters { kind: CounterKind, amount: i32 },
    AddPoison { amount: i32 },
}

/// What put an item on the stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackItemKind {
    Spell,
    Activated { index: usize },
    Triggered { trigger: TriggerId },
}

/// A spell or ability waiting to resolve.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackItem {
    pub id: StackItemId,
    pub kind: StackItemKind,
    pub controller: PlayerId,
    /// The card (for spells) or the object the ability came from.
    pub source: Option<ObjectId>,
    pub description: String,
    pub targets: SmallVec<[Target; 2]>,
    pub effects: Vec<SpellEffect>,
}

impl StackItem {
    /// Build an item; the id is assigned when it is pushed.
    pub fn new(kind: StackItemKind, controller: PlayerId, description: impl Into<String>) -> Self {
        Self {
            id: StackItemId::new(0),
            kind,
            controller,
            source: None,
            description: description.into(),
            targets: SmallVec::new(),
            effects: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: ObjectId) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn with_targets(mut self, targets: impl IntoIterator<Item = Target>) -> Self {
        self.targets.extend(targets);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = SpellEffect>) -> Self {
        self.effects.extend(effects);
        self
    }

    #[must_use]
    pub fn is_spell(&self) -> bool {
        self.kind == StackItemKind::Spell
    }

    /// Player targets, or the controller if there are none.
    #[must_use]
    pub fn player_targets(&self) -> SmallVec<[PlayerId; 2]> {
        let players: SmallVec<[PlayerId; 2]> =
            self.targets.iter().filter_map(|t| t.as_player()).collect();
        if players.is_empty() {
            SmallVec::from_slice(&[self.controller])
        } else {
            players
        }
    }

    #[must_use]
    pub fn object_targets(&self) -> SmallVec<[ObjectId; 2]> {
        self.targets.iter().filter_map(|t| t.as_object()).collect()
    }
}

impl std::fmt::Display for StackItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description, self.id)
    }
}
