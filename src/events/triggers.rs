//! Triggered abilities.
//!
//! A triggered ability watches for one event type, checks a condition and,
//! when it fires, produces a [`PendingTrigger`]. Pending triggers are queued
//! in the game state and put onto the stack (or resolved immediately, for
//! abilities that do not use the stack) in APNAP order the next time the
//! rules engine stabilizes.
//!
//! Abilities tied to an object may restrict the zone they work from.
//! Leaves-the-zone triggers ("when this dies") look back: the ability counts
//! as active if the event moved its source out of that zone.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::{ObjectId, PlayerId, Target, TriggerId};
use crate::stack::SpellEffect;
use crate::zones::{CardType, ObjectStore, Zone};

use super::event::{Event, EventType};

/// A condition checked against the triggering event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerCondition {
    Always,
    Never,

    // === Object filters ===
    /// The ability's source caused the event.
    SourceIsEventSource,
    /// The event happened to the ability's source.
    SourceIsEventTarget,
    /// The event's source object has this printed type.
    EventSourceHasType(CardType),

    // === Player filters ===
    /// The event is about the ability's controller.
    EventPlayerIsController,
    /// The event is about an opponent of the ability's controller.
    EventPlayerIsOpponent,
    /// The event targets a player.
    TargetIsPlayer,

    // === Value filters ===
    AmountAtLeast(i32),
    ToZone(Zone),
    FromZone(Zone),

    // === Combinators ===
    All(Vec<TriggerCondition>),
    Any(Vec<TriggerCondition>),
    Not(Box<TriggerCondition>),
}

impl TriggerCondition {
    /// Create an AND condition.
    pub fn all(conditions: impl IntoIterator<Item = TriggerCondition>) -> Self {
        Self::All(conditions.into_iter().collect())
    }

    /// Create an OR condition.
    pub fn any(conditions: impl IntoIterator<Item = TriggerCondition>) -> Self {
        Self::Any(conditions.into_iter().collect())
    }

    /// Negate this condition.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Add another condition with AND.
    #[must_use]
    pub fn and(self, other: TriggerCondition) -> Self {
        match self {
            Self::All(mut conditions) => {
                conditions.push(other);
                Self::All(conditions)
            }
            Self::Always => other,
            _ => Self::All(vec![self, other]),
        }
    }

    /// Add another condition with OR.
    #[must_use]
    pub fn or(self, other: TriggerCondition) -> Self {
        match self {
            Self::Any(mut conditions) => {
                conditions.push(other);
                Self::Any(conditions)
            }
            _ => Self::Any(vec![self, other]),
        }
    }

    /// Evaluate against an event for an ability.
    #[must_use]
    pub fn evaluate(&self, ability: &TriggeredAbility, event: &Event, store: &ObjectStore) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::SourceIsEventSource => ability.source.is_some() && event.source == ability.source,
            Self::SourceIsEventTarget => {
                ability.source.is_some() && event.target_object() == ability.source
            }
            Self::EventSourceHasType(card_type) => event
                .source
                .and_then(|id| store.get(id))
                .is_some_and(|o| o.has_type(*card_type)),
            Self::EventPlayerIsController => event.player == Some(ability.controller),
            Self::EventPlayerIsOpponent => event.player.is_some_and(|p| p != ability.controller),
            Self::TargetIsPlayer => event.target_player().is_some(),
            Self::AmountAtLeast(min) => event.amount >= *min,
            Self::ToZone(zone) => event.zone == Some(*zone),
            Self::FromZone(zone) => event.from_zone == Some(*zone),
            Self::All(conditions) => conditions.iter().all(|c| c.evaluate(ability, event, store)),
            Self::Any(conditions) => conditions.iter().any(|c| c.evaluate(ability, event, store)),
            Self::Not(inner) => !inner.evaluate(ability, event, store),
        }
    }
}

/// How a fired ability picks its targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerTargets {
    /// No targets; player effects apply to the controller.
    #[default]
    None,
    Controller,
    EventPlayer,
    EventSource,
    EventTarget,
    EachOpponent,
}

/// A triggered ability definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggeredAbility {
    pub id: TriggerId,

    /// Human-readable name (for messages and debugging).
    pub name: String,

    /// Object the ability is printed on. `None` for game-level abilities.
    pub source: Option<ObjectId>,

    pub controller: PlayerId,

    pub event_type: EventType,

    pub condition: TriggerCondition,

    /// Zone the source must be in for the ability to work.
    pub active_zone: Option<Zone>,

    pub effects: Vec<SpellEffect>,

    pub targets: TriggerTargets,

    /// Goes on the stack (most abilities) or resolves at once.
    pub uses_stack: bool,

    /// Removed after firing once.
    pub once: bool,

    pub enabled: bool,
}

impl TriggeredAbility {
    pub fn new(name: impl Into<String>, event_type: EventType, controller: PlayerId) -> Self {
        Self {
            id: TriggerId::new(0),
            name: name.into(),
            source: None,
            controller,
            event_type,
            condition: TriggerCondition::Always,
            active_zone: None,
            effects: Vec::new(),
            targets: TriggerTargets::None,
            uses_stack: true,
            once: false,
            enabled: true,
        }
    }

    /// Tie the ability to an object that must be on the battlefield.
    #[must_use]
    pub fn with_source(mut self, source: ObjectId) -> Self {
        self.source = Some(source);
        self.active_zone = Some(Zone::Battlefield);
        self
    }

    #[must_use]
    pub fn active_in(mut self, zone: Option<Zone>) -> Self {
        self.active_zone = zone;
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: TriggerCondition) -> Self {
        self.condition = condition;
        self
    }

    #[must_use]
    pub fn with_effect(mut self, effect: SpellEffect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_targets(mut self, targets: TriggerTargets) -> Self {
        self.targets = targets;
        self
    }

    #[must_use]
    pub fn without_stack(mut self) -> Self {
        self.uses_stack = false;
        self
    }

    #[must_use]
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Whether the source is where the ability works from.
    #[must_use]
    pub fn is_active(&self, event: &Event, store: &ObjectStore) -> bool {
        let (Some(source), Some(zone)) = (self.source, self.active_zone) else {
            return true;
        };
        if store.is_in_zone(source, zone) {
            return true;
        }
        event.source == Some(source) && event.from_zone == Some(zone)
    }

    fn choose_targets(&self, event: &Event, player_count: usize) -> SmallVec<[Target; 2]> {
        let mut targets = SmallVec::new();
        match self.targets {
            TriggerTargets::None => {}
            TriggerTargets::Controller => targets.push(Target::Player(self.controller)),
            TriggerTargets::EventPlayer => targets.extend(event.player.map(Target::Player)),
            TriggerTargets::EventSource => targets.extend(event.source.map(Target::Object)),
            TriggerTargets::EventTarget => targets.extend(event.target),
            TriggerTargets::EachOpponent => targets.extend(
                PlayerId::all(player_count)
                    .filter(|&p| p != self.controller)
                    .map(Target::Player),
            ),
        }
        targets
    }
}

/// A fired ability waiting to be put on the stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTrigger {
    pub trigger: TriggerId,
    pub name: String,
    pub controller: PlayerId,
    pub source: Option<ObjectId>,
    pub effects: Vec<SpellEffect>,
    pub targets: SmallVec<[Target; 2]>,
    pub uses_stack: bool,
    pub event: Event,
}

/// Registry of triggered abilities, indexed by event type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TriggerRegistry {
    triggers: FxHashMap<TriggerId, TriggeredAbility>,
    by_event_type: FxHashMap<EventType, Vec<TriggerId>>,
    next_id: u32,
}

impl TriggerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an ability and return its id.
    pub fn register(&mut self, mut ability: TriggeredAbility) -> TriggerId {
        self.next_id += 1;
        let id = TriggerId::new(self.next_id);
        ability.id = id;

        self.by_event_type.entry(ability.event_type).or_default().push(id);
        self.triggers.insert(id, ability);
        id
    }

    pub fn unregister(&mut self, id: TriggerId) -> Option<TriggeredAbility> {
        let ability = self.triggers.remove(&id)?;
        if let Some(list) = self.by_event_type.get_mut(&ability.event_type) {
            list.retain(|&t| t != id);
            if list.is_empty() {
                self.by_event_type.remove(&ability.event_type);
            }
        }
        Some(ability)
    }

    /// Remove every ability printed on an object.
    pub fn remove_for_source(&mut self, source: ObjectId) -> usize {
        let ids: Vec<_> = self
            .triggers
            .values()
            .filter(|t| t.source == Some(source))
            .map(|t| t.id)
            .collect();
        for &id in &ids {
            self.unregister(id);
        }
        ids.len()
    }

    #[must_use]
    pub fn get(&self, id: TriggerId) -> Option<&TriggeredAbility> {
        self.triggers.get(&id)
    }

    pub fn set_enabled(&mut self, id: TriggerId, enabled: bool) {
        if let Some(ability) = self.triggers.get_mut(&id) {
            ability.enabled = enabled;
        }
    }

    /// Fire every matching ability for an event, in registration order.
    ///
    /// One-shot abilities are removed once they fire.
    pub fn collect(
        &mut self,
        event: &Event,
        store: &ObjectStore,
        player_count: usize,
    ) -> Vec<PendingTrigger> {
        let Some(ids) = self.by_event_type.get(&event.event_type) else {
            return Vec::new();
        };

        let mut fired = Vec::new();
        let mut spent = Vec::new();
        for id in ids {
            let Some(ability) = self.triggers.get(id) else {
                continue;
            };
            if !ability.enabled
                || !ability.is_active(event, store)
                || !ability.condition.evaluate(ability, event, store)
            {
                continue;
            }

            tracing::trace!(trigger = %ability.id, name = %ability.name, "trigger fired");
            fired.push(PendingTrigger {
                trigger: ability.id,
                name: ability.name.clone(),
                controller: ability.controller,
                source: ability.source,
                effects: ability.effects.clone(),
                targets: ability.choose_targets(event, player_count),
                uses_stack: ability.uses_stack,
                event: event.clone(),
            });
            if ability.once {
                spent.push(ability.id);
            }
        }

        for id in spent {
            self.unregister(id);
        }
        fired
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TriggeredAbility> {
        self.triggers.values()
    }
}
