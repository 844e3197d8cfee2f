//! Game events.
//!
//! An `Event` describes one discrete thing that happened (or is about to
//! happen) in a game. Its lifecycle:
//!
//! 1. Built by the operation that causes it (damage, zone change, ...)
//! 2. Rewritten by zero or more replacement effects; each effect that
//!    touches it is recorded in `applied_effects`
//! 3. Published exactly once in final form, or dropped if a replacement
//!    completely replaced it
//!
//! The applied-effect set belongs to that one event and is never shared.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::{EffectId, ObjectId, PlayerId, Target};
use crate::zones::Zone;

/// Every kind of event the engine publishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    // === Zones ===
    ZoneChange,
    EntersTheBattlefield,
    PermanentDies,
    DrewCard,

    // === Damage and life ===
    DamagePlayer,
    DamagePermanent,
    GainedLife,
    LostLife,
    CountersAdded,

    // === Stack ===
    SpellCast,
    AbilityActivated,
    StackItemResolved,
    StackItemRemoved,
    Countered,

    // === Combat ===
    BeginCombatStep,
    DeclareAttackersStepPre,
    AttackerDeclared,
    DefenderAttacked,
    DeclaredAttackers,
    DeclareBlockersStepPre,
    BlockerDeclared,
    CreatureBlocked,
    CreatureBlocks,
    DeclaredBlockers,
    UnblockedAttacker,
    RemovedFromCombat,
    CombatDamageStepPre,
    CombatDamageApplied,
    EndCombatStepPre,
    EndCombatStep,

    // === Control ===
    GainControl,
    LoseControl,

    // === Turn structure ===
    ChangePhase,
    ChangeStep,
    PriorityChanged,

    // === Opening hands ===
    Mulligan,
    KeptHand,

    // === Rules bookkeeping ===
    StateBasedActions,
    LoopGuardTripped,
    Lost,
    GameOver,
    /// A bookmark, undo point or turn snapshot was put back.
    StateRestored,
}

/// A game event with contextual data.
///
/// ```
/// use mtg_rules::events::{Event, EventType};
/// use mtg_rules::core::{ObjectId, PlayerId, Target};
///
/// let event = Event::damage(Some(ObjectId::new(3)), Target::Player(PlayerId::new(1)), 4);
/// assert_eq!(event.event_type, EventType::DamagePlayer);
/// assert_eq!(event.amount, 4);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,

    /// The object that caused the event.
    pub source: Option<ObjectId>,

    /// What the event happened to.
    pub target: Option<Target>,

    /// The player the event is about (controller, caster, loser, ...).
    pub player: Option<PlayerId>,

    /// Damage, life, cards drawn, counters.
    pub amount: i32,

    /// Event-specific boolean (e.g. "was a creature" on `PermanentDies`).
    pub flag: bool,

    /// Destination zone for zone changes.
    pub zone: Option<Zone>,

    /// Origin zone for zone changes.
    pub from_zone: Option<Zone>,

    /// Free-form key/value data.
    pub metadata: BTreeMap<String, String>,

    /// Replacement effects already applied to this event.
    pub applied_effects: SmallVec<[EffectId; 4]>,
}

impl Event {
    /// Create a new event with just a type.
    #[must_use]
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            source: None,
            target: None,
            player: None,
            amount: 0,
            flag: false,
            zone: None,
            from_zone: None,
            metadata: BTreeMap::new(),
            applied_effects: SmallVec::new(),
        }
    }

    /// A damage event; the type follows the kind of target.
    #[must_use]
    pub fn damage(source: Option<ObjectId>, target: Target, amount: i32) -> Self {
        let event_type = match target {
            Target::Player(_) => EventType::DamagePlayer,
            _ => EventType::DamagePermanent,
        };
        let mut event = Self::new(event_type).with_target(target).with_amount(amount);
        event.source = source;
        event
    }

    /// A zone change of `object` from one zone to another.
    #[must_use]
    pub fn zone_change(object: ObjectId, from: Zone, to: Zone) -> Self {
        Self::new(EventType::ZoneChange)
            .with_source(object)
            .with_target(Target::Object(object))
            .with_from_zone(from)
            .with_zone(to)
            .with_meta("source_zone", from.name())
            .with_meta("target_zone", to.name())
    }

    /// An event about a player only.
    #[must_use]
    pub fn for_player(event_type: EventType, player: PlayerId) -> Self {
        Self::new(event_type).with_player(player)
    }

    #[must_use]
    pub fn with_source(mut self, source: ObjectId) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<Target>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn with_player(mut self, player: PlayerId) -> Self {
        self.player = Some(player);
        self
    }

    #[must_use]
    pub fn with_amount(mut self, amount: i32) -> Self {
        self.amount = amount;
        self
    }

    #[must_use]
    pub fn with_flag(mut self, flag: bool) -> Self {
        self.flag = flag;
        self
    }

    #[must_use]
    pub fn with_zone(mut self, zone: Zone) -> Self {
        self.zone = Some(zone);
        self
    }

    #[must_use]
    pub fn with_from_zone(mut self, zone: Zone) -> Self {
        self.from_zone = Some(zone);
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The target object, if the target is one.
    #[must_use]
    pub fn target_object(&self) -> Option<ObjectId> {
        self.target.and_then(Target::as_object)
    }

    /// The target player, if the target is one.
    #[must_use]
    pub fn target_player(&self) -> Option<PlayerId> {
        self.target.and_then(Target::as_player)
    }

    /// Whether a replacement effect has already touched this event.
    #[must_use]
    pub fn was_applied(&self, effect: EffectId) -> bool {
        self.applied_effects.contains(&effect)
    }

    /// How many times an effect appears in the applied set.
    #[must_use]
    pub fn applied_count(&self, effect: EffectId) -> usize {
        self.applied_effects.iter().filter(|&&e| e == effect).count()
    }

    #[must_use]
    pub fn is_damage(&self) -> bool {
        matches!(self.event_type, EventType::DamagePlayer | EventType::DamagePermanent)
    }
}
