//! Replacement and prevention effects.
//!
//! Before an event is published, [`ReplacementEngine::resolve`] rewrites it:
//!
//! 1. Collect effects that match the event type, apply to the event and
//!    have not already been applied to it
//! 2. Skip effects whose source caused the event, unless they declare
//!    self-scope
//! 3. Pick a self-replacement effect first, otherwise the earliest
//!    registered one
//! 4. Apply it and record it in the event's applied set
//! 5. Stop when nothing applies, when the event was completely replaced,
//!    or when the iteration cap is hit
//!
//! Prevention shields are replacement effects with a remaining amount. A
//! shield with a limit of zero prevents everything and never runs out. A
//! used-up shield reports 0 and stops applying; it is removed only when
//! its duration ends.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::duration::{CleanupPass, Duration};
use crate::core::{EffectId, ObjectId, PlayerId, Target};
use crate::events::{Event, EventType};
use crate::zones::Zone;

/// What a replacement effect does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplacementKind {
    /// Prevent damage to a target and/or from a source.
    PreventDamage {
        target: Option<Target>,
        source: Option<ObjectId>,
        /// Total the shield can prevent; 0 means unlimited.
        limit: u32,
        remaining: u32,
    },
    /// "If it would be put into `instead_of`, put it into `to` instead."
    RedirectZone {
        object: Option<ObjectId>,
        instead_of: Zone,
        to: Zone,
    },
    /// Double the amount of an event.
    DoubleAmount {
        event_type: EventType,
        target: Option<Target>,
    },
    /// Add to (or subtract from) the amount of an event, floored at zero.
    AdjustAmount {
        event_type: EventType,
        target: Option<Target>,
        delta: i32,
    },
}

/// A registered replacement effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementEffect {
    pub id: EffectId,
    pub source: Option<ObjectId>,
    pub controller: PlayerId,
    pub duration: Duration,
    /// Applies to its own source's event before other replacements.
    pub self_replacement: bool,
    /// May modify events its own source caused.
    pub self_scope: bool,
    pub kind: ReplacementKind,
}

impl ReplacementEffect {
    /// Build an effect; the id is assigned on registration.
    pub fn new(controller: PlayerId, kind: ReplacementKind, duration: Duration) -> Self {
        Self {
            id: EffectId::new(0),
            source: None,
            controller,
            duration,
            self_replacement: false,
            self_scope: false,
            kind,
        }
    }

    /// A damage prevention shield. `amount` of 0 prevents all damage.
    pub fn prevention(
        controller: PlayerId,
        target: Option<Target>,
        amount: u32,
        duration: Duration,
    ) -> Self {
        Self::new(
            controller,
            ReplacementKind::PreventDamage {
                target,
                source: None,
                limit: amount,
                remaining: amount,
            },
            duration,
        )
    }

    #[must_use]
    pub fn with_source(mut self, source: ObjectId) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn self_replacement(mut self) -> Self {
        self.self_replacement = true;
        self
    }

    #[must_use]
    pub fn with_self_scope(mut self) -> Self {
        self.self_scope = true;
        self
    }

    #[must_use]
    pub fn is_prevention(&self) -> bool {
        matches!(self.kind, ReplacementKind::PreventDamage { .. })
    }

    /// Remaining shield, or `None` for unlimited or non-prevention effects.
    #[must_use]
    pub fn shield_remaining(&self) -> Option<u32> {
        match self.kind {
            ReplacementKind::PreventDamage { limit, remaining, .. } if limit > 0 => Some(remaining),
            _ => None,
        }
    }

    /// The event type check.
    #[must_use]
    pub fn checks_event_type(&self, event: &Event) -> bool {
        match &self.kind {
            ReplacementKind::PreventDamage { .. } => event.is_damage(),
            ReplacementKind::RedirectZone { .. } => event.event_type == EventType::ZoneChange,
            ReplacementKind::DoubleAmount { event_type, .. }
            | ReplacementKind::AdjustAmount { event_type, .. } => event.event_type == *event_type,
        }
    }

    /// The detailed applicability check.
    #[must_use]
    pub fn applies(&self, event: &Event) -> bool {
        let matches_target =
            |target: &Option<Target>| target.map_or(true, |t| event.target == Some(t));
        match &self.kind {
            ReplacementKind::PreventDamage { target, source, limit, remaining } => {
                event.amount > 0
                    && (*limit == 0 || *remaining > 0)
                    && matches_target(target)
                    && source.map_or(true, |s| event.source == Some(s))
            }
            ReplacementKind::RedirectZone { object, instead_of, to } => {
                event.zone == Some(*instead_of)
                    && instead_of != to
                    && object.map_or(true, |o| event.source == Some(o))
            }
            ReplacementKind::DoubleAmount { target, .. } => {
                event.amount > 0 && matches_target(target)
            }
            ReplacementKind::AdjustAmount { target, .. } => {
                event.amount > 0 && matches_target(target)
            }
        }
    }

    /// Rewrite the event. Returns whether it was completely replaced.
    pub fn replace(&mut self, event: &mut Event) -> bool {
        match &mut self.kind {
            ReplacementKind::PreventDamage { limit, remaining, .. } => {
                if *limit == 0 {
                    event.amount = 0;
                } else {
                    let prevented = event.amount.min(*remaining as i32).max(0);
                    event.amount -= prevented;
                    *remaining -= prevented as u32;
                }
                event.amount == 0
            }
            ReplacementKind::RedirectZone { to, .. } => {
                event.zone = Some(*to);
                event.metadata.insert("target_zone".to_string(), to.name().to_string());
                false
            }
            ReplacementKind::DoubleAmount { .. } => {
                event.amount = event.amount.saturating_mul(2);
                false
            }
            ReplacementKind::AdjustAmount { delta, .. } => {
                event.amount = (event.amount + *delta).max(0);
                event.amount == 0
            }
        }
    }

    /// One-use effects are discarded after applying. An exhausted shield
    /// stays registered at 0 until its duration ends.
    fn is_spent(&self) -> bool {
        self.duration == Duration::OneUse
    }
}

/// The result of running replacements on one event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplacementOutcome {
    /// The final event (meaningless if completely replaced).
    pub event: Event,
    pub completely_replaced: bool,
    /// Effects applied, in order.
    pub applied: SmallVec<[EffectId; 4]>,
    /// The iteration cap stopped the loop.
    pub guard_tripped: bool,
}

/// Counts of registered replacement effects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplacementStats {
    pub total: usize,
    pub self_replacements: usize,
    pub preventions: usize,
}

/// Registry and resolver for replacement effects.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplacementEngine {
    effects: Vec<ReplacementEffect>,
    cap: usize,
    guard_trips: u64,
}

impl Default for ReplacementEngine {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ReplacementEngine {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            effects: Vec::new(),
            cap,
            guard_trips: 0,
        }
    }

    /// Add an effect that already carries its id.
    pub fn add(&mut self, effect: ReplacementEffect) {
        tracing::trace!(effect = %effect.id, "replacement effect added");
        self.effects.push(effect);
    }

    pub fn remove(&mut self, id: EffectId) -> Option<ReplacementEffect> {
        let idx = self.effects.iter().position(|e| e.id == id)?;
        Some(self.effects.remove(idx))
    }

    #[must_use]
    pub fn get(&self, id: EffectId) -> Option<&ReplacementEffect> {
        self.effects.iter().find(|e| e.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReplacementEffect> {
        self.effects.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// How many times the iteration cap has been hit.
    #[must_use]
    pub fn guard_trips(&self) -> u64 {
        self.guard_trips
    }

    #[must_use]
    pub fn stats(&self) -> ReplacementStats {
        ReplacementStats {
            total: self.effects.len(),
            self_replacements: self.effects.iter().filter(|e| e.self_replacement).count(),
            preventions: self.effects.iter().filter(|e| e.is_prevention()).count(),
        }
    }

    /// Whether any effect would modify this event.
    #[must_use]
    pub fn has_applicable(&self, event: &Event) -> bool {
        self.candidates(event).next().is_some()
    }

    /// Run every applicable replacement on an event.
    pub fn resolve(&mut self, mut event: Event) -> ReplacementOutcome {
        let mut applied = SmallVec::new();

        for _ in 0..self.cap {
            let Some(chosen) = self.choose(&event) else {
                return ReplacementOutcome {
                    event,
                    completely_replaced: false,
                    applied,
                    guard_tripped: false,
                };
            };

            let effect = &mut self.effects[chosen];
            let id = effect.id;
            let complete = effect.replace(&mut event);
            let spent = effect.is_spent();
            event.applied_effects.push(id);
            applied.push(id);
            tracing::trace!(
                effect = %id,
                event_type = ?event.event_type,
                amount = event.amount,
                "replacement applied"
            );

            if spent {
                self.effects.remove(chosen);
            }
            if complete {
                return ReplacementOutcome {
                    event,
                    completely_replaced: true,
                    applied,
                    guard_tripped: false,
                };
            }
        }

        if !self.has_applicable(&event) {
            return ReplacementOutcome {
                event,
                completely_replaced: false,
                applied,
                guard_tripped: false,
            };
        }

        self.guard_trips += 1;
        tracing::warn!(
            event_type = ?event.event_type,
            cap = self.cap,
            "replacement loop hit its iteration cap"
        );
        ReplacementOutcome {
            event,
            completely_replaced: false,
            applied,
            guard_tripped: true,
        }
    }

    /// Drop every effect that expires at this pass. Returns how many.
    pub fn cleanup(&mut self, pass: CleanupPass) -> usize {
        let before = self.effects.len();
        self.effects.retain(|e| !pass.expires(e.duration, e.source, e.controller));
        before - self.effects.len()
    }

    /// First self-replacement candidate, otherwise the first candidate.
    fn choose(&self, event: &Event) -> Option<usize> {
        let mut first = None;
        for idx in self.candidates(event) {
            if self.effects[idx].self_replacement {
                return Some(idx);
            }
            first.get_or_insert(idx);
        }
        first
    }

    fn candidates<'a>(&'a self, event: &'a Event) -> impl Iterator<Item = usize> + 'a {
        self.effects.iter().enumerate().filter_map(move |(idx, effect)| {
            let own_event =
                !effect.self_scope && effect.source.is_some() && event.source == effect.source;
            let eligible = !event.was_applied(effect.id)
                && !own_event
                && effect.checks_event_type(event)
                && effect.applies(event);
            eligible.then_some(idx)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P0: PlayerId = PlayerId(0);
    const P1: PlayerId = PlayerId(1);
    const BEAR: ObjectId = ObjectId(1);
    const SHOCK: ObjectId = ObjectId(2);

    fn engine_with(effects: Vec<ReplacementEffect>) -> ReplacementEngine {
        let mut engine = ReplacementEngine::new(100);
        for (i, effect) in effects.into_iter().enumerate() {
            engine.add(ReplacementEffect { id: EffectId::new(i as u32 + 1), ..effect });
        }
        engine
    }

    fn damage_to_bear(amount: i32) -> Event {
        Event::damage(Some(SHOCK), Target::Object(BEAR), amount)
    }

    #[test]
    fn test_no_effects_passes_through() {
        let mut engine = ReplacementEngine::default();
        let outcome = engine.resolve(damage_to_bear(3));

        assert!(!outcome.completely_replaced);
        assert_eq!(outcome.event.amount, 3);
        assert!(outcome.applied.is_empty());
    }

    #[test]
    fn test_shield_absorbs_then_runs_out() {
        let mut engine = engine_with(vec![ReplacementEffect::prevention(
            P0,
            Some(Target::Object(BEAR)),
            3,
            Duration::EndOfTurn,
        )]);

        let first = engine.resolve(damage_to_bear(2));
        assert!(first.completely_replaced);
        assert_eq!(engine.get(EffectId::new(1)).unwrap().shield_remaining(), Some(1));

        let second = engine.resolve(damage_to_bear(2));
        assert!(!second.completely_replaced);
        assert_eq!(second.event.amount, 1);
        assert_eq!(engine.get(EffectId::new(1)).unwrap().shield_remaining(), Some(0));

        let third = engine.resolve(damage_to_bear(2));
        assert_eq!(third.event.amount, 2);
        assert!(third.applied.is_empty());
        assert_eq!(engine.len(), 1);
        assert!(!engine.has_applicable(&damage_to_bear(2)));
    }

    #[test]
    fn test_unlimited_shield() {
        let mut engine = engine_with(vec![ReplacementEffect::prevention(
            P1,
            Some(Target::Player(P1)),
            0,
            Duration::EndOfTurn,
        )]);

        for _ in 0..3 {
            let outcome = engine.resolve(Event::damage(None, Target::Player(P1), 10));
            assert!(outcome.completely_replaced);
        }
        assert_eq!(engine.len(), 1);

        let other = engine.resolve(Event::damage(None, Target::Player(P0), 10));
        assert_eq!(other.event.amount, 10);
    }

    #[test]
    fn test_each_effect_applies_once() {
        let double = |target| {
            ReplacementEffect::new(
                P0,
                ReplacementKind::DoubleAmount { event_type: EventType::DamagePlayer, target },
                Duration::Permanent,
            )
        };
        let mut engine = engine_with(vec![double(None), double(Some(Target::Player(P1)))]);

        let outcome = engine.resolve(Event::damage(None, Target::Player(P1), 3));
        assert_eq!(outcome.event.amount, 12);
        assert_eq!(outcome.applied.as_slice(), &[EffectId::new(1), EffectId::new(2)]);
        assert_eq!(outcome.event.applied_count(EffectId::new(1)), 1);
    }

    #[test]
    fn test_self_replacement_goes_first() {
        let mut engine = engine_with(vec![
            ReplacementEffect::new(
                P0,
                ReplacementKind::AdjustAmount {
                    event_type: EventType::DamagePlayer,
                    target: None,
                    delta: 1,
                },
                Duration::Permanent,
            ),
            ReplacementEffect::new(
                P0,
                ReplacementKind::DoubleAmount { event_type: EventType::DamagePlayer, target: None },
                Duration::Permanent,
            )
            .self_replacement(),
        ]);

        // Double first (3 -> 6), then +1 = 7. Registration order would give 8.
        let outcome = engine.resolve(Event::damage(None, Target::Player(P1), 3));
        assert_eq!(outcome.event.amount, 7);
        assert_eq!(outcome.applied.as_slice(), &[EffectId::new(2), EffectId::new(1)]);
    }

    #[test]
    fn test_own_source_excluded_without_self_scope() {
        let shield = ReplacementEffect::new(
            P0,
            ReplacementKind::PreventDamage {
                target: None,
                source: Some(SHOCK),
                limit: 0,
                remaining: 0,
            },
            Duration::Permanent,
        )
        .with_source(SHOCK);

        let mut engine = engine_with(vec![shield.clone()]);
        assert_eq!(engine.resolve(damage_to_bear(2)).event.amount, 2);

        let mut engine = engine_with(vec![shield.with_self_scope()]);
        assert!(engine.resolve(damage_to_bear(2)).completely_replaced);
    }

    #[test]
    fn test_redirect_zone_one_use() {
        let mut engine = engine_with(vec![ReplacementEffect::new(
            P0,
            ReplacementKind::RedirectZone {
                object: None,
                instead_of: Zone::Graveyard,
                to: Zone::Exile,
            },
            Duration::OneUse,
        )]);

        let outcome = engine.resolve(Event::zone_change(BEAR, Zone::Battlefield, Zone::Graveyard));
        assert_eq!(outcome.event.zone, Some(Zone::Exile));
        assert!(!outcome.completely_replaced);
        assert!(engine.is_empty());

        let later = engine.resolve(Event::zone_change(BEAR, Zone::Battlefield, Zone::Graveyard));
        assert_eq!(later.event.zone, Some(Zone::Graveyard));
    }

    #[test]
    fn test_guard_trips_at_cap() {
        let mut engine = ReplacementEngine::new(1);
        for i in 1..=2 {
            engine.add(ReplacementEffect {
                id: EffectId::new(i),
                ..ReplacementEffect::new(
                    P0,
                    ReplacementKind::AdjustAmount {
                        event_type: EventType::GainedLife,
                        target: None,
                        delta: 1,
                    },
                    Duration::Permanent,
                )
            });
        }

        let outcome = engine.resolve(Event::for_player(EventType::GainedLife, P0).with_amount(1));
        assert!(outcome.guard_tripped);
        assert_eq!(outcome.event.amount, 2);
        assert_eq!(engine.guard_trips(), 1);
    }

    #[test]
    fn test_cleanup_and_stats() {
        let mut engine = engine_with(vec![
            ReplacementEffect::prevention(P0, None, 2, Duration::EndOfTurn),
            ReplacementEffect::prevention(P0, None, 2, Duration::WhileOnBattlefield)
                .with_source(BEAR)
                .self_replacement(),
        ]);

        let stats = engine.stats();
        assert_eq!((stats.total, stats.self_replacements, stats.preventions), (2, 1, 2));

        assert_eq!(engine.cleanup(CleanupPass::EndOfTurn), 1);
        assert_eq!(engine.cleanup(CleanupPass::SourceLeft(BEAR)), 1);
        assert!(engine.is_empty());
    }
}
