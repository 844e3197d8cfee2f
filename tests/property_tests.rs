//! Property tests for the laws the engine relies on.
//!
//! - layer order decides the result, not registration order across layers
//! - each replacement effect touches an event at most once
//! - a self-replacement effect is always chosen first
//! - prevention shields absorb exactly what they have left
//! - the stack is last in, first out
//! - state-based actions reach a fixed point

use proptest::prelude::*;
use smallvec::SmallVec;

use mtg_rules::core::{EffectId, EngineConfig, PlayerId, Target};
use mtg_rules::effects::{
    AffectedObjects, ContinuousEffect, ContinuousKind, Duration, EffectRegistry, ReplacementEffect,
    ReplacementKind,
};
use mtg_rules::events::{Event, EventType};
use mtg_rules::game::GameState;
use mtg_rules::stack::{SpellStack, StackItem, StackItemKind};
use mtg_rules::zones::{CardSpec, CardType, Color, Keyword, ObjectStore, Zone};

const P0: PlayerId = PlayerId(0);
const P1: PlayerId = PlayerId(1);

// =============================================================================
// Strategies
// =============================================================================

fn continuous_kind() -> impl Strategy<Value = ContinuousKind> {
    prop_oneof![
        Just(ContinuousKind::AddTypes {
            types: SmallVec::from_slice(&[CardType::Creature]),
            subtypes: SmallVec::new(),
        }),
        Just(ContinuousKind::SetColors(SmallVec::from_slice(&[Color::Blue]))),
        Just(ContinuousKind::GrantKeyword(Keyword::Flying)),
        Just(ContinuousKind::RemoveAllAbilities),
        (0..5i32, 0..5i32).prop_map(|(power, toughness)| {
            ContinuousKind::SetBasePowerToughness { power, toughness }
        }),
        (-3..4i32, -3..4i32).prop_map(|(power, toughness)| {
            ContinuousKind::ModifyPowerToughness { power, toughness }
        }),
        Just(ContinuousKind::SwitchPowerToughness),
    ]
}

fn amount_kind() -> impl Strategy<Value = ReplacementKind> {
    prop_oneof![
        Just(ReplacementKind::DoubleAmount { event_type: EventType::DamagePlayer, target: None }),
        (1..4i32).prop_map(|delta| ReplacementKind::AdjustAmount {
            event_type: EventType::DamagePlayer,
            target: None,
            delta,
        }),
    ]
}

fn characteristics_with(kinds: &[ContinuousKind]) -> mtg_rules::effects::Characteristics {
    let mut store = ObjectStore::new(2);
    let relic = store.create(
        CardSpec::new("Relic").with_type(CardType::Artifact).with_power_toughness(1, 3),
        P0,
        Zone::Battlefield,
    );
    let mut effects = EffectRegistry::new(100);
    for kind in kinds {
        effects.add_continuous(ContinuousEffect::new(
            P0,
            AffectedObjects::Object(relic),
            kind.clone(),
            Duration::Permanent,
        ));
    }
    effects.characteristics(relic, &store).unwrap()
}

// =============================================================================
// Layers
// =============================================================================

proptest! {
    #[test]
    fn test_layer_order_beats_registration_order(
        kinds in prop::collection::vec(continuous_kind(), 0..8),
    ) {
        let mut by_layer = kinds.clone();
        by_layer.sort_by_key(ContinuousKind::layer);

        prop_assert_eq!(characteristics_with(&kinds), characteristics_with(&by_layer));
    }

    #[test]
    fn test_characteristics_are_stable(kinds in prop::collection::vec(continuous_kind(), 0..8)) {
        prop_assert_eq!(characteristics_with(&kinds), characteristics_with(&kinds));
    }
}

// =============================================================================
// Replacement and prevention
// =============================================================================

proptest! {
    #[test]
    fn test_each_replacement_applies_at_most_once(
        kinds in prop::collection::vec(amount_kind(), 1..6),
        amount in 1..10i32,
    ) {
        let mut effects = EffectRegistry::new(100);
        let ids: Vec<EffectId> = kinds
            .into_iter()
            .map(|kind| {
                effects.add_replacement(ReplacementEffect::new(P0, kind, Duration::Permanent))
            })
            .collect();

        let outcome = effects.resolve(Event::damage(None, Target::Player(P1), amount));

        prop_assert!(!outcome.guard_tripped);
        prop_assert_eq!(outcome.applied.len(), ids.len());
        let mut applied: Vec<EffectId> = outcome.applied.to_vec();
        applied.sort();
        applied.dedup();
        prop_assert_eq!(applied.len(), ids.len());
        prop_assert_eq!(outcome.event.applied_effects, outcome.applied);
    }

    #[test]
    fn test_self_replacement_goes_first(
        kinds in prop::collection::vec(amount_kind(), 1..6),
        pick in any::<prop::sample::Index>(),
    ) {
        let chosen = pick.index(kinds.len());
        let mut effects = EffectRegistry::new(100);
        let mut self_id = None;
        for (i, kind) in kinds.into_iter().enumerate() {
            let effect = ReplacementEffect::new(P0, kind, Duration::Permanent);
            if i == chosen {
                self_id = Some(effects.add_replacement(effect.self_replacement()));
            } else {
                effects.add_replacement(effect);
            }
        }

        let outcome = effects.resolve(Event::damage(None, Target::Player(P1), 2));
        prop_assert_eq!(outcome.applied.first().copied(), self_id);
    }

    #[test]
    fn test_shield_absorbs_what_it_has(shield in 1..10u32, damage in 1..15i32) {
        let mut effects = EffectRegistry::new(100);
        let id = effects.add_replacement(ReplacementEffect::prevention(
            P1,
            Some(Target::Player(P1)),
            shield,
            Duration::EndOfTurn,
        ));

        let outcome = effects.resolve(Event::damage(None, Target::Player(P1), damage));
        let absorbed = damage.min(shield as i32);

        prop_assert_eq!(outcome.event.amount, damage - absorbed);
        prop_assert_eq!(outcome.completely_replaced, damage <= shield as i32);
        let left = effects.replacements.get(id).and_then(ReplacementEffect::shield_remaining);
        prop_assert_eq!(left, Some(shield - absorbed as u32));

        // An exhausted shield never absorbs again.
        let again = effects.resolve(Event::damage(None, Target::Player(P1), damage));
        let expected = if left == Some(0) {
            damage
        } else {
            damage - damage.min(shield as i32 - absorbed)
        };
        prop_assert_eq!(again.event.amount, expected);
    }
}

// =============================================================================
// Stack
// =============================================================================

proptest! {
    #[test]
    fn test_stack_pops_in_reverse(controllers in prop::collection::vec(0..4u8, 1..12)) {
        let mut stack = SpellStack::new();
        let pushed: Vec<_> = controllers
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                stack.push(StackItem::new(StackItemKind::Spell, PlayerId(c), format!("item {i}")))
            })
            .collect();

        let mut popped = Vec::new();
        while let Some(item) = stack.pop() {
            popped.push(item.id);
        }
        popped.reverse();
        prop_assert_eq!(popped, pushed);
    }
}

// =============================================================================
// State-based actions
// =============================================================================

proptest! {
    #[test]
    fn test_state_based_actions_reach_fixed_point(
        creatures in prop::collection::vec((0..4i32, 0..5i32, 0..6i32), 1..8),
        life in -3..5i32,
    ) {
        let mut state = GameState::new(EngineConfig::default(), ["Alice", "Bob", "Carol"], 9);
        for (i, &(power, toughness, damage)) in creatures.iter().enumerate() {
            let owner = PlayerId((i % 3) as u8);
            let spec = CardSpec::creature(format!("C{i}"), power, toughness);
            let id = state.create_object(spec, owner, Zone::Battlefield);
            state.objects.get_mut(id).unwrap().mark_damage(damage, None);
        }
        state.players[P1].life = life;

        state.stabilize().unwrap();
        state.take_events();
        let board: Vec<_> = state.objects.battlefield().collect();
        let lost: Vec<bool> = state.players.values().map(|p| p.lost).collect();

        state.stabilize().unwrap();
        prop_assert!(state.take_events().is_empty());
        prop_assert_eq!(state.objects.battlefield().collect::<Vec<_>>(), board);
        prop_assert_eq!(state.players.values().map(|p| p.lost).collect::<Vec<_>>(), lost);
        prop_assert!(state
            .objects
            .battlefield()
            .filter_map(|id| state.characteristics(id).ok())
            .all(|c| c.toughness_or_zero() > 0));
    }
}
