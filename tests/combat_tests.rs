//! Combat integration tests.
//!
//! Each test builds a board, walks the turn to the declare attackers step
//! by passing priority, and lets combat damage happen as the turn moves on.

use mtg_rules::core::{EngineConfig, IllegalAction, ObjectId, PlayerId, RulesError, Target};
use mtg_rules::effects::{AffectedObjects, ContinuousEffect, ContinuousKind, Duration};
use mtg_rules::events::EventType;
use mtg_rules::game::GameState;
use mtg_rules::rules::Step;
use mtg_rules::zones::{CardSpec, CounterKind, Keyword, Zone};

const P0: PlayerId = PlayerId(0);
const P1: PlayerId = PlayerId(1);

fn board() -> GameState {
    GameState::new(EngineConfig::default(), ["Alice", "Bob"], 3)
}

fn creature(
    state: &mut GameState,
    owner: PlayerId,
    name: &str,
    power: i32,
    toughness: i32,
    keywords: &[Keyword],
) -> ObjectId {
    let mut spec = CardSpec::creature(name, power, toughness);
    for &keyword in keywords {
        spec = spec.with_keyword(keyword);
    }
    state.create_object(spec, owner, Zone::Battlefield)
}

fn pass_round(state: &mut GameState) {
    let players = state.players.values().filter(|p| p.can_respond()).count();
    for _ in 0..players {
        let holder = state.turn.priority.expect("someone holds priority");
        state.pass_priority(holder).unwrap();
    }
}

/// Start the game and pass until `step` is reached.
fn advance_to(state: &mut GameState, step: Step) {
    if state.turn.turn == 0 {
        state.start().unwrap();
    }
    while state.turn.step != step {
        pass_round(state);
    }
}

fn attack(state: &mut GameState, attacker: ObjectId) {
    state.declare_attacker(P0, attacker, Target::Player(P1)).unwrap();
}

/// Pass out of declare attackers, optionally block, and reach combat damage.
fn block_and_fight(state: &mut GameState, blocks: &[(ObjectId, ObjectId)]) {
    advance_to(state, Step::DeclareBlockers);
    for &(blocker, attacker) in blocks {
        state.declare_blocker(P1, blocker, attacker).unwrap();
    }
    advance_to(state, Step::CombatDamage);
}

// =============================================================================
// Damage
// =============================================================================

#[test]
fn test_lethal_damage_to_blocker() {
    let mut state = board();
    let giant = creature(&mut state, P0, "Giant", 3, 3, &[]);
    let bear = creature(&mut state, P1, "Bear", 2, 2, &[]);

    advance_to(&mut state, Step::DeclareAttackers);
    attack(&mut state, giant);
    block_and_fight(&mut state, &[(bear, giant)]);

    assert_eq!(state.objects.zone_of(bear), Some(Zone::Graveyard));
    assert_eq!(state.objects.zone_of(giant), Some(Zone::Battlefield));
    assert_eq!(state.objects.get(giant).unwrap().damage, 2);
    assert_eq!(state.players[P1].life, 20);
}

#[test]
fn test_trample_overflow() {
    let mut state = board();
    let wurm = creature(&mut state, P0, "Wurm", 5, 5, &[Keyword::Trample]);
    let squirrel = creature(&mut state, P1, "Squirrel", 1, 1, &[]);

    advance_to(&mut state, Step::DeclareAttackers);
    attack(&mut state, wurm);
    block_and_fight(&mut state, &[(squirrel, wurm)]);

    assert_eq!(state.objects.zone_of(squirrel), Some(Zone::Graveyard));
    assert_eq!(state.players[P1].life, 16);
}

#[test]
fn test_deathtouch_with_trample_assigns_one() {
    let mut state = board();
    let viper = creature(&mut state, P0, "Viper", 3, 3, &[Keyword::Trample, Keyword::Deathtouch]);
    let wall = creature(&mut state, P1, "Wall", 0, 4, &[]);

    advance_to(&mut state, Step::DeclareAttackers);
    attack(&mut state, viper);
    block_and_fight(&mut state, &[(wall, viper)]);

    assert_eq!(state.objects.zone_of(wall), Some(Zone::Graveyard));
    assert_eq!(state.players[P1].life, 18);
}

#[test]
fn test_first_strike_kills_before_regular_damage() {
    let mut state = board();
    let knight = creature(&mut state, P0, "Knight", 2, 2, &[Keyword::FirstStrike]);
    let bear = creature(&mut state, P1, "Bear", 2, 2, &[]);

    advance_to(&mut state, Step::DeclareAttackers);
    attack(&mut state, knight);
    state.take_events();
    block_and_fight(&mut state, &[(bear, knight)]);

    assert_eq!(state.objects.zone_of(bear), Some(Zone::Graveyard));
    assert_eq!(state.objects.get(knight).unwrap().damage, 0);

    let passes: Vec<bool> = state
        .take_events()
        .iter()
        .filter(|e| e.event_type == EventType::CombatDamageApplied)
        .map(|e| e.flag)
        .collect();
    assert_eq!(passes, vec![true, false]);
}

#[test]
fn test_unblocked_attacker_hits_player() {
    let mut state = board();
    let bear = creature(&mut state, P0, "Bear", 2, 2, &[]);

    advance_to(&mut state, Step::DeclareAttackers);
    attack(&mut state, bear);
    advance_to(&mut state, Step::CombatDamage);

    assert_eq!(state.players[P1].life, 18);
}

#[test]
fn test_planeswalker_loses_loyalty() {
    let mut state = board();
    let bear = creature(&mut state, P0, "Bear", 2, 2, &[]);
    let walker = state.create_object(CardSpec::planeswalker("Jace", 3), P1, Zone::Battlefield);

    advance_to(&mut state, Step::DeclareAttackers);
    assert!(state.combat.defenders.contains(&Target::Object(walker)));
    state.declare_attacker(P0, bear, Target::Object(walker)).unwrap();
    advance_to(&mut state, Step::CombatDamage);

    assert_eq!(state.objects.get(walker).unwrap().counter(CounterKind::Loyalty), 1);
    assert_eq!(state.players[P1].life, 20);
}

// =============================================================================
// Declarations
// =============================================================================

#[test]
fn test_flying_and_reach() {
    let mut state = board();
    let drake = creature(&mut state, P0, "Drake", 2, 2, &[Keyword::Flying]);
    let bear = creature(&mut state, P1, "Bear", 2, 2, &[]);
    let spider = creature(&mut state, P1, "Spider", 1, 3, &[Keyword::Reach]);

    advance_to(&mut state, Step::DeclareAttackers);
    attack(&mut state, drake);
    advance_to(&mut state, Step::DeclareBlockers);

    assert!(matches!(
        state.declare_blocker(P1, bear, drake),
        Err(RulesError::Illegal(IllegalAction::CantBlock { .. }))
    ));
    state.declare_blocker(P1, spider, drake).unwrap();
    advance_to(&mut state, Step::CombatDamage);

    assert_eq!(state.objects.get(spider).unwrap().damage, 2);
    assert_eq!(state.objects.get(drake).unwrap().damage, 1);
    assert_eq!(state.players[P1].life, 20);
}

#[test]
fn test_vigilance_does_not_tap() {
    let mut state = board();
    let guard = creature(&mut state, P0, "Guard", 2, 2, &[Keyword::Vigilance]);
    let bear = creature(&mut state, P0, "Bear", 2, 2, &[]);

    advance_to(&mut state, Step::DeclareAttackers);
    attack(&mut state, guard);
    attack(&mut state, bear);

    assert!(!state.objects.get(guard).unwrap().tapped);
    assert!(state.objects.get(bear).unwrap().tapped);
}

#[test]
fn test_defender_cannot_attack() {
    let mut state = board();
    let wall = creature(&mut state, P0, "Wall", 0, 5, &[Keyword::Defender]);

    advance_to(&mut state, Step::DeclareAttackers);
    assert!(matches!(
        state.declare_attacker(P0, wall, Target::Player(P1)),
        Err(RulesError::Illegal(IllegalAction::HasDefender(_)))
    ));
}

#[test]
fn test_attacks_only_in_declare_attackers() {
    let mut state = board();
    let bear = creature(&mut state, P0, "Bear", 2, 2, &[]);

    advance_to(&mut state, Step::Main1);
    assert!(matches!(
        state.declare_attacker(P0, bear, Target::Player(P1)),
        Err(RulesError::Illegal(IllegalAction::WrongStep { .. }))
    ));
}

#[test]
fn test_must_attack_is_declared_automatically() {
    let mut state = board();
    let berserker = creature(&mut state, P0, "Berserker", 2, 2, &[]);
    state.add_continuous_effect(ContinuousEffect::new(
        P0,
        AffectedObjects::Object(berserker),
        ContinuousKind::MustAttack,
        Duration::EndOfTurn,
    ));

    advance_to(&mut state, Step::DeclareAttackers);
    pass_round(&mut state);

    assert!(state.combat.is_attacking(berserker));
    assert_eq!(state.turn.step, Step::DeclareBlockers);
}

#[test]
fn test_no_attackers_skips_to_end_of_combat() {
    let mut state = board();
    creature(&mut state, P0, "Bear", 2, 2, &[]);

    advance_to(&mut state, Step::DeclareAttackers);
    pass_round(&mut state);
    assert_eq!(state.turn.step, Step::EndCombat);
}

#[test]
fn test_end_of_combat_clears_state() {
    let mut state = board();
    let bear = creature(&mut state, P0, "Bear", 2, 2, &[]);
    let wall = creature(&mut state, P1, "Wall", 0, 4, &[]);

    advance_to(&mut state, Step::DeclareAttackers);
    attack(&mut state, bear);
    block_and_fight(&mut state, &[(wall, bear)]);
    assert_eq!(state.objects.get(wall).unwrap().damage, 2);

    advance_to(&mut state, Step::EndCombat);
    assert!(!state.combat.is_attacking(bear));
    assert!(state.combat.groups.is_empty());
    assert!(state.attacked_this_turn(bear));
    assert_eq!(state.objects.get(wall).unwrap().damage, 0);
}
