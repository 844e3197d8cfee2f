//! Engine integration tests.
//!
//! Everything here goes through `Engine`: the typed action API, the
//! bookmark taken around each action, undo, turn rollback, the mulligan,
//! pausing, snapshots and the notification channel.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mtg_rules::core::{EngineConfig, GameId, IllegalAction, PlayerId, RulesError, Target};
use mtg_rules::engine::{Engine, NotificationKind, PlayerAction};
use mtg_rules::events::EventType;
use mtg_rules::game::GameBuilder;
use mtg_rules::rules::{GameResult, ManaPayment, Step};
use mtg_rules::stack::SpellEffect;
use mtg_rules::zones::{CardSpec, Zone};

const P0: PlayerId = PlayerId(0);
const P1: PlayerId = PlayerId(1);
const P2: PlayerId = PlayerId(2);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn deck() -> Vec<CardSpec> {
    let mut deck = vec![CardSpec::creature("Bear", 2, 2); 30];
    deck.insert(0, CardSpec::instant("Shock").with_effect(SpellEffect::DealDamage { amount: 2 }));
    deck
}

/// Unshuffled decks with Shock on top, so P0 opens with it in hand.
fn builder(names: &[&str]) -> GameBuilder {
    names
        .iter()
        .fold(GameBuilder::new().without_shuffle(), |b, name| b.player(*name, deck()))
}

fn new_game(engine: &Engine, names: &[&str]) -> GameId {
    engine.create_game(builder(names)).unwrap()
}

fn holder(engine: &Engine, id: GameId) -> PlayerId {
    engine
        .with_game(id, |g| g.state.turn.priority)
        .unwrap()
        .expect("someone holds priority")
}

fn pass_until_turn(engine: &Engine, id: GameId, turn: u32) {
    while engine.with_game(id, |g| g.state.turn.turn).unwrap() < turn {
        let player = holder(engine, id);
        engine.process_action(id, player, PlayerAction::Pass).unwrap();
    }
}

fn shock(target: Target) -> PlayerAction {
    PlayerAction::cast_by_name("Shock", [target])
}

/// Refuses every cost.
struct Broke;

impl ManaPayment for Broke {
    fn pay(&self, _player: PlayerId, _cost: &str) -> bool {
        false
    }
}

// =============================================================================
// Action API
// =============================================================================

#[test]
fn test_priority_after_cast_through_engine() {
    init_tracing();
    let engine = Engine::default();
    let id = new_game(&engine, &["Alice", "Bob"]);

    let report = engine.process_action(id, P0, shock(Target::Player(P1))).unwrap();
    assert_eq!(report.priority, Some(P0));
    assert!(report.events.iter().any(|e| e.event_type == EventType::SpellCast));

    let report = engine.process_action(id, P0, PlayerAction::Pass).unwrap();
    assert_eq!(report.priority, Some(P1));

    let report = engine.process_action(id, P1, PlayerAction::Pass).unwrap();
    assert_eq!(report.priority, Some(P0));
    assert!(report.events.iter().any(|e| e.event_type == EventType::StackItemResolved));
    assert_eq!(engine.with_game(id, |g| g.state.players[P1].life).unwrap(), 18);
}

#[test]
fn test_failed_action_restores_bookmark() {
    let engine = Engine::with_payment(EngineConfig::default(), Arc::new(Broke));
    let bolt = CardSpec::instant("Bolt")
        .with_cost("{R}")
        .with_effect(SpellEffect::DealDamage { amount: 3 });
    let deck = vec![bolt; 10];
    let id = engine
        .create_game(GameBuilder::new().player("Alice", deck.clone()).player("Bob", deck))
        .unwrap();
    let (hand, messages) = engine
        .with_game(id, |g| (g.state.objects.zone_size(Zone::Hand, P0), g.state.messages.len()))
        .unwrap();

    let failure = engine
        .process_action(id, P0, PlayerAction::cast_by_name("Bolt", [Target::Player(P1)]))
        .unwrap_err();

    assert!(failure.state_restored);
    assert!(matches!(failure.error, RulesError::Illegal(IllegalAction::CannotPay { .. })));
    assert!(failure.to_string().ends_with("(state restored: true)"));

    engine
        .with_game(id, |g| {
            assert_eq!(g.state.objects.zone_size(Zone::Hand, P0), hand);
            assert!(g.state.stack.is_empty());
            assert_eq!(g.state.turn.priority, Some(P0));
            assert_eq!(g.state.messages.len(), messages + 1);
            let last = g.state.messages.back().unwrap();
            assert!(last.starts_with("action failed and state restored: "));
            assert_eq!(g.bookmark_count(), 0);
        })
        .unwrap();
}

#[test]
fn test_declarations_through_actions() {
    let engine = Engine::default();
    let id = engine
        .create_game(
            builder(&["Alice", "Bob"])
                .battlefield(P0, CardSpec::creature("Giant", 3, 3))
                .battlefield(P1, CardSpec::creature("Bear", 2, 2)),
        )
        .unwrap();
    let (giant, bear) = engine
        .with_game(id, |g| {
            let mut board = g.state.objects.battlefield();
            (board.next().unwrap(), board.next().unwrap())
        })
        .unwrap();

    while engine.with_game(id, |g| g.state.turn.step).unwrap() != Step::DeclareAttackers {
        engine.process_action(id, holder(&engine, id), PlayerAction::Pass).unwrap();
    }
    let attack = PlayerAction::DeclareAttacker {
        attacker: giant,
        defender: Target::Player(P1),
    };
    engine.process_action(id, P0, attack).unwrap();
    let view = engine.combat_view(id).unwrap();
    assert_eq!(view.attacking_player, Some(P0));
    assert_eq!(view.groups[0].attackers.as_slice(), &[giant]);

    engine.process_action(id, P0, PlayerAction::Pass).unwrap();
    engine.process_action(id, P1, PlayerAction::Pass).unwrap();
    engine
        .process_action(id, P1, PlayerAction::DeclareBlocker { blocker: bear, attacker: giant })
        .unwrap();
    engine.process_action(id, P0, PlayerAction::Pass).unwrap();
    engine.process_action(id, P1, PlayerAction::Pass).unwrap();

    engine
        .with_game(id, |g| {
            assert_eq!(g.state.turn.step, Step::CombatDamage);
            assert_eq!(g.state.objects.zone_of(bear), Some(Zone::Graveyard));
        })
        .unwrap();
}

// =============================================================================
// Bookmarks, undo and rollback
// =============================================================================

#[test]
fn test_manual_bookmark_restore() {
    let engine = Engine::default();
    let id = new_game(&engine, &["Alice", "Bob"]);

    let bookmark = engine.bookmark_state(id).unwrap();
    assert_eq!(bookmark, 1);
    engine.process_action(id, P0, PlayerAction::ChangeLife(-5)).unwrap();
    assert_eq!(engine.with_game(id, |g| g.state.players[P0].life).unwrap(), 15);

    engine.restore_state(id, bookmark).unwrap();
    assert_eq!(engine.with_game(id, |g| g.state.players[P0].life).unwrap(), 20);
    assert!(matches!(engine.restore_state(id, bookmark), Err(RulesError::BookmarkNotFound(1))));
    assert!(!engine.remove_bookmark(id, bookmark).unwrap());
}

#[test]
fn test_undo_player_bookmark() {
    let engine = Engine::default();
    let id = new_game(&engine, &["Alice", "Bob"]);

    engine.set_player_bookmark(id, P0).unwrap();
    engine.process_action(id, P0, shock(Target::Player(P1))).unwrap();
    // The action's bookmark replaces the manual one.
    assert_eq!(engine.with_game(id, |g| g.bookmark_count()).unwrap(), 1);

    engine.undo(id, P0).unwrap();
    engine
        .with_game(id, |g| {
            assert!(g.state.stack.is_empty());
            assert!(g.state.objects.find_in_hand(P0, "Shock").is_some());
            assert_eq!(g.state.players[P0].stored_bookmark, None);
        })
        .unwrap();

    assert!(matches!(
        engine.undo(id, P0),
        Err(RulesError::Illegal(IllegalAction::NoUndo(p))) if p == P0
    ));
}

#[test]
fn test_undo_without_manual_bookmark() {
    let engine = Engine::default();
    let id = new_game(&engine, &["Alice", "Bob"]);

    engine.process_action(id, P0, PlayerAction::ChangeLife(-3)).unwrap();
    engine.process_action(id, P0, shock(Target::Player(P1))).unwrap();
    assert_eq!(engine.with_game(id, |g| g.bookmark_count()).unwrap(), 1);

    engine.undo(id, P0).unwrap();
    engine
        .with_game(id, |g| {
            // Only the cast is undone.
            assert!(g.state.stack.is_empty());
            assert_eq!(g.state.players[P0].life, 17);
            assert!(g.state.messages.iter().any(|m| m == "Alice undid their last action"));
        })
        .unwrap();
    assert!(engine.undo(id, P0).is_err());
}

#[test]
fn test_reset_player_bookmark() {
    let engine = Engine::default();
    let id = new_game(&engine, &["Alice", "Bob"]);

    engine.set_player_bookmark(id, P1).unwrap();
    engine.reset_player_bookmark(id, P1).unwrap();
    assert_eq!(engine.with_game(id, |g| g.bookmark_count()).unwrap(), 0);
    assert!(engine.undo(id, P1).is_err());
}

#[test]
fn test_turn_rollback_window() {
    let engine = Engine::default();
    let id = new_game(&engine, &["Alice", "Bob"]);
    pass_until_turn(&engine, id, 6);

    // Four turns are kept: 3, 4, 5 and 6.
    assert!(engine.can_rollback_turns(id, 3).unwrap());
    assert!(!engine.can_rollback_turns(id, 4).unwrap());
    assert!(matches!(
        engine.rollback_turns(id, 6),
        Err(RulesError::Illegal(IllegalAction::RollbackTooFar(0)))
    ));

    engine.set_player_bookmark(id, P0).unwrap();
    engine.rollback_turns(id, 2).unwrap();
    engine
        .with_game(id, |g| {
            assert_eq!(g.state.turn.turn, 4);
            assert_eq!(g.state.turn.step, Step::Upkeep);
            assert_eq!(g.bookmark_count(), 0);
            assert!(g.state.players.values().all(|p| p.stored_bookmark.is_none()));
        })
        .unwrap();

    // Turn 3 and the re-saved turn 4 remain.
    assert!(engine.can_rollback_turns(id, 0).unwrap());
    assert!(engine.can_rollback_turns(id, 1).unwrap());
    assert!(!engine.can_rollback_turns(id, 2).unwrap());
}

#[test]
fn test_rollback_disabled() {
    let engine = Engine::new(EngineConfig::default().without_rollback());
    let id = new_game(&engine, &["Alice", "Bob"]);
    pass_until_turn(&engine, id, 2);

    assert!(!engine.can_rollback_turns(id, 1).unwrap());
    assert!(matches!(engine.rollback_turns(id, 1), Err(RulesError::RollbackDisabled)));
}

// =============================================================================
// Opening hands and pausing
// =============================================================================

#[test]
fn test_london_mulligan_through_actions() {
    let engine = Engine::default();
    let id = engine.create_game(builder(&["Alice", "Bob"]).with_mulligan()).unwrap();

    let failure = engine.process_action(id, P0, PlayerAction::Pass).unwrap_err();
    assert!(matches!(failure.error, RulesError::Illegal(IllegalAction::MulliganInProgress)));

    engine.process_action(id, P0, PlayerAction::Mulligan).unwrap();
    let first = engine
        .with_game(id, |g| g.state.objects.in_zone(Zone::Hand, P0).next().unwrap())
        .unwrap();
    let failure = engine.process_action(id, P0, PlayerAction::keep_hand([])).unwrap_err();
    assert!(matches!(
        failure.error,
        RulesError::Illegal(IllegalAction::WrongBottomCount { expected: 1, actual: 0, .. })
    ));
    engine.process_action(id, P0, PlayerAction::keep_hand([first])).unwrap();
    assert_eq!(engine.with_game(id, |g| g.state.turn.turn).unwrap(), 0);

    let report = engine.process_action(id, P1, PlayerAction::keep_hand([])).unwrap();
    assert_eq!(report.priority, Some(P0));
    assert!(report.events.iter().any(|e| e.event_type == EventType::KeptHand));
    assert!(report.events.iter().any(|e| e.event_type == EventType::ChangeStep));

    engine
        .with_game(id, |g| {
            assert!(!g.state.mulligan);
            assert_eq!(g.state.turn.turn, 1);
            assert_eq!(g.state.objects.zone_size(Zone::Hand, P0), 6);
            assert_eq!(g.state.objects.zone_size(Zone::Hand, P1), 7);
            assert_eq!(g.state.objects.in_zone(Zone::Library, P0).next(), Some(first));
            let messages: Vec<&String> = g.state.messages.iter().collect();
            assert!(messages.iter().any(|m| *m == "Alice mulligans to 6 cards"));
            assert!(messages.iter().any(|m| *m == "Bob keeps their hand"));
        })
        .unwrap();
}

#[test]
fn test_concession_can_end_the_mulligan() {
    let engine = Engine::default();
    let id = engine
        .create_game(builder(&["Alice", "Bob", "Carol"]).with_mulligan())
        .unwrap();

    engine.process_action(id, P0, PlayerAction::keep_hand([])).unwrap();
    engine.process_action(id, P1, PlayerAction::keep_hand([])).unwrap();
    let report = engine.concede(id, P2).unwrap();

    assert_eq!(report.result, None);
    assert_eq!(report.priority, Some(P0));
    assert_eq!(engine.with_game(id, |g| g.state.turn.turn).unwrap(), 1);
}

#[test]
fn test_paused_game_rejects_actions() {
    init_tracing();
    let engine = Engine::default();
    let id = new_game(&engine, &["Alice", "Bob"]);

    engine.pause_game(id).unwrap();
    let failure = engine.process_action(id, P0, PlayerAction::Pass).unwrap_err();
    assert!(matches!(failure.error, RulesError::Paused));
    assert!(matches!(engine.concede(id, P1).unwrap_err().error, RulesError::Paused));
    assert!(matches!(engine.resume_game(id), Ok(())));
    assert!(matches!(engine.resume_game(id), Err(RulesError::NotPaused)));

    let report = engine.process_action(id, P0, PlayerAction::Pass).unwrap();
    assert_eq!(report.priority, Some(P1));
    engine
        .with_game(id, |g| {
            assert!(g.state.messages.iter().any(|m| m == "Game paused"));
            assert!(g.state.messages.iter().any(|m| m == "Game resumed"));
        })
        .unwrap();
}

// =============================================================================
// Leaving and game over
// =============================================================================

#[test]
fn test_concede_ends_game() {
    let engine = Engine::default();
    let mut rx = engine.notifications().unwrap();
    let id = new_game(&engine, &["Alice", "Bob"]);

    let report = engine.concede(id, P1).unwrap();
    assert_eq!(report.result, Some(GameResult::Winner(P0)));
    assert!(report.events.iter().any(|e| e.event_type == EventType::GameOver));

    let kinds: Vec<NotificationKind> =
        std::iter::from_fn(|| rx.try_recv().ok()).map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::GameCreated,
            NotificationKind::ActionProcessed,
            NotificationKind::GameOver,
        ]
    );

    let failure = engine.process_action(id, P0, PlayerAction::Pass).unwrap_err();
    assert!(matches!(failure.error, RulesError::GameOver));
    assert!(!failure.state_restored);
}

#[test]
fn test_notifications_before_claim_are_not_kept() {
    let engine = Engine::default();
    let id = new_game(&engine, &["Alice", "Bob"]);
    for _ in 0..50 {
        let _ = engine.process_action(id, P1, PlayerAction::Pass);
    }

    let mut rx = engine.notifications().unwrap();
    assert!(rx.try_recv().is_err());

    engine.concede(id, P1).unwrap();
    let kinds: Vec<NotificationKind> =
        std::iter::from_fn(|| rx.try_recv().ok()).map(|n| n.kind).collect();
    assert_eq!(kinds, vec![NotificationKind::ActionProcessed, NotificationKind::GameOver]);
}

#[test]
fn test_timeouts_concede_in_multiplayer() {
    let engine = Engine::default();
    let id = new_game(&engine, &["Alice", "Bob", "Carol"]);

    engine.timeout(id, P1).unwrap();
    engine
        .with_game(id, |g| {
            assert!(!g.state.is_over());
            assert!(g.state.players[P1].lost);
            assert!(g.state.messages.iter().any(|m| m == "Bob timed out"));
        })
        .unwrap();

    let report = engine.idle_timeout(id, P2).unwrap();
    assert_eq!(report.result, Some(GameResult::Winner(P0)));
}

// =============================================================================
// Snapshots and subscribers
// =============================================================================

#[test]
fn test_snapshot_survives_encoding() {
    let engine = Engine::default();
    let id = new_game(&engine, &["Alice", "Bob"]);
    engine.process_action(id, P0, shock(Target::Player(P1))).unwrap();

    let bytes = engine.encode_snapshot(id).unwrap();
    let copy = engine.import_snapshot(Engine::decode_snapshot(&bytes).unwrap()).unwrap();

    // The copy carries on independently.
    engine.process_action(copy, P0, PlayerAction::Pass).unwrap();
    engine.process_action(copy, P1, PlayerAction::Pass).unwrap();
    assert_eq!(engine.with_game(copy, |g| g.state.players[P1].life).unwrap(), 18);
    assert_eq!(engine.with_game(id, |g| g.state.stack.len()).unwrap(), 1);
}

#[test]
fn test_corrupt_snapshot_is_an_error() {
    assert!(matches!(Engine::decode_snapshot(&[1, 2, 3]), Err(RulesError::Snapshot(_))));
}

#[test]
fn test_subscribers_see_events_in_order() {
    let engine = Engine::default();
    let id = new_game(&engine, &["Alice", "Bob"]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine
        .subscribe(id, move |e| sink.lock().unwrap().push(e.event_type))
        .unwrap();
    let damage = Arc::new(Mutex::new(0));
    let total = Arc::clone(&damage);
    engine
        .subscribe_typed(id, EventType::DamagePlayer, move |e| *total.lock().unwrap() += e.amount)
        .unwrap();

    let mut expected = Vec::new();
    let actions = [
        (P0, shock(Target::Player(P1))),
        (P0, PlayerAction::Pass),
        (P1, PlayerAction::Pass),
    ];
    for (player, action) in actions {
        let report = engine.process_action(id, player, action).unwrap();
        expected.extend(report.events.iter().map(|e| e.event_type));
    }

    assert_eq!(*seen.lock().unwrap(), expected);
    assert_eq!(*damage.lock().unwrap(), 2);
}

// =============================================================================
// Notifications
// =============================================================================

#[test]
fn test_handler_can_call_back_into_engine() {
    let engine = Arc::new(Engine::default());
    let id = new_game(&engine, &["Alice", "Bob"]);
    let (tx, rx) = std::sync::mpsc::channel();

    let inner = Arc::clone(&engine);
    engine
        .set_notification_handler(move |note| {
            if note.kind == NotificationKind::ActionProcessed {
                let priority = inner.with_game(note.game_id, |g| g.state.turn.priority).unwrap();
                let _ = tx.send(priority);
            }
        })
        .unwrap();

    let report = engine.process_action(id, P0, PlayerAction::Pass).unwrap();
    let observed = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(observed, report.priority);
    assert!(engine.notifications().is_none());
}

#[tokio::test]
async fn test_async_receiver() {
    let engine = Engine::default();
    let mut rx = engine.notifications().unwrap();
    let id = new_game(&engine, &["Alice", "Bob"]);
    let _ = engine.process_action(id, P1, PlayerAction::Pass);

    let created = rx.recv().await.unwrap();
    assert_eq!(created.kind, NotificationKind::GameCreated);

    let failed = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    assert_eq!(failed.kind, NotificationKind::ActionFailed);
    assert_eq!(failed.player, Some(P1));
    assert!(failed.events.is_empty());
    assert!(failed.message.unwrap().contains("does not have priority"));
}
