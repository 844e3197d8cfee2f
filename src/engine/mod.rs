//! The multi-game engine.
//!
//! ## Key Types
//!
//! - `Engine`: registry of running games, each behind its own `RwLock`
//! - `PlayerAction`: the typed action API
//! - `ActionReport` / `ActionFailure`: outcome of one action
//! - `GameNotification`: sent asynchronously after each call
//! - `GameSnapshot`: a whole game state in bincode form
//!
//! ## Locking
//!
//! Mutations hold the game's write lock for their whole duration and
//! queries take the read lock. Notifications are sent only after the lock
//! is released, so a notification handler may call back into the engine.
//!
//! ```
//! use mtg_rules::core::{EngineConfig, PlayerId};
//! use mtg_rules::engine::{Engine, PlayerAction};
//! use mtg_rules::game::GameBuilder;
//! use mtg_rules::zones::CardSpec;
//!
//! let engine = Engine::new(EngineConfig::default());
//! let deck = vec![CardSpec::creature("Bear", 2, 2); 20];
//! let game = engine
//!     .create_game(GameBuilder::new().player("Alice", deck.clone()).player("Bob", deck))
//!     .unwrap();
//!
//! let report = engine.process_action(game, PlayerId::new(0), PlayerAction::Pass).unwrap();
//! assert_eq!(report.priority, Some(PlayerId::new(1)));
//! ```

mod action;
mod history;
mod notify;

pub use action::{ActionFailure, ActionReport, PlayerAction};
pub use history::History;
pub use notify::{GameNotification, NotificationKind, Notifier};

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::combat::CombatView;
use crate::core::{EngineConfig, GameId, PlayerId, Result, RulesError, SubscriptionId};
use crate::events::{Event, EventType};
use crate::game::{Game, GameBuilder, GameState};
use crate::rules::{FreeMana, ManaPayment};

/// A complete game state, encodable with bincode.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: GameId,
    pub state: GameState,
}

impl GameSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Runs any number of independent games.
pub struct Engine {
    config: EngineConfig,
    games: RwLock<FxHashMap<GameId, Arc<RwLock<Game>>>>,
    next_id: AtomicU32,
    notifier: Notifier,
    payment: Arc<dyn ManaPayment>,
}

impl Engine {
    /// An engine where every cost is free.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_payment(config, Arc::new(FreeMana))
    }

    #[must_use]
    pub fn with_payment(config: EngineConfig, payment: Arc<dyn ManaPayment>) -> Self {
        Self {
            config,
            games: RwLock::new(FxHashMap::default()),
            next_id: AtomicU32::new(1),
            notifier: Notifier::new(),
            payment,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // === Registry ===

    /// Build and register a new game.
    pub fn create_game(&self, builder: GameBuilder) -> Result<GameId> {
        let mut state = builder.build(self.config.clone())?;
        let events = state.take_events();
        let id = self.insert(state)?;
        info!(game = %id, "game created");
        self.notifier
            .send(GameNotification::new(id, NotificationKind::GameCreated).with_events(events));
        Ok(id)
    }

    /// Register a game from a snapshot under a fresh id.
    pub fn import_snapshot(&self, snapshot: GameSnapshot) -> Result<GameId> {
        let id = self.insert(snapshot.state)?;
        info!(game = %id, from = %snapshot.game_id, "game imported");
        self.notifier.send(GameNotification::new(id, NotificationKind::GameCreated));
        Ok(id)
    }

    fn insert(&self, state: GameState) -> Result<GameId> {
        let id = GameId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let game = Game::new(id, state, Arc::clone(&self.payment));
        self.games
            .write()
            .map_err(|_| RulesError::LockPoisoned)?
            .insert(id, Arc::new(RwLock::new(game)));
        Ok(id)
    }

    /// Drop a game. Returns whether it existed.
    pub fn remove_game(&self, id: GameId) -> Result<bool> {
        let removed = self
            .games
            .write()
            .map_err(|_| RulesError::LockPoisoned)?
            .remove(&id)
            .is_some();
        if removed {
            debug!(game = %id, "game removed");
        }
        Ok(removed)
    }

    pub fn game_ids(&self) -> Result<Vec<GameId>> {
        let games = self.games.read().map_err(|_| RulesError::LockPoisoned)?;
        let mut ids = games.keys().copied().collect::<Vec<_>>();
        ids.sort_unstable();
        Ok(ids)
    }

    fn game(&self, id: GameId) -> Result<Arc<RwLock<Game>>> {
        let games = self.games.read().map_err(|_| RulesError::LockPoisoned)?;
        games.get(&id).cloned().ok_or(RulesError::GameNotFound(id))
    }

    /// Run a query under the game's read lock.
    pub fn with_game<R>(&self, id: GameId, f: impl FnOnce(&Game) -> R) -> Result<R> {
        let game = self.game(id)?;
        let guard = game.read().map_err(|_| RulesError::LockPoisoned)?;
        Ok(f(&*guard))
    }

    /// Run an edit under the game's write lock.
    ///
    /// Events the edit publishes are flushed before the lock is released
    /// and sent as a `StateChanged` notification.
    pub fn with_game_mut<R>(&self, id: GameId, f: impl FnOnce(&mut Game) -> R) -> Result<R> {
        let (value, events) = self.locked(id, |game| Ok(f(game)))?;
        self.notify_events(id, NotificationKind::StateChanged, None, events);
        Ok(value)
    }

    /// Write-lock a game, run `f` and flush. The lock is released on return.
    fn locked<R>(
        &self,
        id: GameId,
        f: impl FnOnce(&mut Game) -> Result<R>,
    ) -> Result<(R, Vec<Event>)> {
        let game = self.game(id)?;
        let mut guard = game.write().map_err(|_| RulesError::LockPoisoned)?;
        let value = f(&mut *guard);
        let events = guard.flush();
        value.map(|v| (v, events))
    }

    fn notify_events(
        &self,
        id: GameId,
        kind: NotificationKind,
        player: Option<PlayerId>,
        events: Vec<Event>,
    ) {
        if events.is_empty() && kind == NotificationKind::StateChanged {
            return;
        }
        let mut notification = GameNotification::new(id, kind).with_events(events);
        notification.player = player;
        self.notifier.send(notification);
    }

    // === Actions ===

    /// Apply a player action to a game.
    pub fn process_action(
        &self,
        id: GameId,
        player: PlayerId,
        action: PlayerAction,
    ) -> std::result::Result<ActionReport, ActionFailure> {
        let game = self.game(id)?;
        let outcome = {
            let mut guard = game.write().map_err(|_| RulesError::LockPoisoned)?;
            guard.process_action(player, &action)
        };
        self.notify_outcome(id, player, &outcome);
        outcome
    }

    /// The player concedes.
    pub fn concede(
        &self,
        id: GameId,
        player: PlayerId,
    ) -> std::result::Result<ActionReport, ActionFailure> {
        self.leave(id, player, "conceded")
    }

    /// The player ran out of time and concedes.
    pub fn timeout(
        &self,
        id: GameId,
        player: PlayerId,
    ) -> std::result::Result<ActionReport, ActionFailure> {
        self.leave(id, player, "timed out")
    }

    /// The player was idle too long and concedes.
    pub fn idle_timeout(
        &self,
        id: GameId,
        player: PlayerId,
    ) -> std::result::Result<ActionReport, ActionFailure> {
        self.leave(id, player, "was idle for too long")
    }

    fn leave(
        &self,
        id: GameId,
        player: PlayerId,
        reason: &str,
    ) -> std::result::Result<ActionReport, ActionFailure> {
        let game = self.game(id)?;
        let outcome = {
            let mut guard = game.write().map_err(|_| RulesError::LockPoisoned)?;
            guard.leave(player, reason)
        };
        self.notify_outcome(id, player, &outcome);
        outcome
    }

    fn notify_outcome(
        &self,
        id: GameId,
        player: PlayerId,
        outcome: &std::result::Result<ActionReport, ActionFailure>,
    ) {
        match outcome {
            Ok(report) => {
                let game_over = report.events.iter().any(|e| e.event_type == EventType::GameOver);
                self.notifier.send(
                    GameNotification::new(id, NotificationKind::ActionProcessed)
                        .with_player(player)
                        .with_events(report.events.clone()),
                );
                if game_over {
                    self.notifier.send(GameNotification::new(id, NotificationKind::GameOver));
                }
            }
            Err(failure) => self.notifier.send(
                GameNotification::new(id, NotificationKind::ActionFailed)
                    .with_player(player)
                    .with_message(failure.to_string()),
            ),
        }
    }

    // === Pause ===

    /// Stop accepting player actions for a game.
    pub fn pause_game(&self, id: GameId) -> Result<()> {
        self.locked(id, Game::pause)?;
        self.notifier.send(GameNotification::new(id, NotificationKind::GamePaused));
        Ok(())
    }

    pub fn resume_game(&self, id: GameId) -> Result<()> {
        self.locked(id, Game::resume)?;
        self.notifier.send(GameNotification::new(id, NotificationKind::GameResumed));
        Ok(())
    }

    pub fn is_paused(&self, id: GameId) -> Result<bool> {
        self.with_game(id, Game::is_paused)
    }

    // === Bookmarks and undo ===

    pub fn bookmark_state(&self, id: GameId) -> Result<u32> {
        self.with_game_mut(id, Game::bookmark_state)
    }

    pub fn restore_state(&self, id: GameId, bookmark: u32) -> Result<()> {
        let ((), events) = self.locked(id, |game| game.restore_state(bookmark))?;
        self.notify_events(id, NotificationKind::StateRestored, None, events);
        Ok(())
    }

    pub fn remove_bookmark(&self, id: GameId, bookmark: u32) -> Result<bool> {
        self.with_game_mut(id, |game| game.remove_bookmark(bookmark))
    }

    pub fn set_player_bookmark(&self, id: GameId, player: PlayerId) -> Result<u32> {
        self.locked(id, |game| game.set_player_bookmark(player)).map(|(b, _)| b)
    }

    pub fn reset_player_bookmark(&self, id: GameId, player: PlayerId) -> Result<()> {
        self.locked(id, |game| game.reset_player_bookmark(player)).map(drop)
    }

    pub fn undo(&self, id: GameId, player: PlayerId) -> Result<()> {
        let ((), events) = self.locked(id, |game| game.undo(player))?;
        self.notify_events(id, NotificationKind::StateRestored, Some(player), events);
        Ok(())
    }

    pub fn can_rollback_turns(&self, id: GameId, turns: u32) -> Result<bool> {
        self.with_game(id, |game| game.can_rollback_turns(turns))
    }

    pub fn rollback_turns(&self, id: GameId, turns: u32) -> Result<()> {
        let ((), events) = self.locked(id, |game| game.rollback_turns(turns))?;
        self.notify_events(id, NotificationKind::StateRestored, None, events);
        Ok(())
    }

    // === Queries ===

    pub fn combat_view(&self, id: GameId) -> Result<CombatView> {
        self.with_game(id, Game::combat_view)
    }

    /// Encode the whole state of a game.
    pub fn encode_snapshot(&self, id: GameId) -> Result<Vec<u8>> {
        let snapshot = self.with_game(id, |game| GameSnapshot {
            game_id: id,
            state: game.state.clone(),
        })?;
        snapshot.encode()
    }

    pub fn decode_snapshot(bytes: &[u8]) -> Result<GameSnapshot> {
        GameSnapshot::decode(bytes)
    }

    // === Subscribers ===

    /// Subscribe to every event of one game.
    pub fn subscribe(
        &self,
        id: GameId,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Result<SubscriptionId> {
        self.with_game_mut(id, |game| game.subscribe(handler))
    }

    pub fn subscribe_typed(
        &self,
        id: GameId,
        event_type: EventType,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Result<SubscriptionId> {
        self.with_game_mut(id, |game| game.subscribe_typed(event_type, handler))
    }

    pub fn unsubscribe(&self, id: GameId, subscription: SubscriptionId) -> Result<bool> {
        self.with_game_mut(id, |game| game.unsubscribe(subscription))
    }

    /// Claim the notification receiver for async consumption.
    pub fn notifications(&self) -> Option<mpsc::UnboundedReceiver<GameNotification>> {
        self.notifier.take_receiver()
    }

    /// Handle notifications on a dedicated thread.
    ///
    /// Returns `None` if the receiver was already claimed.
    pub fn set_notification_handler(
        &self,
        handler: impl FnMut(GameNotification) + Send + 'static,
    ) -> Option<JoinHandle<()>> {
        self.notifier.spawn_handler(handler)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let games = self.games.read().map(|g| g.len()).unwrap_or_default();
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("games", &games)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::IllegalAction;
    use crate::zones::CardSpec;

    fn engine_with_game() -> (Engine, GameId) {
        let engine = Engine::new(EngineConfig::default());
        let deck = vec![CardSpec::creature("Bear", 2, 2); 15];
        let id = engine
            .create_game(GameBuilder::new().player("Alice", deck.clone()).player("Bob", deck))
            .unwrap();
        (engine, id)
    }

    #[test]
    fn test_unknown_game() {
        let engine = Engine::default();
        let failure = engine
            .process_action(GameId::new(99), PlayerId::new(0), PlayerAction::Pass)
            .unwrap_err();
        assert!(matches!(failure.error, RulesError::GameNotFound(_)));
        assert!(!failure.state_restored);
    }

    #[test]
    fn test_created_game_notifies() {
        let engine = Engine::new(EngineConfig::default());
        let mut rx = engine.notifications().unwrap();
        let deck = vec![CardSpec::creature("Bear", 2, 2); 15];
        let id = engine
            .create_game(GameBuilder::new().player("Alice", deck.clone()).player("Bob", deck))
            .unwrap();
        let created = rx.try_recv().unwrap();
        assert_eq!(created.game_id, id);
        assert_eq!(created.kind, NotificationKind::GameCreated);
        assert!(!created.events.is_empty());
    }

    #[test]
    fn test_failed_action_notifies() {
        let (engine, id) = engine_with_game();
        let mut rx = engine.notifications().unwrap();

        let failure = engine
            .process_action(id, PlayerId::new(1), PlayerAction::Pass)
            .unwrap_err();
        assert!(matches!(failure.error, RulesError::Illegal(IllegalAction::NoPriority(_))));

        let note = rx.try_recv().unwrap();
        assert_eq!(note.kind, NotificationKind::ActionFailed);
        assert_eq!(note.player, Some(PlayerId::new(1)));
        assert!(note.message.unwrap().contains("state restored: true"));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (engine, id) = engine_with_game();
        let bytes = engine.encode_snapshot(id).unwrap();
        let snapshot = Engine::decode_snapshot(&bytes).unwrap();
        assert_eq!(snapshot.game_id, id);

        let copy = engine.import_snapshot(snapshot).unwrap();
        assert_ne!(copy, id);
        let turn = engine.with_game(copy, |g| g.state.turn.turn).unwrap();
        assert_eq!(turn, 1);
        assert_eq!(engine.game_ids().unwrap(), vec![id, copy]);
    }

    #[test]
    fn test_pause_notifies() {
        let (engine, id) = engine_with_game();
        let mut rx = engine.notifications().unwrap();

        engine.pause_game(id).unwrap();
        assert!(engine.is_paused(id).unwrap());
        assert!(matches!(engine.pause_game(id), Err(RulesError::AlreadyPaused)));
        engine.resume_game(id).unwrap();
        assert!(!engine.is_paused(id).unwrap());

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::GamePaused, NotificationKind::GameResumed]);
    }

    #[test]
    fn test_remove_game() {
        let (engine, id) = engine_with_game();
        assert!(engine.remove_game(id).unwrap());
        assert!(!engine.remove_game(id).unwrap());
        assert!(matches!(engine.combat_view(id), Err(RulesError::GameNotFound(_))));
    }
}
