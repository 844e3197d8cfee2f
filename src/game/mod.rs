//! One running game: state, subscribers and saved history.
//!
//! ## Key Types
//!
//! - `GameState`: everything the rules read and write, cheap to clone
//! - `Game`: a `GameState` plus its event bus, bookmarks and turn snapshots
//! - `GameBuilder`: decks, seed and opening hands for a new game
//!
//! Every action goes through [`Game::process_action`], which bookmarks the
//! state first. A failed action puts the bookmark back, so a rejected
//! action leaves no trace besides a log line. A successful one keeps the
//! bookmark as the acting player's undo point, replacing their previous one.

mod builder;
mod mulligan;
mod priority;
mod resolve;
mod sba;
mod state;
mod steps;

pub use builder::GameBuilder;
pub use state::GameState;

use std::sync::Arc;

use tracing::{info, warn};

use crate::combat::CombatView;
use crate::core::{GameId, IllegalAction, PlayerId, Result, RulesError, SubscriptionId};
use crate::engine::{ActionFailure, ActionReport, History, PlayerAction};
use crate::events::{Event, EventBus, EventType};
use crate::rules::ManaPayment;

/// A game and everything kept alongside it.
pub struct Game {
    id: GameId,
    pub state: GameState,
    pub bus: EventBus,
    history: History,
    payment: Arc<dyn ManaPayment>,
    paused: bool,
}

impl Game {
    /// Wrap a built state and take its first turn snapshot.
    ///
    /// Events still pending in `state` are flushed to the new, empty bus;
    /// take them beforehand to keep them.
    pub fn new(id: GameId, state: GameState, payment: Arc<dyn ManaPayment>) -> Self {
        let keep = state.config.rollback_turns;
        let mut game = Self {
            id,
            state,
            bus: EventBus::new(),
            history: History::new(keep),
            payment,
            paused: false,
        };
        game.prune_undo_points();
        game.flush();
        game
    }

    #[must_use]
    pub fn id(&self) -> GameId {
        self.id
    }

    // === Actions ===

    /// Apply one player action, restoring the previous state if it fails.
    pub fn process_action(
        &mut self,
        player: PlayerId,
        action: &PlayerAction,
    ) -> std::result::Result<ActionReport, ActionFailure> {
        if self.state.is_over() {
            return Err(RulesError::GameOver.into());
        }
        if self.paused {
            return Err(RulesError::Paused.into());
        }
        let bookmark = self.history.bookmark(&self.state);

        match action.apply(&mut self.state, player, self.payment.as_ref()) {
            Ok(()) => {
                self.keep_undo_point(player, bookmark);
                let events = self.flush();
                Ok(ActionReport {
                    player,
                    events,
                    priority: self.state.turn.priority,
                    result: self.state.result,
                })
            }
            Err(error) => {
                let state_restored = match self.history.restore(bookmark) {
                    Ok(state) => {
                        self.state = state;
                        true
                    }
                    Err(_) => false,
                };
                warn!(
                    game = %self.id,
                    %player,
                    action = action.name(),
                    %error,
                    state_restored,
                    "action failed"
                );
                if state_restored {
                    self.state.log(format!("action failed and state restored: {error}"));
                }
                self.flush();
                Err(ActionFailure { error, state_restored })
            }
        }
    }

    /// Concede on behalf of a player, recording why.
    pub fn leave(
        &mut self,
        player: PlayerId,
        reason: &str,
    ) -> std::result::Result<ActionReport, ActionFailure> {
        if self.paused {
            return Err(RulesError::Paused.into());
        }
        if self.state.player(player).is_ok_and(|p| p.can_respond()) {
            let name = self.state.players[player].name.clone();
            self.state.log(format!("{name} {reason}"));
        }
        self.process_action(player, &PlayerAction::Concede)
    }

    /// Hand pending events to bus subscribers and snapshot a new turn.
    pub fn flush(&mut self) -> Vec<Event> {
        let events = self.state.take_events();
        for event in &events {
            self.bus.publish(event);
        }
        let turn = self.state.turn.turn;
        let new_turn = turn > 0 && self.history.latest_turn().map_or(true, |latest| turn > latest);
        if self.state.config.rollback_allowed && new_turn {
            self.history.save_turn(turn, &self.state);
        }
        events
    }

    // === Pause ===

    /// Stop accepting player actions until [`resume`](Self::resume).
    pub fn pause(&mut self) -> Result<()> {
        self.state.ensure_running()?;
        if self.paused {
            return Err(RulesError::AlreadyPaused);
        }
        self.paused = true;
        info!(game = %self.id, "game paused");
        self.state.log("Game paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if !self.paused {
            return Err(RulesError::NotPaused);
        }
        self.paused = false;
        info!(game = %self.id, "game resumed");
        self.state.log("Game resumed");
        Ok(())
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // === Bookmarks ===

    /// Save the current state. Returns the bookmark number.
    pub fn bookmark_state(&mut self) -> u32 {
        self.history.bookmark(&self.state)
    }

    /// Go back to a bookmark, dropping it and every newer one.
    ///
    /// Like every direct edit, the `StateRestored` event waits for the
    /// next [`flush`](Self::flush).
    pub fn restore_state(&mut self, bookmark: u32) -> Result<()> {
        self.state = self.history.restore(bookmark)?;
        self.prune_undo_points();
        info!(game = %self.id, bookmark, "state restored");
        self.state.log(format!("state restored to bookmark {bookmark}"));
        self.state.publish(Event::new(EventType::StateRestored).with_amount(bookmark as i32));
        Ok(())
    }

    /// Forget a bookmark, and any undo point that named it.
    pub fn remove_bookmark(&mut self, bookmark: u32) -> bool {
        let removed = self.history.remove(bookmark);
        self.prune_undo_points();
        removed
    }

    #[must_use]
    pub fn bookmark_count(&self) -> usize {
        self.history.bookmark_count()
    }

    /// Bookmark the state as the point `player` can undo to.
    ///
    /// Any earlier undo point of that player is forgotten.
    pub fn set_player_bookmark(&mut self, player: PlayerId) -> Result<u32> {
        if let Some(previous) = self.state.player_mut(player)?.stored_bookmark.take() {
            self.history.remove(previous);
        }
        let bookmark = self.history.bookmark(&self.state);
        self.state.players[player].stored_bookmark = Some(bookmark);
        Ok(bookmark)
    }

    /// Forget the undo point of `player`.
    pub fn reset_player_bookmark(&mut self, player: PlayerId) -> Result<()> {
        if let Some(previous) = self.state.player_mut(player)?.stored_bookmark.take() {
            self.history.remove(previous);
        }
        Ok(())
    }

    /// Return to the undo point of `player`.
    pub fn undo(&mut self, player: PlayerId) -> Result<()> {
        let bookmark = self
            .state
            .player(player)?
            .stored_bookmark
            .ok_or(IllegalAction::NoUndo(player))?;
        self.state = self.history.restore(bookmark)?;
        self.state.players[player].stored_bookmark = None;
        self.prune_undo_points();
        info!(game = %self.id, %player, bookmark, "undo");
        let name = self.state.players[player].name.clone();
        self.state.log(format!("{name} undid their last action"));
        self.state.publish(
            Event::for_player(EventType::StateRestored, player).with_amount(bookmark as i32),
        );
        Ok(())
    }

    /// Make the pre-action `bookmark` the undo point of `player`.
    ///
    /// A player who is out of the game gets none.
    fn keep_undo_point(&mut self, player: PlayerId, bookmark: u32) {
        match self.state.player_mut(player) {
            Ok(acting) if acting.can_respond() => {
                if let Some(previous) = acting.stored_bookmark.replace(bookmark) {
                    self.history.remove(previous);
                }
            }
            _ => {
                self.history.remove(bookmark);
            }
        }
    }

    /// Forget undo points whose bookmark no longer exists.
    ///
    /// A restored state still names the bookmarks its players held when it
    /// was saved, some of which may be gone since.
    fn prune_undo_points(&mut self) {
        let history = &self.history;
        for player in self.state.players.values_mut() {
            if player.stored_bookmark.is_some_and(|b| !history.has_bookmark(b)) {
                player.stored_bookmark = None;
            }
        }
    }

    // === Turn rollback ===

    fn rollback_target(&self, turns: u32) -> Result<u32> {
        if !self.state.config.rollback_allowed {
            return Err(RulesError::RollbackDisabled);
        }
        let target = i64::from(self.state.turn.turn) - i64::from(turns);
        u32::try_from(target)
            .ok()
            .filter(|&t| t >= 1)
            .ok_or_else(|| IllegalAction::RollbackTooFar(target).into())
    }

    /// Whether the start of the turn `turns` turns ago is still held.
    #[must_use]
    pub fn can_rollback_turns(&self, turns: u32) -> bool {
        self.rollback_target(turns).is_ok_and(|target| self.history.has_turn(target))
    }

    /// Go back to the start of the turn `turns` turns ago.
    ///
    /// Every action bookmark and every player undo point is dropped.
    pub fn rollback_turns(&mut self, turns: u32) -> Result<()> {
        let target = self.rollback_target(turns)?;
        let mut state = self.history.rollback_to(target)?;
        self.history.clear_bookmarks();
        for player in state.players.values_mut() {
            player.stored_bookmark = None;
        }
        self.history.save_turn(target, &state);
        self.state = state;
        info!(game = %self.id, turn = target, "rolled back");
        self.state.log(format!("game rolled back to the start of turn {target}"));
        self.state.publish(
            Event::new(EventType::StateRestored)
                .with_amount(target as i32)
                .with_meta("rollback", "turn"),
        );
        Ok(())
    }

    // === Queries and subscribers ===

    #[must_use]
    pub fn combat_view(&self) -> CombatView {
        self.state.combat_view()
    }

    pub fn subscribe(
        &mut self,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.bus.subscribe(handler)
    }

    pub fn subscribe_typed(
        &mut self,
        event_type: EventType,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.bus.subscribe_typed(event_type, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("id", &self.id)
            .field("turn", &self.state.turn.turn)
            .field("step", &self.state.turn.step)
            .field("paused", &self.paused)
            .field("bookmarks", &self.history.bookmark_count())
            .field("turn_snapshots", &self.history.turn_count())
            .finish_non_exhaustive()
    }
}
