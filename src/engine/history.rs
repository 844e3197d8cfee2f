//! Bookmarks and turn snapshots.
//!
//! ## Bookmarks
//!
//! A bookmark is a copy of the game state taken before an action (or on
//! request). They are numbered from 1 and a number is never handed out
//! twice, so a stale number can only miss. Restoring a bookmark drops it
//! and every newer one; removing one forgets only that one.
//!
//! ## Turn Snapshots
//!
//! One snapshot per turn, taken the first time the engine sees the turn.
//! Only the most recent `keep` turns are retained.

use std::collections::{BTreeMap, VecDeque};

use crate::core::{Result, RulesError};
use crate::game::GameState;

/// Saved states of one game.
#[derive(Clone, Debug, Default)]
pub struct History {
    bookmarks: BTreeMap<u32, GameState>,
    last_bookmark: u32,
    turns: VecDeque<(u32, GameState)>,
    keep: u32,
}

impl History {
    /// History retaining `keep` turn snapshots.
    #[must_use]
    pub fn new(keep: u32) -> Self {
        Self {
            keep,
            ..Self::default()
        }
    }

    // === Bookmarks ===

    /// Save a copy of `state`. Returns the bookmark number.
    pub fn bookmark(&mut self, state: &GameState) -> u32 {
        self.last_bookmark += 1;
        self.bookmarks.insert(self.last_bookmark, state.clone());
        self.last_bookmark
    }

    /// Take a bookmarked state back, dropping it and every newer bookmark.
    pub fn restore(&mut self, id: u32) -> Result<GameState> {
        let state = self.bookmarks.remove(&id).ok_or(RulesError::BookmarkNotFound(id))?;
        self.bookmarks.split_off(&id);
        Ok(state)
    }

    /// Forget a bookmark. Returns whether it existed.
    pub fn remove(&mut self, id: u32) -> bool {
        self.bookmarks.remove(&id).is_some()
    }

    #[must_use]
    pub fn has_bookmark(&self, id: u32) -> bool {
        self.bookmarks.contains_key(&id)
    }

    /// Number of live bookmarks.
    #[must_use]
    pub fn bookmark_count(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn clear_bookmarks(&mut self) {
        self.bookmarks.clear();
    }

    // === Turn snapshots ===

    /// The latest turn with a snapshot.
    #[must_use]
    pub fn latest_turn(&self) -> Option<u32> {
        self.turns.back().map(|(turn, _)| *turn)
    }

    /// Save the snapshot for `turn`, evicting the oldest beyond the window.
    pub fn save_turn(&mut self, turn: u32, state: &GameState) {
        if self.latest_turn().is_some_and(|latest| latest >= turn) {
            return;
        }
        self.turns.push_back((turn, state.clone()));
        while self.turns.len() > self.keep as usize {
            self.turns.pop_front();
        }
    }

    /// Whether a snapshot for `turn` is still held.
    #[must_use]
    pub fn has_turn(&self, turn: u32) -> bool {
        self.turns.iter().any(|(t, _)| *t == turn)
    }

    /// Take the snapshot for `turn`, dropping it and every later one.
    pub fn rollback_to(&mut self, turn: u32) -> Result<GameState> {
        let index = self
            .turns
            .iter()
            .position(|(t, _)| *t == turn)
            .ok_or(RulesError::TurnSnapshotNotFound(turn))?;
        let state = self.turns.drain(index..).next().map(|(_, s)| s);
        state.ok_or(RulesError::TurnSnapshotNotFound(turn))
    }

    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }
}
