//! Turn structure, game results and the cost-payment seam.
//!
//! The engine never interprets mana. Costs are strings handed to a
//! [`ManaPayment`] implementation supplied by the embedding application;
//! [`FreeMana`] accepts everything.

mod turn;

pub use turn::{Phase, Step, TurnManager};

use serde::{Deserialize, Serialize};

use crate::core::PlayerId;

/// Result of a completed game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    /// Single winner.
    Winner(PlayerId),
    /// Nobody is left.
    Draw,
}

impl GameResult {
    /// Check if a player won.
    #[must_use]
    pub fn is_winner(&self, player: PlayerId) -> bool {
        matches!(self, GameResult::Winner(p) if *p == player)
    }
}

/// Decides whether a player can pay a cost, and pays it.
///
/// Implementations must be deterministic: a rejected payment aborts the
/// action and the game state is restored.
pub trait ManaPayment: Send + Sync {
    /// Pay `cost` for `player`. Returns `false` if it cannot be paid.
    fn pay(&self, player: PlayerId, cost: &str) -> bool;
}

/// Every cost is free.
#[derive(Clone, Copy, Debug, Default)]
pub struct FreeMana;

impl ManaPayment for FreeMana {
    fn pay(&self, _player: PlayerId, _cost: &str) -> bool {
        true
    }
}
