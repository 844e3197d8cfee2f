//! Players and per-player storage.
//!
//! ## PlayerId
//!
//! Seat index, 0-based. Turn order is seat order.
//!
//! ## Player
//!
//! Life, poison, energy and the priority/pass/loss flags the state machine
//! reads. A player who has lost or left is never eligible for priority and
//! always counts as passed.
//!
//! ## PlayerMap
//!
//! `Vec`-backed storage with one entry per seat, indexable by `PlayerId`.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Player identifier supporting 1-255 players.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// Create a new player ID.
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Get the raw player index (0-based).
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Iterate over all player IDs for a game with `player_count` players.
    pub fn all(player_count: usize) -> impl Iterator<Item = PlayerId> {
        (0..player_count as u8).map(PlayerId)
    }

    /// The seat after this one, wrapping around.
    #[must_use]
    pub fn next(self, player_count: usize) -> PlayerId {
        PlayerId(((self.index() + 1) % player_count) as u8)
    }

    /// Active player first, then the rest in turn order.
    ///
    /// ```
    /// use mtg_rules::core::PlayerId;
    ///
    /// let order: Vec<_> = PlayerId::apnap(PlayerId::new(2), 4).collect();
    /// assert_eq!(order, vec![PlayerId(2), PlayerId(3), PlayerId(0), PlayerId(1)]);
    /// ```
    pub fn apnap(active: PlayerId, player_count: usize) -> impl Iterator<Item = PlayerId> {
        (0..player_count)
            .map(move |offset| PlayerId(((active.index() + offset) % player_count) as u8))
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Player {}", self.0)
    }
}

/// Per-player game data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub life: i32,
    pub poison: i32,
    pub energy: i32,

    // === Priority ===
    pub has_priority: bool,
    pub passed: bool,

    // === Leaving the game ===
    pub lost: bool,
    pub left: bool,
    pub conceded: bool,
    pub won: bool,

    /// Set when a draw was attempted from an empty library.
    pub drew_from_empty_library: bool,

    /// Bookmark this player can undo to, if any.
    pub stored_bookmark: Option<u32>,

    // === Mulligan ===
    pub mulligans: u32,
    pub kept_hand: bool,
}

impl Player {
    /// Create a player with the given starting life.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>, life: i32) -> Self {
        Self {
            id,
            name: name.into(),
            life,
            poison: 0,
            energy: 0,
            has_priority: false,
            passed: false,
            lost: false,
            left: false,
            conceded: false,
            won: false,
            drew_from_empty_library: false,
            stored_bookmark: None,
            mulligans: 0,
            kept_hand: false,
        }
    }

    /// Still able to take actions and receive priority.
    #[must_use]
    pub fn can_respond(&self) -> bool {
        !self.lost && !self.left
    }
}

/// Per-player data storage with O(1) access.
///
/// ```
/// use mtg_rules::core::{PlayerId, PlayerMap};
///
/// let mut poison: PlayerMap<i32> = PlayerMap::new(4, |_| 0);
/// poison[PlayerId::new(1)] += 3;
/// assert_eq!(poison[PlayerId::new(1)], 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerMap<T> {
    data: Vec<T>,
}

impl<T> PlayerMap<T> {
    /// Create a new PlayerMap with values from a factory function.
    pub fn new(player_count: usize, factory: impl Fn(PlayerId) -> T) -> Self {
        assert!(player_count > 0, "Must have at least 1 player");
        assert!(player_count <= 255, "At most 255 players supported");

        let data = (0..player_count as u8).map(|i| factory(PlayerId(i))).collect();

        Self { data }
    }

    /// Get the number of players.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.data.len()
    }

    /// Get a player's data, or `None` for an unknown seat.
    #[must_use]
    pub fn get(&self, player: PlayerId) -> Option<&T> {
        self.data.get(player.index())
    }

    /// Mutable access to a player's data, or `None` for an unknown seat.
    pub fn get_mut(&mut self, player: PlayerId) -> Option<&mut T> {
        self.data.get_mut(player.index())
    }

    /// Iterate over (PlayerId, &T) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &T)> {
        self.data.iter().enumerate().map(|(i, v)| (PlayerId(i as u8), v))
    }

    /// Iterate over (PlayerId, &mut T) pairs.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PlayerId, &mut T)> {
        self.data.iter_mut().enumerate().map(|(i, v)| (PlayerId(i as u8), v))
    }

    /// Iterate over all values in seat order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    /// Iterate mutably over all values in seat order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.data.iter_mut()
    }

    /// Iterate over all player IDs.
    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> {
        (0..self.data.len() as u8).map(PlayerId)
    }
}

impl<T> Index<PlayerId> for PlayerMap<T> {
    type Output = T;

    fn index(&self, player: PlayerId) -> &Self::Output {
        &self.data[player.index()]
    }
}

impl<T> IndexMut<PlayerId> for PlayerMap<T> {
    fn index_mut(&mut self, player: PlayerId) -> &mut Self::Output {
        &mut self.data[player.index()]
    }
}
