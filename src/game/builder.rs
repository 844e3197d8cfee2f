//! Setting up a new game.

use tracing::debug;

use super::state::GameState;
use crate::core::{EngineConfig, PlayerId, Result};
use crate::zones::{CardSpec, Zone};

/// Players, decks and starting permanents for a new game.
///
/// ```
/// use mtg_rules::core::EngineConfig;
/// use mtg_rules::game::GameBuilder;
/// use mtg_rules::core::PlayerId;
/// use mtg_rules::zones::{CardSpec, Zone};
///
/// let deck = vec![CardSpec::creature("Bear", 2, 2); 20];
/// let state = GameBuilder::new()
///     .player("Alice", deck.clone())
///     .player("Bob", deck)
///     .seed(42)
///     .build(EngineConfig::default())
///     .unwrap();
///
/// assert_eq!(state.turn.turn, 1);
/// assert_eq!(state.objects.zone_size(Zone::Hand, PlayerId::new(0)), 7);
/// ```
#[derive(Clone, Debug, Default)]
pub struct GameBuilder {
    players: Vec<(String, Vec<CardSpec>)>,
    battlefield: Vec<(usize, CardSpec)>,
    seed: u64,
    shuffle: bool,
    mulligan: bool,
}

impl GameBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shuffle: true,
            ..Self::default()
        }
    }

    /// Add a player with a deck, top card first.
    #[must_use]
    pub fn player(mut self, name: impl Into<String>, deck: Vec<CardSpec>) -> Self {
        self.players.push((name.into(), deck));
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Keep libraries in deck order.
    #[must_use]
    pub fn without_shuffle(mut self) -> Self {
        self.shuffle = false;
        self
    }

    /// Let players mulligan before the first turn.
    ///
    /// The built game waits for every player to keep their hand; turn 1
    /// begins after the last one does.
    #[must_use]
    pub fn with_mulligan(mut self) -> Self {
        self.mulligan = true;
        self
    }

    /// Put a permanent onto the battlefield before the game starts.
    #[must_use]
    pub fn battlefield(mut self, player: PlayerId, spec: CardSpec) -> Self {
        self.battlefield.push((player.index(), spec));
        self
    }

    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Create the state, deal opening hands and run to the first priority,
    /// or open the mulligan if it was asked for.
    pub fn build(self, config: EngineConfig) -> Result<GameState> {
        let names = self.players.iter().map(|(name, _)| name.clone()).collect::<Vec<_>>();
        let hand_size = config.opening_hand_size;
        let mut state = GameState::new(config, names, self.seed);

        for (index, (_, deck)) in self.players.into_iter().enumerate() {
            let owner = PlayerId::new(index as u8);
            // Created bottom-up so the first card of the deck ends on top.
            for spec in deck.into_iter().rev() {
                state.create_object(spec, owner, Zone::Library);
            }
            if self.shuffle {
                state.objects.shuffle_library(owner, &mut state.rng);
            }
        }
        for (index, spec) in self.battlefield {
            let owner = PlayerId::new(index as u8);
            state.player(owner)?;
            let id = state.create_object(spec, owner, Zone::Battlefield);
            debug!(%owner, object = %id, "starting permanent");
        }

        for player in state.players.player_ids().collect::<Vec<_>>() {
            state.draw(player, hand_size as u32)?;
        }
        state.take_events();
        state.watchers.reset_all();
        if self.mulligan {
            state.start_mulligan()?;
        } else {
            state.start()?;
        }
        Ok(state)
    }
}
