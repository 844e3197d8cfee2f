//! Core engine types: ids, players, configuration, errors, RNG.
//!
//! Everything here is shared by every other module and depends on nothing
//! game-specific.

pub mod ids;
pub mod player;
pub mod rng;
pub mod config;
pub mod error;

pub use ids::{EffectId, GameId, ObjectId, StackItemId, SubscriptionId, Target, TriggerId};
pub use player::{Player, PlayerId, PlayerMap};
pub use rng::{GameRng, GameRngState};
pub use config::EngineConfig;
pub use error::{IllegalAction, Result, RulesError};
