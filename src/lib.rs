//! # mtg-rules
//!
//! A per-game rules engine for Magic-style trading card games.
//!
//! ## Design Principles
//!
//! 1. **Snapshots, not mutation**: continuous effects never touch stored
//!    objects. Rules checks read a `Characteristics` snapshot computed
//!    through the seven layers.
//!
//! 2. **Events in their final form**: replacement and prevention effects
//!    rewrite an event before it happens. Watchers, triggers and
//!    subscribers only ever see the result.
//!
//! 3. **N-Player First**: priority, triggers and game over work for any
//!    number of players in APNAP order.
//!
//! 4. **Cheap history**: state uses persistent data structures via `im`,
//!    so every action is bookmarked and undone on failure.
//!
//! ## Modules
//!
//! - `core`: ids, players, configuration, errors, RNG
//! - `zones`: the object arena and per-zone ordering
//! - `effects`: layers, replacement and prevention, durations
//! - `events`: events, the in-game bus, watchers and triggered abilities
//! - `stack`: stack items, spell effects and target legality
//! - `rules`: turn structure and the cost-payment seam
//! - `game`: the game state, priority, resolution and state-based actions
//! - `combat`: declarations and combat damage
//! - `engine`: the multi-game registry, action API and notifications

pub mod core;
pub mod zones;
pub mod effects;
pub mod events;
pub mod stack;
pub mod rules;
pub mod game;
pub mod combat;
pub mod engine;

// Re-export commonly used types
pub use crate::core::{
    EngineConfig, GameId, IllegalAction, ObjectId, Player, PlayerId, PlayerMap, Result, RulesError,
    StackItemId, Target,
};

pub use crate::zones::{CardSpec, CardType, Keyword, ObjectStore, Zone};

pub use crate::effects::{Characteristics, ContinuousEffect, EffectRegistry, ReplacementEffect};

pub use crate::events::{Event, EventBus, EventType, TriggeredAbility};

pub use crate::stack::{SpellEffect, SpellStack, StackItem};

pub use crate::rules::{FreeMana, GameResult, ManaPayment, Phase, Step};

pub use crate::game::{Game, GameBuilder, GameState};

pub use crate::combat::{CombatGroup, CombatView};

pub use crate::engine::{
    ActionFailure, ActionReport, Engine, GameNotification, GameSnapshot, NotificationKind,
    PlayerAction,
};
