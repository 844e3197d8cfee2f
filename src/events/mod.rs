//! Event bus, watchers and triggered abilities.
//!
//! ## Key Types
//!
//! - `Event`: one thing that happened, with its applied replacement set
//! - `EventBus`: synchronous subscribers outside the game state
//! - `WatcherRegistry`: per-turn counters that live in the game state
//! - `TriggerRegistry`: triggered abilities that queue `PendingTrigger`s
//!
//! Publishing order inside one game is the order operations happen.
//! Watchers and triggers see an event as soon as it is published; bus
//! subscribers see it when the game flushes its outbox at the end of the
//! operation, still in the same order.

pub mod bus;
pub mod event;
pub mod triggers;
pub mod watchers;

pub use bus::EventBus;
pub use event::{Event, EventType};
pub use triggers::{
    PendingTrigger, TriggerCondition, TriggerRegistry, TriggerTargets, TriggeredAbility,
};
pub use watchers::{Watcher, WatcherKind, WatcherRegistry, WatcherScope};
