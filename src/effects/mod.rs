//! Continuous effects engine.
//!
//! Two kinds of effect change how the game plays out:
//! - `ContinuousEffect`: modifies characteristics through the seven layers
//! - `ReplacementEffect`: rewrites an event before it happens, including
//!   damage prevention shields
//!
//! ## Key Types
//!
//! - `LayerSystem`: computes a `Characteristics` snapshot for an object
//! - `ReplacementEngine`: applies replacement effects to one event
//! - `EffectRegistry`: both of the above with a shared id space
//! - `Duration` / `CleanupPass`: when effects end
//!
//! ```
//! use mtg_rules::core::PlayerId;
//! use mtg_rules::effects::{ContinuousEffect, EffectRegistry};
//! use mtg_rules::zones::{CardSpec, ObjectStore, Zone};
//!
//! let p0 = PlayerId::new(0);
//! let mut store = ObjectStore::new(2);
//! let bear = store.create(CardSpec::creature("Bear", 2, 2), p0, Zone::Battlefield);
//! let lord = store.create(CardSpec::creature("Lord", 1, 1), p0, Zone::Battlefield);
//!
//! let mut effects = EffectRegistry::new(100);
//! effects.add_continuous(ContinuousEffect::anthem(lord, p0, 1, 1, false));
//!
//! let snapshot = effects.characteristics(bear, &store).unwrap();
//! assert_eq!(snapshot.power, Some(3));
//! ```

mod duration;
mod layers;
mod registry;
mod replacement;

pub use duration::{CleanupPass, Duration};
pub use layers::{
    AffectedObjects, Characteristics, ContinuousEffect, ContinuousKind, Layer, LayerSystem,
};
pub use registry::EffectRegistry;
pub use replacement::{
    ReplacementEffect, ReplacementEngine, ReplacementKind, ReplacementOutcome, ReplacementStats,
};
