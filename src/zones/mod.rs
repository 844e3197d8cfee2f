//! Zone & object store.
//!
//! ## Key Types
//!
//! - `Zone`: the seven zones, with per-player library/hand/graveyard
//! - `GameObject`: a card or permanent with its base characteristics
//! - `CardSpec`: printed characteristics used to create objects
//! - `ObjectStore`: arena of objects plus ordered zone contents
//!
//! An object is in exactly one zone at a time. Moving zones keeps its owner
//! and identity and resets everything else that is zone-bound.

pub mod zone;
pub mod object;
pub mod store;

pub use zone::{Zone, ZonePosition};
pub use object::{ActivatedAbility, CardSpec, CardType, Color, CounterKind, GameObject, Keyword};
pub use store::ObjectStore;
