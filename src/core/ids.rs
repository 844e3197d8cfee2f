//! Identifier newtypes.
//!
//! Every kind of thing the engine hands out a handle for has its own id type,
//! so an `ObjectId` can never be passed where a `StackItemId` is expected.
//!
//! ## ID Allocation
//!
//! Ids are small integers allocated sequentially by the store that owns the
//! thing (object arena, stack, effect registries). They are never reused
//! within a game, which lets the object arena index directly by id.
//!
//! ```
//! use mtg_rules::core::{ObjectId, StackItemId};
//!
//! let card = ObjectId::new(7);
//! assert_eq!(card.raw(), 7);
//! assert_eq!(format!("{}", card), "Object(7)");
//!
//! let item = StackItemId::new(1);
//! assert_eq!(format!("{}", item), "StackItem(1)");
//! ```

use serde::{Deserialize, Serialize};

use super::player::PlayerId;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            #[doc = concat!("Create a new `", stringify!($name), "`.")]
            #[must_use]
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            /// Get the raw ID value.
            #[must_use]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Index into an arena keyed by this id.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }
    };
}

define_id!(
    /// A card, token or permanent tracked by the object store.
    ObjectId,
    "Object"
);

define_id!(
    /// A spell or ability on the stack.
    StackItemId,
    "StackItem"
);

define_id!(
    /// A continuous or replacement effect registered with a game.
    EffectId,
    "Effect"
);

define_id!(
    /// A triggered ability registered with a game.
    TriggerId,
    "Trigger"
);

define_id!(
    /// A game hosted by an [`Engine`](crate::engine::Engine).
    GameId,
    "Game"
);

define_id!(
    /// An in-game event bus subscription.
    SubscriptionId,
    "Subscription"
);

/// Anything an effect, event or stack item can point at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Player(PlayerId),
    Object(ObjectId),
    StackItem(StackItemId),
}

impl Target {
    /// The player, if this targets one.
    #[must_use]
    pub fn as_player(self) -> Option<PlayerId> {
        match self {
            Target::Player(p) => Some(p),
            _ => None,
        }
    }

    /// The object, if this targets one.
    #[must_use]
    pub fn as_object(self) -> Option<ObjectId> {
        match self {
            Target::Object(o) => Some(o),
            _ => None,
        }
    }

    /// The stack item, if this targets one.
    #[must_use]
    pub fn as_stack_item(self) -> Option<StackItemId> {
        match self {
            Target::StackItem(s) => Some(s),
            _ => None,
        }
    }
}

impl From<PlayerId> for Target {
    fn from(player: PlayerId) -> Self {
        Target::Player(player)
    }
}

impl From<ObjectId> for Target {
    fn from(object: ObjectId) -> Self {
        Target::Object(object)
    }
}

impl From<StackItemId> for Target {
    fn from(item: StackItemId) -> Self {
        Target::StackItem(item)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Player(p) => write!(f, "{}", p),
            Target::Object(o) => write!(f, "{}", o),
            Target::StackItem(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ObjectId(42)), "Object(42)");
        assert_eq!(format!("{}", EffectId(3)), "Effect(3)");
        assert_eq!(format!("{}", TriggerId(0)), "Trigger(0)");
        assert_eq!(format!("{}", GameId(9)), "Game(9)");
    }

    #[test]
    fn test_index() {
        assert_eq!(ObjectId::new(5).index(), 5);
        assert_eq!(StackItemId::from(12).raw(), 12);
    }

    #[test]
    fn test_target_accessors() {
        let p = Target::from(PlayerId::new(1));
        let o = Target::from(ObjectId::new(4));
        let s = Target::from(StackItemId::new(2));

        assert_eq!(p.as_player(), Some(PlayerId::new(1)));
        assert_eq!(p.as_object(), None);
        assert_eq!(o.as_object(), Some(ObjectId::new(4)));
        assert_eq!(s.as_stack_item(), Some(StackItemId::new(2)));
        assert_eq!(format!("{}", o), "Object(4)");
    }

    #[test]
    fn test_serialization() {
        let id = ObjectId(123);
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);

        let target = Target::StackItem(StackItemId(8));
        let json = serde_json::to_string(&target).unwrap();
        let back: Target = serde_json::from_str(&json).unwrap();
        assert_eq!(target, back);
    }
}
