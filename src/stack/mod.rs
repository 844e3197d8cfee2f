//! The stack.
//!
//! Spells and abilities are pushed onto a stack and resolve last in, first
//! out. Players pass priority in turn order; when everyone who can still
//! respond has passed in succession, the top item resolves. The state
//! machine that drives this lives in [`crate::game`]; this module holds
//! the data and the legality checks.
//!
//! ## Key Types
//!
//! - `StackItem`: a spell, activated ability or triggered ability
//! - `SpellEffect`: the closed set of instructions an item can carry
//! - `SpellStack`: the LIFO container
//! - `LegalityContext`: target and source checks at cast and resolution
//!
//! ```
//! use mtg_rules::core::PlayerId;
//! use mtg_rules::stack::{SpellEffect, SpellStack, StackItem, StackItemKind};
//!
//! let mut stack = SpellStack::new();
//! let shock = StackItem::new(StackItemKind::Spell, PlayerId::new(0), "Shock")
//!     .with_effects([SpellEffect::DealDamage { amount: 2 }]);
//! let id = stack.push(shock);
//! assert_eq!(stack.peek().map(|i| i.id), Some(id));
//! ```

mod item;
mod legality;
mod spell_stack;

pub use item::{SpellEffect, StackItem, StackItemKind};
pub use legality::{Legality, LegalityContext};
pub use spell_stack::SpellStack;
