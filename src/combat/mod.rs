//! Combat: attackers, blockers and combat damage.
//!
//! ## Key Types
//!
//! - `CombatState`: the groups of the current combat, stored in the game state
//! - `CombatGroup`: attackers sharing one defender and the creatures blocking them
//! - `CombatView`: a read-only copy handed to the embedding application
//!
//! The declaration and damage operations are methods on
//! [`GameState`](crate::game::GameState); they live in `resolver`.

mod resolver;
mod state;

pub use state::{Block, CombatGroup, CombatState, CombatView};
