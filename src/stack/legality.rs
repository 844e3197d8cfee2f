//! Legality of stack items and targets.
//!
//! Checked when a spell is cast (targets only) and again when an item
//! resolves. An item that is illegal at resolution fizzles: it leaves the
//! stack without doing anything.

use crate::core::{Player, PlayerMap, Target};
use crate::zones::{ObjectStore, Zone};

use super::item::{StackItem, StackItemKind};
use super::spell_stack::SpellStack;

/// The outcome of a legality check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Legality {
    Legal,
    Illegal(String),
}

impl Legality {
    #[must_use]
    pub fn is_legal(&self) -> bool {
        matches!(self, Legality::Legal)
    }
}

/// Read access to the parts of a game legality depends on.
#[derive(Clone, Copy)]
pub struct LegalityContext<'a> {
    pub players: &'a PlayerMap<Player>,
    pub objects: &'a ObjectStore,
    pub stack: &'a SpellStack,
}

impl<'a> LegalityContext<'a> {
    pub fn new(
        players: &'a PlayerMap<Player>,
        objects: &'a ObjectStore,
        stack: &'a SpellStack,
    ) -> Self {
        Self { players, objects, stack }
    }

    /// Whether a single target is still legal.
    #[must_use]
    pub fn target_is_legal(&self, target: Target) -> bool {
        match target {
            Target::Player(id) => self.players.get(id).is_some_and(Player::can_respond),
            Target::Object(id) => self.objects.is_in_zone(id, Zone::Battlefield),
            Target::StackItem(id) => self.stack.contains(id),
        }
    }

    /// Full legality check of an item about to resolve.
    ///
    /// The item itself must already be off the stack when this is called.
    #[must_use]
    pub fn check_item(&self, item: &StackItem) -> Legality {
        match self.players.get(item.controller) {
            None => {
                return Legality::Illegal(format!("controller {} does not exist", item.controller))
            }
            Some(p) if !p.can_respond() => {
                return Legality::Illegal(format!(
                    "controller {} is no longer in the game",
                    item.controller
                ))
            }
            Some(_) => {}
        }

        if let Some(source) = item.source {
            let zone = self.objects.zone_of(source);
            let source_ok = match item.kind {
                StackItemKind::Spell => zone == Some(Zone::Stack),
                StackItemKind::Activated { .. } => matches!(
                    zone,
                    Some(
                        Zone::Hand | Zone::Battlefield | Zone::Graveyard | Zone::Exile | Zone::Stack
                    )
                ),
                StackItemKind::Triggered { .. } => true,
            };
            if !source_ok {
                return Legality::Illegal(format!(
                    "source {source} is no longer where it has to be"
                ));
            }
        }

        match item.targets.iter().find(|&&t| !self.target_is_legal(t)) {
            Some(target) => Legality::Illegal(format!("target {} is no longer legal", target)),
            None => Legality::Legal,
        }
    }
}
