//! The stack: last in, first out.

use serde::{Deserialize, Serialize};

use super::item::StackItem;
use crate::core::{PlayerId, StackItemId};

/// Spells and abilities waiting to resolve (index 0 = bottom).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpellStack {
    items: Vec<StackItem>,
    next_id: u32,
}

impl SpellStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an item, assigning its id.
    pub fn push(&mut self, mut item: StackItem) -> StackItemId {
        self.next_id += 1;
        item.id = StackItemId::new(self.next_id);
        let id = item.id;
        self.items.push(item);
        id
    }

    pub fn pop(&mut self) -> Option<StackItem> {
        self.items.pop()
    }

    #[must_use]
    pub fn peek(&self) -> Option<&StackItem> {
        self.items.last()
    }

    #[must_use]
    pub fn get(&self, id: StackItemId) -> Option<&StackItem> {
        self.items.iter().find(|i| i.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: StackItemId) -> bool {
        self.get(id).is_some()
    }

    /// Take an item out from anywhere in the stack.
    pub fn remove(&mut self, id: StackItemId) -> Option<StackItem> {
        let idx = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(idx))
    }

    /// Remove every item a player controls, bottom to top.
    pub fn remove_controlled_by(&mut self, player: PlayerId) -> Vec<StackItem> {
        let (removed, kept) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|i| i.controller == player);
        self.items = kept;
        removed
    }

    /// Items bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &StackItem> {
        self.items.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
