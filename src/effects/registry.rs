//! One registry for both kinds of effect, sharing an id space.

use serde::{Deserialize, Serialize};

use super::duration::CleanupPass;
use super::layers::{Characteristics, ContinuousEffect, LayerSystem};
use super::replacement::{ReplacementEffect, ReplacementEngine, ReplacementOutcome};
use crate::core::{EffectId, ObjectId, Result};
use crate::events::Event;
use crate::zones::ObjectStore;

/// Continuous and replacement effects of a game.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EffectRegistry {
    pub layers: LayerSystem,
    pub replacements: ReplacementEngine,
    next_id: u32,
}

impl EffectRegistry {
    #[must_use]
    pub fn new(replacement_cap: usize) -> Self {
        Self {
            layers: LayerSystem::new(),
            replacements: ReplacementEngine::new(replacement_cap),
            next_id: 0,
        }
    }

    pub fn add_continuous(&mut self, mut effect: ContinuousEffect) -> EffectId {
        effect.id = self.allocate();
        let id = effect.id;
        self.layers.add(effect);
        id
    }

    pub fn add_replacement(&mut self, mut effect: ReplacementEffect) -> EffectId {
        effect.id = self.allocate();
        let id = effect.id;
        self.replacements.add(effect);
        id
    }

    /// Remove an effect of either kind. Returns whether it existed.
    pub fn remove(&mut self, id: EffectId) -> bool {
        self.layers.remove(id).is_some() || self.replacements.remove(id).is_some()
    }

    pub fn characteristics(&self, id: ObjectId, store: &ObjectStore) -> Result<Characteristics> {
        self.layers.characteristics(id, store)
    }

    pub fn resolve(&mut self, event: Event) -> ReplacementOutcome {
        self.replacements.resolve(event)
    }

    /// Run a cleanup pass over both registries. Returns how many ended.
    pub fn cleanup(&mut self, pass: CleanupPass) -> usize {
        let ended = self.layers.cleanup(pass) + self.replacements.cleanup(pass);
        if ended > 0 {
            tracing::debug!(?pass, ended, "effects expired");
        }
        ended
    }

    fn allocate(&mut self) -> EffectId {
        self.next_id += 1;
        EffectId::new(self.next_id)
    }
}
