//! Engine configuration.
//!
//! `EngineConfig` carries the tunables of the rules engine: starting life,
//! loss thresholds, loop caps and the turn-rollback window. Every field has
//! a serde default, so a host can load a partial config file and get the
//! standard values for anything it leaves out.
//!
//! ```
//! use mtg_rules::core::EngineConfig;
//!
//! let config = EngineConfig::default()
//!     .with_starting_life(40)
//!     .with_rollback_turns(2);
//! assert_eq!(config.starting_life, 40);
//! assert_eq!(config.stabilization_cap, 100);
//! ```

use serde::{Deserialize, Serialize};

/// Tunables shared by every game an engine hosts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Life each player starts with.
    pub starting_life: i32,

    /// Poison counters at which a player loses.
    pub poison_threshold: i32,

    /// Cards drawn into the opening hand by `GameBuilder`.
    pub opening_hand_size: usize,

    /// The starting player skips their first draw.
    pub skip_first_draw: bool,

    /// Maximum SBA/trigger passes before the loop guard trips.
    pub stabilization_cap: usize,

    /// Maximum replacement passes per event before the loop guard trips.
    pub replacement_cap: usize,

    /// Whether turn snapshots are kept at all.
    pub rollback_allowed: bool,

    /// How many turn snapshots to keep.
    pub rollback_turns: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            starting_life: 20,
            poison_threshold: 10,
            opening_hand_size: 7,
            skip_first_draw: true,
            stabilization_cap: 100,
            replacement_cap: 100,
            rollback_allowed: true,
            rollback_turns: 4,
        }
    }
}

impl EngineConfig {
    /// Set starting life.
    #[must_use]
    pub fn with_starting_life(mut self, life: i32) -> Self {
        self.starting_life = life;
        self
    }

    /// Set the poison loss threshold.
    #[must_use]
    pub fn with_poison_threshold(mut self, threshold: i32) -> Self {
        self.poison_threshold = threshold;
        self
    }

    /// Set opening hand size.
    #[must_use]
    pub fn with_opening_hand_size(mut self, size: usize) -> Self {
        self.opening_hand_size = size;
        self
    }

    /// Control whether the starting player skips their first draw.
    #[must_use]
    pub fn with_skip_first_draw(mut self, skip: bool) -> Self {
        self.skip_first_draw = skip;
        self
    }

    /// Set the stabilization loop cap.
    #[must_use]
    pub fn with_stabilization_cap(mut self, cap: usize) -> Self {
        self.stabilization_cap = cap;
        self
    }

    /// Set the replacement loop cap.
    #[must_use]
    pub fn with_replacement_cap(mut self, cap: usize) -> Self {
        self.replacement_cap = cap;
        self
    }

    /// Set the number of turn snapshots kept for rollback.
    #[must_use]
    pub fn with_rollback_turns(mut self, turns: u32) -> Self {
        self.rollback_turns = turns;
        self
    }

    /// Disable turn snapshots entirely.
    #[must_use]
    pub fn without_rollback(mut self) -> Self {
        self.rollback_allowed = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.starting_life, 20);
        assert_eq!(config.poison_threshold, 10);
        assert_eq!(config.replacement_cap, 100);
        assert_eq!(config.rollback_turns, 4);
        assert!(config.rollback_allowed);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{ "starting_life": 30 }"#).unwrap();
        assert_eq!(config.starting_life, 30);
        assert_eq!(config.stabilization_cap, 100);
        assert!(config.skip_first_draw);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::default()
            .with_poison_threshold(15)
            .with_stabilization_cap(10)
            .without_rollback();
        assert_eq!(config.poison_threshold, 15);
        assert_eq!(config.stabilization_cap, 10);
        assert!(!config.rollback_allowed);
    }
}
