//! Zone identifiers and insertion positions.

use serde::{Deserialize, Serialize};

/// The seven zones an object can be in.
///
/// Library, hand and graveyard exist once per player; the rest are shared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Library,
    Hand,
    Battlefield,
    Graveyard,
    Stack,
    Exile,
    Command,
}

impl Zone {
    pub const ALL: [Zone; 7] = [
        Zone::Library,
        Zone::Hand,
        Zone::Battlefield,
        Zone::Graveyard,
        Zone::Stack,
        Zone::Exile,
        Zone::Command,
    ];

    /// Zones that exist once per player.
    #[must_use]
    pub const fn is_owned(self) -> bool {
        matches!(self, Zone::Library | Zone::Hand | Zone::Graveyard)
    }

    /// Zones whose contents every player can see.
    #[must_use]
    pub const fn is_public(self) -> bool {
        !matches!(self, Zone::Library | Zone::Hand)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Zone::Library => "library",
            Zone::Hand => "hand",
            Zone::Battlefield => "battlefield",
            Zone::Graveyard => "graveyard",
            Zone::Stack => "stack",
            Zone::Exile => "exile",
            Zone::Command => "command zone",
        }
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Position for inserting an object into an ordered zone.
///
/// Index 0 is the bottom; the last element is the top.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZonePosition {
    #[default]
    Top,
    Bottom,
    Index(usize),
}
