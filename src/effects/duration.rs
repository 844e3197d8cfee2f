//! Effect durations and the cleanup passes that end them.

use serde::{Deserialize, Serialize};

use crate::core::{ObjectId, PlayerId};

/// How long a continuous or replacement effect lasts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Duration {
    /// Until the cleanup step of this turn.
    EndOfTurn,
    /// Until combat ends.
    EndOfCombat,
    /// As long as the source stays on the battlefield.
    WhileOnBattlefield,
    /// As long as the source's controller does not change.
    WhileControlled,
    /// Until the source leaves the battlefield.
    UntilSourceLeaves,
    /// Never ends on its own.
    Permanent,
    /// Removed after it applies once.
    OneUse,
}

impl Duration {
    /// Whether this duration ends when its source leaves the battlefield.
    #[must_use]
    pub const fn ends_with_source(self) -> bool {
        matches!(
            self,
            Duration::WhileOnBattlefield | Duration::WhileControlled | Duration::UntilSourceLeaves
        )
    }
}

/// A moment at which some effects expire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CleanupPass {
    EndOfTurn,
    EndOfCombat,
    SourceLeft(ObjectId),
    ControlChanged { source: ObjectId, new_controller: PlayerId },
}

impl CleanupPass {
    /// Whether an effect with this duration, source and controller expires.
    #[must_use]
    pub fn expires(
        self,
        duration: Duration,
        source: Option<ObjectId>,
        controller: PlayerId,
    ) -> bool {
        match self {
            CleanupPass::EndOfTurn => duration == Duration::EndOfTurn,
            CleanupPass::EndOfCombat => duration == Duration::EndOfCombat,
            CleanupPass::SourceLeft(left) => source == Some(left) && duration.ends_with_source(),
            CleanupPass::ControlChanged { source: changed, new_controller } => {
                source == Some(changed)
                    && duration == Duration::WhileControlled
                    && controller != new_controller
            }
        }
    }
}
