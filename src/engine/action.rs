//! The typed action API.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::core::{ObjectId, PlayerId, Result, RulesError, StackItemId, Target};
use crate::events::Event;
use crate::game::GameState;
use crate::rules::{GameResult, ManaPayment};

/// Everything a player can ask the engine to do.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerAction {
    Pass,
    CastByName {
        name: String,
        targets: SmallVec<[Target; 2]>,
    },
    Cast {
        object: ObjectId,
        targets: SmallVec<[Target; 2]>,
    },
    Activate {
        source: ObjectId,
        index: usize,
        targets: SmallVec<[Target; 2]>,
    },
    /// Gain (positive) or lose (negative) life.
    ChangeLife(i32),
    CounterItem(StackItemId),
    DeclareAttacker {
        attacker: ObjectId,
        defender: Target,
    },
    DeclareBlocker {
        blocker: ObjectId,
        attacker: ObjectId,
    },
    Concede,
    /// Shuffle the opening hand away and draw a new one.
    Mulligan,
    /// Keep the opening hand, putting `bottom` on the bottom of the library.
    KeepHand {
        bottom: SmallVec<[ObjectId; 2]>,
    },
}

impl PlayerAction {
    /// Cast a card from hand by name.
    pub fn cast_by_name(
        name: impl Into<String>,
        targets: impl IntoIterator<Item = Target>,
    ) -> Self {
        PlayerAction::CastByName {
            name: name.into(),
            targets: targets.into_iter().collect(),
        }
    }

    pub fn cast(object: ObjectId, targets: impl IntoIterator<Item = Target>) -> Self {
        PlayerAction::Cast {
            object,
            targets: targets.into_iter().collect(),
        }
    }

    pub fn activate(
        source: ObjectId,
        index: usize,
        targets: impl IntoIterator<Item = Target>,
    ) -> Self {
        PlayerAction::Activate {
            source,
            index,
            targets: targets.into_iter().collect(),
        }
    }

    pub fn keep_hand(bottom: impl IntoIterator<Item = ObjectId>) -> Self {
        PlayerAction::KeepHand {
            bottom: bottom.into_iter().collect(),
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PlayerAction::Pass => "pass",
            PlayerAction::CastByName { .. } | PlayerAction::Cast { .. } => "cast",
            PlayerAction::Activate { .. } => "activate",
            PlayerAction::ChangeLife(_) => "change life",
            PlayerAction::CounterItem(_) => "counter",
            PlayerAction::DeclareAttacker { .. } => "declare attacker",
            PlayerAction::DeclareBlocker { .. } => "declare blocker",
            PlayerAction::Concede => "concede",
            PlayerAction::Mulligan => "mulligan",
            PlayerAction::KeepHand { .. } => "keep hand",
        }
    }

    /// Perform the action on a game state.
    pub fn apply(
        &self,
        state: &mut GameState,
        player: PlayerId,
        payment: &dyn ManaPayment,
    ) -> Result<()> {
        state.player(player)?;
        if !self.allowed_in_mulligan() {
            state.ensure_not_in_mulligan()?;
        }
        match self {
            PlayerAction::Pass => state.pass_priority(player),
            PlayerAction::CastByName { name, targets } => {
                state.cast_by_name(player, name, targets, payment).map(drop)
            }
            PlayerAction::Cast { object, targets } => {
                state.cast_spell(player, *object, targets, payment).map(drop)
            }
            PlayerAction::Activate { source, index, targets } => {
                state.activate_ability(player, *source, *index, targets, payment).map(drop)
            }
            PlayerAction::ChangeLife(delta) => state.adjust_life(player, *delta).map(drop),
            PlayerAction::CounterItem(item) => state.counter_action(player, *item),
            PlayerAction::DeclareAttacker { attacker, defender } => {
                state.declare_attacker(player, *attacker, *defender)?;
                state.stabilize()
            }
            PlayerAction::DeclareBlocker { blocker, attacker } => {
                state.declare_blocker(player, *blocker, *attacker)?;
                state.stabilize()
            }
            PlayerAction::Concede => state.concede(player),
            PlayerAction::Mulligan => state.mulligan(player),
            PlayerAction::KeepHand { bottom } => state.keep_hand(player, bottom),
        }
    }

    fn allowed_in_mulligan(&self) -> bool {
        matches!(
            self,
            PlayerAction::Concede | PlayerAction::Mulligan | PlayerAction::KeepHand { .. }
        )
    }
}

/// What an accepted action led to.
#[derive(Clone, Debug)]
pub struct ActionReport {
    pub player: PlayerId,
    /// Events published while the action ran, in order.
    pub events: Vec<Event>,
    /// Who holds priority now.
    pub priority: Option<PlayerId>,
    pub result: Option<GameResult>,
}

/// A rejected action.
#[derive(Debug, Error)]
#[error("{error} (state restored: {state_restored})")]
pub struct ActionFailure {
    #[source]
    pub error: RulesError,
    /// Whether the pre-action state was put back.
    pub state_restored: bool,
}

impl From<RulesError> for ActionFailure {
    fn from(error: RulesError) -> Self {
        Self {
            error,
            state_restored: false,
        }
    }
}
