//! Error types surfaced by the rules engine.
//!
//! Fizzling and loop-guard trips are deliberately absent: neither is a
//! failure. A fizzled item is logged and published as `StackItemRemoved`;
//! a tripped loop guard is a warning plus a counter.

use thiserror::Error;

use super::ids::{GameId, ObjectId, StackItemId, Target};
use super::player::PlayerId;
use crate::rules::Step;
use crate::zones::Zone;

pub type Result<T> = std::result::Result<T, RulesError>;

/// Every failure a rules operation can report.
#[derive(Debug, Error)]
pub enum RulesError {
    // === Not found ===
    #[error("game {0} not found")]
    GameNotFound(GameId),

    #[error("{0} not found")]
    PlayerNotFound(PlayerId),

    #[error("{0} not found")]
    ObjectNotFound(ObjectId),

    #[error("{0} not found on the stack")]
    StackItemNotFound(StackItemId),

    #[error("bookmark {0} not found")]
    BookmarkNotFound(u32),

    #[error("no snapshot available for turn {0}")]
    TurnSnapshotNotFound(u32),

    // === Rejected ===
    #[error("illegal action: {0}")]
    Illegal(#[from] IllegalAction),

    #[error("the game is over")]
    GameOver,

    #[error("turn rollback is disabled")]
    RollbackDisabled,

    // === Pause ===
    #[error("the game is paused")]
    Paused,

    #[error("the game is already paused")]
    AlreadyPaused,

    #[error("the game is not paused")]
    NotPaused,

    // === Internal ===
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error("game lock was poisoned")]
    LockPoisoned,

    #[error("snapshot encoding failed: {0}")]
    Snapshot(#[from] bincode::Error),
}

/// Why an otherwise well-formed action was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IllegalAction {
    #[error("{0} does not have priority")]
    NoPriority(PlayerId),

    #[error("{0} has left the game")]
    PlayerLeft(PlayerId),

    #[error("{object} is not in the {zone}")]
    NotInZone { object: ObjectId, zone: Zone },

    #[error("{player} does not control {object}")]
    NotController { object: ObjectId, player: PlayerId },

    #[error("no card named {name:?} in {player}'s hand")]
    CardNotInHand { player: PlayerId, name: String },

    #[error("{0} can only be cast at sorcery speed")]
    SorceryTiming(ObjectId),

    #[error("not allowed during {actual}, requires {expected}")]
    WrongStep { expected: Step, actual: Step },

    #[error("{0} is not a legal target")]
    InvalidTarget(Target),

    #[error("cannot pay {cost} for {object}")]
    CannotPay { object: ObjectId, cost: String },

    #[error("{object} has no ability #{index}")]
    NoSuchAbility { object: ObjectId, index: usize },

    #[error("{0} cannot be moved to the stack directly")]
    MoveToStack(ObjectId),

    // === Combat ===
    #[error("{0} is not the attacking player")]
    NotAttackingPlayer(PlayerId),

    #[error("{0} is not a creature")]
    NotACreature(ObjectId),

    #[error("{0} is tapped")]
    Tapped(ObjectId),

    #[error("{0} has summoning sickness")]
    SummoningSick(ObjectId),

    #[error("{0} has defender and cannot attack")]
    HasDefender(ObjectId),

    #[error("{0} cannot attack")]
    CantAttack(ObjectId),

    #[error("{0} is not a valid defender")]
    InvalidDefender(Target),

    #[error("{0} is not attacking")]
    NotAttacking(ObjectId),

    #[error("{blocker} cannot block {attacker}")]
    CantBlock { blocker: ObjectId, attacker: ObjectId },

    #[error("{0} is not in combat")]
    NotInCombat(ObjectId),

    // === Mulligan ===
    #[error("opening hands are not being decided")]
    NotInMulligan,

    #[error("opening hands must be kept first")]
    MulliganInProgress,

    #[error("{0} already kept their hand")]
    HandAlreadyKept(PlayerId),

    #[error("{player} must put {expected} cards on the bottom, not {actual}")]
    WrongBottomCount { player: PlayerId, expected: usize, actual: usize },

    #[error("not every player has kept their hand")]
    HandsNotKept,

    // === Undo ===
    #[error("no undo available for {0}")]
    NoUndo(PlayerId),

    #[error("cannot roll back to turn {0}")]
    RollbackTooFar(i64),
}
