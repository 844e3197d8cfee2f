//! Turn structure: phases, steps and who is active.

use serde::{Deserialize, Serialize};

use crate::core::PlayerId;

/// The five phases of a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Beginning,
    PrecombatMain,
    Combat,
    PostcombatMain,
    Ending,
}

/// The twelve steps of a turn, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Step {
    Untap,
    Upkeep,
    Draw,
    Main1,
    BeginCombat,
    DeclareAttackers,
    DeclareBlockers,
    CombatDamage,
    EndCombat,
    Main2,
    End,
    Cleanup,
}

impl Step {
    pub const ALL: [Step; 12] = [
        Step::Untap,
        Step::Upkeep,
        Step::Draw,
        Step::Main1,
        Step::BeginCombat,
        Step::DeclareAttackers,
        Step::DeclareBlockers,
        Step::CombatDamage,
        Step::EndCombat,
        Step::Main2,
        Step::End,
        Step::Cleanup,
    ];

    #[must_use]
    pub const fn phase(self) -> Phase {
        match self {
            Step::Untap | Step::Upkeep | Step::Draw => Phase::Beginning,
            Step::Main1 => Phase::PrecombatMain,
            Step::BeginCombat
            | Step::DeclareAttackers
            | Step::DeclareBlockers
            | Step::CombatDamage
            | Step::EndCombat => Phase::Combat,
            Step::Main2 => Phase::PostcombatMain,
            Step::End | Step::Cleanup => Phase::Ending,
        }
    }

    /// The following step, or `None` after cleanup.
    #[must_use]
    pub fn next(self) -> Option<Step> {
        let idx = Step::ALL.iter().position(|&s| s == self)?;
        Step::ALL.get(idx + 1).copied()
    }

    /// Whether players receive priority during this step.
    #[must_use]
    pub const fn gives_priority(self) -> bool {
        !matches!(self, Step::Untap | Step::Cleanup)
    }

    #[must_use]
    pub const fn is_main(self) -> bool {
        matches!(self, Step::Main1 | Step::Main2)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Step::Untap => "untap",
            Step::Upkeep => "upkeep",
            Step::Draw => "draw",
            Step::Main1 => "precombat main",
            Step::BeginCombat => "beginning of combat",
            Step::DeclareAttackers => "declare attackers",
            Step::DeclareBlockers => "declare blockers",
            Step::CombatDamage => "combat damage",
            Step::EndCombat => "end of combat",
            Step::Main2 => "postcombat main",
            Step::End => "end",
            Step::Cleanup => "cleanup",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the game is in the turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnManager {
    pub turn: u32,
    pub step: Step,
    pub active: PlayerId,
    pub priority: Option<PlayerId>,
}

impl TurnManager {
    /// Before the first turn: turn 0, untap step.
    #[must_use]
    pub fn new(first: PlayerId) -> Self {
        Self {
            turn: 0,
            step: Step::Untap,
            active: first,
            priority: None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.step.phase()
    }

    /// Start the first turn.
    pub fn begin(&mut self) {
        self.turn = 1;
        self.step = Step::Untap;
        self.priority = None;
    }

    /// Move to the next step. After cleanup a new turn starts with
    /// `next_active` as the active player. Returns whether a new turn began.
    pub fn advance_step(&mut self, next_active: PlayerId) -> bool {
        self.priority = None;
        match self.step.next() {
            Some(step) => {
                self.step = step;
                false
            }
            None => {
                self.turn += 1;
                self.step = Step::Untap;
                self.active = next_active;
                true
            }
        }
    }
}
