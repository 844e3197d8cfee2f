//! Combat bookkeeping: who attacks whom and who blocks what.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::{ObjectId, PlayerId, Target};

/// One declared block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub blocker: ObjectId,
    pub attacker: ObjectId,
}

/// Attackers sharing one defender, and the creatures blocking them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatGroup {
    /// The attacked player or permanent.
    pub defender: Target,
    /// The player defending (the permanent's controller for permanents).
    pub defending_player: PlayerId,
    /// In declaration order.
    pub attackers: SmallVec<[ObjectId; 2]>,
    /// In declaration order; this is the damage assignment order.
    pub blockers: SmallVec<[ObjectId; 2]>,
    pub blocks: SmallVec<[Block; 2]>,
    /// Attackers that were blocked, even if their blockers are gone.
    pub blocked_attackers: SmallVec<[ObjectId; 2]>,
    pub blocked: bool,
}

impl CombatGroup {
    #[must_use]
    pub fn new(defender: Target, defending_player: PlayerId) -> Self {
        Self {
            defender,
            defending_player,
            attackers: SmallVec::new(),
            blockers: SmallVec::new(),
            blocks: SmallVec::new(),
            blocked_attackers: SmallVec::new(),
            blocked: false,
        }
    }

    /// Blockers of one attacker, in damage assignment order.
    #[must_use]
    pub fn blockers_of(&self, attacker: ObjectId) -> SmallVec<[ObjectId; 2]> {
        self.blockers
            .iter()
            .copied()
            .filter(|&b| self.blocks.iter().any(|blk| blk.blocker == b && blk.attacker == attacker))
            .collect()
    }

    /// The first attacker a blocker is blocking.
    #[must_use]
    pub fn first_blocked_by(&self, blocker: ObjectId) -> Option<ObjectId> {
        self.blocks.iter().find(|b| b.blocker == blocker).map(|b| b.attacker)
    }

    #[must_use]
    pub fn is_blocked(&self, attacker: ObjectId) -> bool {
        self.blocked_attackers.contains(&attacker)
    }

    pub(crate) fn add_block(&mut self, blocker: ObjectId, attacker: ObjectId) {
        if !self.blockers.contains(&blocker) {
            self.blockers.push(blocker);
        }
        self.blocks.push(Block { blocker, attacker });
        if !self.blocked_attackers.contains(&attacker) {
            self.blocked_attackers.push(attacker);
        }
        self.blocked = true;
    }

    /// Take an object out of the group. Blocked status is kept.
    pub(crate) fn remove_object(&mut self, id: ObjectId) -> bool {
        let before = self.attackers.len() + self.blockers.len();
        self.attackers.retain(|&mut a| a != id);
        self.blockers.retain(|&mut b| b != id);
        self.blocks.retain(|b| b.blocker != id && b.attacker != id);
        before != self.attackers.len() + self.blockers.len()
    }

    /// Undo a block declaration entirely.
    pub(crate) fn retract_blocker(&mut self, blocker: ObjectId) {
        self.blockers.retain(|&mut b| b != blocker);
        self.blocks.retain(|b| b.blocker != blocker);
        let blocks = &self.blocks;
        self.blocked_attackers.retain(|&mut a| blocks.iter().any(|b| b.attacker == a));
        self.blocked = !self.blocked_attackers.is_empty();
    }
}

/// The state of the current combat.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatState {
    pub attacking_player: Option<PlayerId>,
    /// Players and planeswalkers that may be attacked.
    pub defenders: Vec<Target>,
    pub groups: Vec<CombatGroup>,
    /// Groups of combats that already ended this turn.
    pub former_groups: Vec<CombatGroup>,
    /// Attackers tapped by being declared.
    pub attackers_tapped: FxHashSet<ObjectId>,
    /// Creatures that dealt first-strike damage this combat.
    pub first_strikers: FxHashSet<ObjectId>,
}

impl CombatState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn group_of_attacker(&self, attacker: ObjectId) -> Option<usize> {
        self.groups.iter().position(|g| g.attackers.contains(&attacker))
    }

    #[must_use]
    pub fn group_of_blocker(&self, blocker: ObjectId) -> Option<usize> {
        self.groups.iter().position(|g| g.blockers.contains(&blocker))
    }

    #[must_use]
    pub fn is_attacking(&self, id: ObjectId) -> bool {
        self.group_of_attacker(id).is_some()
    }

    #[must_use]
    pub fn is_blocking(&self, id: ObjectId) -> bool {
        self.group_of_blocker(id).is_some()
    }

    /// Every attacker, group by group.
    pub fn attackers(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.groups.iter().flat_map(|g| g.attackers.iter().copied())
    }

    /// Every blocker, group by group.
    pub fn blockers(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.groups.iter().flat_map(|g| g.blockers.iter().copied())
    }

    #[must_use]
    pub fn has_attackers(&self) -> bool {
        self.attackers().next().is_some()
    }

    #[must_use]
    pub fn has_blockers(&self) -> bool {
        self.blockers().next().is_some()
    }

    /// Take an object out of combat. Returns whether it was in it.
    pub fn remove_object(&mut self, id: ObjectId) -> bool {
        let mut removed = false;
        for group in &mut self.groups {
            removed |= group.remove_object(id);
        }
        self.attackers_tapped.remove(&id);
        removed
    }

    /// Whether a creature attacked in this turn's combat, ongoing or over.
    #[must_use]
    pub fn attacked_this_turn(&self, id: ObjectId) -> bool {
        self.groups
            .iter()
            .chain(self.former_groups.iter())
            .any(|g| g.attackers.contains(&id))
    }

    /// Defending players with at least one group, in first-attacked order.
    #[must_use]
    pub fn defending_players(&self) -> Vec<PlayerId> {
        let mut players = Vec::new();
        for group in &self.groups {
            if !players.contains(&group.defending_player) {
                players.push(group.defending_player);
            }
        }
        players
    }

    /// A read-only copy for callers outside the engine.
    #[must_use]
    pub fn view(&self) -> CombatView {
        CombatView {
            attacking_player: self.attacking_player,
            groups: self.groups.clone(),
        }
    }
}

/// What the outside world sees of the current combat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatView {
    pub attacking_player: Option<PlayerId>,
    pub groups: Vec<CombatGroup>,
}
