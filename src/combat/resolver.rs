//! Combat declarations, damage assignment and the end of combat.
//!
//! Every rules check reads a characteristics snapshot, so keywords granted
//! or removed by continuous effects count. Damage is assigned for all
//! combatants first and then dealt one assignment at a time through the
//! replacement engine.

use tracing::debug;

use super::state::{CombatGroup, CombatState, CombatView};
use crate::core::{IllegalAction, ObjectId, PlayerId, Result, Target};
use crate::effects::Characteristics;
use crate::events::{Event, EventType};
use crate::game::GameState;
use crate::rules::Step;
use crate::zones::{CardType, Keyword, Zone};

/// One planned chunk of combat damage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Assignment {
    source: ObjectId,
    target: Target,
    amount: i32,
}

impl GameState {
    // === Setup ===

    /// Start a fresh combat for the active player.
    ///
    /// Opponents still in the game and the planeswalkers they control
    /// become the possible defenders.
    pub fn reset_combat(&mut self) {
        let attacker = self.turn.active;
        let mut defenders: Vec<Target> = self
            .players
            .values()
            .filter(|p| p.id != attacker && p.can_respond())
            .map(|p| Target::Player(p.id))
            .collect();
        for id in self.objects.battlefield().collect::<Vec<_>>() {
            if let Ok(chars) = self.characteristics(id) {
                if chars.has_type(CardType::Planeswalker) && chars.controller != attacker {
                    defenders.push(Target::Object(id));
                }
            }
        }

        let former_groups = std::mem::take(&mut self.combat.former_groups);
        self.combat = CombatState {
            attacking_player: Some(attacker),
            defenders,
            former_groups,
            ..CombatState::default()
        };
    }

    fn require_step(&self, expected: Step) -> Result<()> {
        self.ensure_running()?;
        if self.turn.step != expected {
            return Err(IllegalAction::WrongStep { expected, actual: self.turn.step }.into());
        }
        Ok(())
    }

    fn defending_player_of(&self, defender: Target) -> Option<PlayerId> {
        match defender {
            Target::Player(p) => self.players.get(p).filter(|pl| pl.can_respond()).map(|_| p),
            Target::Object(o) if self.objects.is_in_zone(o, Zone::Battlefield) => {
                self.controller_of(o)
            }
            _ => None,
        }
    }

    // === Attackers ===

    /// Declare a creature as an attacker.
    pub fn declare_attacker(
        &mut self,
        player: PlayerId,
        attacker: ObjectId,
        defender: Target,
    ) -> Result<()> {
        self.require_step(Step::DeclareAttackers)?;
        if self.combat.attacking_player != Some(player) {
            return Err(IllegalAction::NotAttackingPlayer(player).into());
        }
        let chars = self.check_attacker(player, attacker)?;
        if !self.combat.defenders.contains(&defender) {
            return Err(IllegalAction::InvalidDefender(defender).into());
        }
        let defending_player = self
            .defending_player_of(defender)
            .ok_or(IllegalAction::InvalidDefender(defender))?;

        if !self.combat.has_attackers() {
            self.publish(Event::for_player(EventType::DeclareAttackersStepPre, player));
        }

        let vigilance = chars.has_keyword(Keyword::Vigilance);
        let object = self.objects.require_mut(attacker)?;
        object.attacking = Some(defender);
        if !vigilance {
            object.tapped = true;
            self.combat.attackers_tapped.insert(attacker);
        }

        let index = match self.combat.groups.iter().position(|g| g.defender == defender) {
            Some(index) => index,
            None => {
                self.combat.groups.push(CombatGroup::new(defender, defending_player));
                self.combat.groups.len() - 1
            }
        };
        self.combat.groups[index].attackers.push(attacker);
        debug!(%attacker, %defender, "attacker declared");

        self.publish(
            Event::new(EventType::AttackerDeclared)
                .with_source(attacker)
                .with_target(defender)
                .with_player(player),
        );
        self.publish(
            Event::new(EventType::DefenderAttacked)
                .with_source(attacker)
                .with_target(defender)
                .with_player(defending_player),
        );
        Ok(())
    }

    fn check_attacker(&self, player: PlayerId, attacker: ObjectId) -> Result<Characteristics> {
        let chars = self.characteristics(attacker)?;
        if chars.zone != Zone::Battlefield {
            return Err(IllegalAction::NotInZone {
                object: attacker,
                zone: Zone::Battlefield,
            }
            .into());
        }
        if !chars.is_creature() {
            return Err(IllegalAction::NotACreature(attacker).into());
        }
        if chars.controller != player {
            return Err(IllegalAction::NotController { object: attacker, player }.into());
        }
        let object = self.objects.require(attacker)?;
        if self.combat.is_attacking(attacker) {
            return Err(IllegalAction::CantAttack(attacker).into());
        }
        if object.tapped {
            return Err(IllegalAction::Tapped(attacker).into());
        }
        if chars.has_keyword(Keyword::Defender) {
            return Err(IllegalAction::HasDefender(attacker).into());
        }
        if chars.cant_attack {
            return Err(IllegalAction::CantAttack(attacker).into());
        }
        if object.summoning_sick && !chars.has_keyword(Keyword::Haste) {
            return Err(IllegalAction::SummoningSick(attacker).into());
        }
        Ok(chars)
    }

    /// Declare every creature that must attack and is able to.
    pub(crate) fn declare_forced_attackers(&mut self) -> Result<()> {
        let (Some(player), Some(&defender)) =
            (self.combat.attacking_player, self.combat.defenders.first())
        else {
            return Ok(());
        };
        for id in self.objects.battlefield().collect::<Vec<_>>() {
            let must = self
                .characteristics(id)
                .is_ok_and(|c| c.must_attack && c.controller == player);
            if must && self.check_attacker(player, id).is_ok() {
                self.declare_attacker(player, id, defender)?;
            }
        }
        Ok(())
    }

    /// Take an attacker out of combat before damage.
    pub fn remove_attacker(&mut self, attacker: ObjectId) -> Result<()> {
        if !self.combat.is_attacking(attacker) {
            return Err(IllegalAction::NotInCombat(attacker).into());
        }
        let untap = self.combat.attackers_tapped.contains(&attacker)
            && self.turn.step == Step::DeclareAttackers;
        self.combat.remove_object(attacker);
        let object = self.objects.require_mut(attacker)?;
        object.attacking = None;
        if untap {
            object.tapped = false;
        }
        self.publish(
            Event::new(EventType::RemovedFromCombat)
                .with_source(attacker)
                .with_target(attacker),
        );
        Ok(())
    }

    // === Blockers ===

    /// Why `blocker` cannot block `attacker`, if it can't.
    pub fn check_block(&self, blocker: ObjectId, attacker: ObjectId) -> Result<()> {
        let chars = self.characteristics(blocker)?;
        if chars.zone != Zone::Battlefield {
            return Err(IllegalAction::NotInZone {
                object: blocker,
                zone: Zone::Battlefield,
            }
            .into());
        }
        if !chars.is_creature() {
            return Err(IllegalAction::NotACreature(blocker).into());
        }
        if self.objects.require(blocker)?.tapped {
            return Err(IllegalAction::Tapped(blocker).into());
        }
        let group = self
            .combat
            .group_of_attacker(attacker)
            .ok_or(IllegalAction::NotAttacking(attacker))?;
        let cant = IllegalAction::CantBlock { blocker, attacker };
        if chars.cant_block || self.combat.is_blocking(blocker) {
            return Err(cant.into());
        }
        if chars.controller != self.combat.groups[group].defending_player {
            return Err(cant.into());
        }
        let attacker_chars = self.characteristics(attacker)?;
        if attacker_chars.has_keyword(Keyword::Flying)
            && !chars.has_keyword(Keyword::Flying)
            && !chars.has_keyword(Keyword::Reach)
        {
            return Err(cant.into());
        }
        Ok(())
    }

    #[must_use]
    pub fn can_block(&self, blocker: ObjectId, attacker: ObjectId) -> bool {
        self.check_block(blocker, attacker).is_ok()
    }

    /// Declare a blocker for an attacker.
    pub fn declare_blocker(
        &mut self,
        player: PlayerId,
        blocker: ObjectId,
        attacker: ObjectId,
    ) -> Result<()> {
        self.require_step(Step::DeclareBlockers)?;
        if self.controller_of(blocker) != Some(player) {
            return Err(IllegalAction::NotController { object: blocker, player }.into());
        }
        self.check_block(blocker, attacker)?;

        let group = self
            .combat
            .group_of_attacker(attacker)
            .ok_or(IllegalAction::NotAttacking(attacker))?;
        self.combat.groups[group].add_block(blocker, attacker);
        self.objects.require_mut(blocker)?.blocking.push(attacker);
        debug!(%blocker, %attacker, "blocker declared");

        self.publish(
            Event::new(EventType::BlockerDeclared)
                .with_source(blocker)
                .with_target(attacker)
                .with_player(player),
        );
        Ok(())
    }

    /// Withdraw a declared blocker.
    pub fn remove_blocker(&mut self, blocker: ObjectId) -> Result<()> {
        let group = self
            .combat
            .group_of_blocker(blocker)
            .ok_or(IllegalAction::NotInCombat(blocker))?;
        self.combat.groups[group].retract_blocker(blocker);
        self.objects.require_mut(blocker)?.blocking.clear();
        self.publish(
            Event::new(EventType::RemovedFromCombat)
                .with_source(blocker)
                .with_target(blocker),
        );
        Ok(())
    }

    /// Lock in blocks and announce the result.
    pub fn accept_blockers(&mut self) {
        let groups = self.combat.groups.clone();
        for group in &groups {
            for block in &group.blocks {
                self.publish(
                    Event::new(EventType::BlockerDeclared)
                        .with_source(block.blocker)
                        .with_target(block.attacker)
                        .with_player(group.defending_player)
                        .with_meta("accepted", "true"),
                );
            }
            for &attacker in &group.attackers {
                let event_type = if group.is_blocked(attacker) {
                    EventType::CreatureBlocked
                } else {
                    EventType::UnblockedAttacker
                };
                self.publish(
                    Event::new(event_type)
                        .with_source(attacker)
                        .with_target(group.defender)
                        .with_player(group.defending_player),
                );
            }
            for &blocker in &group.blockers {
                let mut event = Event::new(EventType::CreatureBlocks)
                    .with_source(blocker)
                    .with_player(group.defending_player);
                if let Some(attacker) = group.first_blocked_by(blocker) {
                    event = event.with_target(attacker);
                }
                self.publish(event);
            }
        }
        for player in self.combat.defending_players() {
            self.publish(Event::for_player(EventType::DeclaredBlockers, player));
        }
    }

    // === Damage ===

    /// Whether any combatant has first strike or double strike.
    #[must_use]
    pub fn has_first_or_double_strike(&self) -> bool {
        let combatants: Vec<ObjectId> =
            self.combat.attackers().chain(self.combat.blockers()).collect();
        combatants.into_iter().any(|id| {
            self.characteristics(id)
                .is_ok_and(|c| {
                    c.has_keyword(Keyword::FirstStrike) || c.has_keyword(Keyword::DoubleStrike)
                })
        })
    }

    fn deals_damage_in(&self, chars: &Characteristics, first_strike: bool) -> bool {
        let double = chars.has_keyword(Keyword::DoubleStrike);
        if first_strike {
            double || chars.has_keyword(Keyword::FirstStrike)
        } else {
            double || !self.combat.first_strikers.contains(&chars.object)
        }
    }

    /// Assign and deal one sub-pass of combat damage.
    pub fn assign_combat_damage(&mut self, first_strike: bool) -> Result<()> {
        let mut plan = Vec::new();
        for group in &self.combat.groups {
            for &attacker in &group.attackers {
                self.plan_attacker(group, attacker, first_strike, &mut plan)?;
            }
            for &blocker in &group.blockers {
                let Ok(chars) = self.characteristics(blocker) else { continue };
                if chars.zone != Zone::Battlefield || !self.deals_damage_in(&chars, first_strike) {
                    continue;
                }
                let Some(attacker) = group.first_blocked_by(blocker) else { continue };
                if !self.objects.is_in_zone(attacker, Zone::Battlefield) {
                    continue;
                }
                let power = chars.power_or_zero();
                if power > 0 {
                    plan.push(Assignment {
                        source: blocker,
                        target: Target::Object(attacker),
                        amount: power,
                    });
                }
            }
        }

        for assignment in plan {
            if first_strike {
                self.combat.first_strikers.insert(assignment.source);
            }
            debug!(
                source = %assignment.source,
                target = %assignment.target,
                amount = assignment.amount,
                first_strike,
                "combat damage"
            );
            self.deal_damage(Some(assignment.source), assignment.target, assignment.amount)?;
        }
        Ok(())
    }

    fn plan_attacker(
        &self,
        group: &CombatGroup,
        attacker: ObjectId,
        first_strike: bool,
        plan: &mut Vec<Assignment>,
    ) -> Result<()> {
        let Ok(chars) = self.characteristics(attacker) else { return Ok(()) };
        if chars.zone != Zone::Battlefield || !self.deals_damage_in(&chars, first_strike) {
            return Ok(());
        }
        let power = chars.power_or_zero();
        if power <= 0 {
            return Ok(());
        }
        let to_defender = |amount: i32, plan: &mut Vec<Assignment>| {
            if amount > 0 {
                plan.push(Assignment { source: attacker, target: group.defender, amount });
            }
        };

        if !group.is_blocked(attacker) {
            to_defender(power, plan);
            return Ok(());
        }

        let blockers: Vec<ObjectId> = group
            .blockers_of(attacker)
            .into_iter()
            .filter(|&b| self.objects.is_in_zone(b, Zone::Battlefield))
            .collect();
        let trample = chars.has_keyword(Keyword::Trample);
        if blockers.is_empty() {
            if trample {
                to_defender(power, plan);
            }
            return Ok(());
        }

        if !trample {
            let count = blockers.len() as i32;
            let share = power / count;
            let remainder = power % count;
            for (i, &blocker) in blockers.iter().enumerate() {
                let amount = if i == 0 { share + remainder } else { share };
                if amount > 0 {
                    plan.push(Assignment {
                        source: attacker,
                        target: Target::Object(blocker),
                        amount,
                    });
                }
            }
            return Ok(());
        }

        let deathtouch = chars.has_keyword(Keyword::Deathtouch);
        let mut remaining = power;
        for &blocker in &blockers {
            if remaining == 0 {
                break;
            }
            let lethal = if deathtouch {
                1
            } else {
                let toughness = self.characteristics(blocker)?.toughness_or_zero();
                (toughness - self.objects.require(blocker)?.damage).max(0)
            };
            let amount = lethal.min(remaining);
            if amount > 0 {
                plan.push(Assignment {
                    source: attacker,
                    target: Target::Object(blocker),
                    amount,
                });
                remaining -= amount;
            }
        }
        to_defender(remaining, plan);
        Ok(())
    }

    /// Move combatants with lethal damage to the graveyard.
    pub fn apply_combat_damage(&mut self, first_strike: bool) -> Result<()> {
        let combatants: Vec<ObjectId> =
            self.combat.attackers().chain(self.combat.blockers()).collect();
        for id in combatants {
            if !self.objects.is_in_zone(id, Zone::Battlefield) {
                continue;
            }
            let toughness = self.characteristics(id)?.toughness_or_zero();
            let object = self.objects.require(id)?;
            let lethal = (toughness > 0 && object.damage >= toughness) || object.deathtouch_damage;
            if lethal {
                self.move_object(id, Zone::Graveyard)?;
            }
        }
        let mut event = Event::new(EventType::CombatDamageApplied).with_flag(first_strike);
        if let Some(player) = self.combat.attacking_player {
            event = event.with_player(player);
        }
        self.publish(event);
        Ok(())
    }

    // === End ===

    /// Clear combat state on every combatant and remember the groups.
    pub fn end_combat(&mut self) {
        let combatants: Vec<ObjectId> =
            self.combat.attackers().chain(self.combat.blockers()).collect();
        for id in combatants {
            if let Some(object) = self.objects.get_mut(id) {
                object.clear_combat();
                object.clear_damage();
            }
        }
        let groups = std::mem::take(&mut self.combat.groups);
        self.combat.former_groups.extend(groups);
        self.combat.attackers_tapped.clear();
        self.combat.first_strikers.clear();

        let mut event = Event::new(EventType::EndCombatStep);
        if let Some(player) = self.combat.attacking_player {
            event = event.with_player(player);
        }
        self.publish(event);
    }

    // === Queries ===

    #[must_use]
    pub fn attacked_this_turn(&self, id: ObjectId) -> bool {
        self.combat.attacked_this_turn(id)
    }

    #[must_use]
    pub fn combat_view(&self) -> CombatView {
        self.combat.view()
    }
}
