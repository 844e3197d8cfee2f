//! Turn-based actions performed when steps begin and end.

use tracing::debug;

use super::state::GameState;
use crate::core::Result;
use crate::effects::CleanupPass;
use crate::events::{Event, EventType};
use crate::rules::Step;

impl GameState {
    /// Actions performed as the current step begins.
    pub(crate) fn enter_step(&mut self) -> Result<()> {
        let active = self.turn.active;
        match self.turn.step {
            Step::Untap => {
                for id in self.objects.battlefield().collect::<Vec<_>>() {
                    if self.controller_of(id) == Some(active) {
                        let object = self.objects.require_mut(id)?;
                        object.tapped = false;
                        object.summoning_sick = false;
                    }
                }
            }
            Step::Draw => {
                let skip = self.turn.turn == 1 && self.config.skip_first_draw;
                if skip {
                    debug!(%active, "first draw skipped");
                } else {
                    self.draw(active, 1)?;
                }
            }
            Step::BeginCombat => {
                self.reset_combat();
                self.publish(Event::for_player(EventType::BeginCombatStep, active));
            }
            Step::DeclareBlockers => {
                if self.combat.has_attackers() {
                    self.publish(Event::for_player(EventType::DeclareBlockersStepPre, active));
                }
            }
            Step::CombatDamage => {
                if self.combat.has_attackers() {
                    self.publish(Event::for_player(EventType::CombatDamageStepPre, active));
                    if self.has_first_or_double_strike() {
                        self.assign_combat_damage(true)?;
                        self.apply_combat_damage(true)?;
                        self.stabilize()?;
                        if self.is_over() {
                            return Ok(());
                        }
                    }
                    self.assign_combat_damage(false)?;
                    self.apply_combat_damage(false)?;
                }
            }
            Step::EndCombat => {
                self.publish(Event::for_player(EventType::EndCombatStepPre, active));
                self.end_combat();
                self.effects.cleanup(CleanupPass::EndOfCombat);
            }
            Step::Cleanup => {
                for id in self.objects.battlefield().collect::<Vec<_>>() {
                    self.objects.require_mut(id)?.clear_damage();
                }
                self.effects.cleanup(CleanupPass::EndOfTurn);
                self.watchers.reset_all();
            }
            Step::Upkeep | Step::Main1 | Step::DeclareAttackers | Step::Main2 | Step::End => {}
        }
        Ok(())
    }

    /// Actions performed as the current step ends.
    pub(crate) fn leave_step(&mut self) -> Result<()> {
        match self.turn.step {
            Step::DeclareAttackers => {
                self.declare_forced_attackers()?;
                if let Some(player) = self.combat.attacking_player {
                    let count = self.combat.attackers().count() as i32;
                    self.publish(
                        Event::for_player(EventType::DeclaredAttackers, player).with_amount(count),
                    );
                }
            }
            Step::DeclareBlockers => {
                if self.combat.has_attackers() {
                    self.accept_blockers();
                }
            }
            Step::Cleanup => debug!(turn = self.turn.turn, "turn ended"),
            _ => {}
        }
        self.stabilize()
    }
}
