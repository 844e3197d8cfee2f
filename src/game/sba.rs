//! Stabilization: concessions, game over, state-based actions, triggers.
//!
//! Before anyone gets priority and after every action, the game runs these
//! checks in a loop until one full pass changes nothing. The loop is capped;
//! hitting the cap is logged and counted, and the game carries on.

use tracing::{info, warn};

use super::state::GameState;
use crate::core::{ObjectId, PlayerId, Result};
use crate::events::{Event, EventType};
use crate::rules::GameResult;
use crate::stack::{StackItem, StackItemKind};
use crate::zones::{CardType, CounterKind, Zone};

impl GameState {
    /// Run the stabilization loop until nothing changes or the cap is hit.
    pub fn stabilize(&mut self) -> Result<()> {
        let cap = self.config.stabilization_cap;
        for _ in 0..cap {
            let mut changed = self.process_concessions();
            changed |= self.check_game_over();
            if self.is_over() {
                self.trigger_queue.clear();
                return Ok(());
            }
            changed |= self.check_state_based_actions()?;
            changed |= self.drain_triggers()?;
            if !changed {
                return Ok(());
            }
        }

        self.stabilization_trips += 1;
        warn!(cap, trips = self.stabilization_trips, "stabilization loop hit its cap");
        self.publish(
            Event::new(EventType::LoopGuardTripped)
                .with_amount(cap as i32)
                .with_meta("loop", "stabilization"),
        );
        Ok(())
    }

    /// Queue a concession. The player leaves on the next stabilization pass.
    pub fn request_concession(&mut self, player: PlayerId) -> Result<()> {
        self.player(player)?;
        if !self.pending_concessions.contains(&player) {
            self.pending_concessions.push(player);
        }
        Ok(())
    }

    fn process_concessions(&mut self) -> bool {
        let pending = std::mem::take(&mut self.pending_concessions);
        let mut changed = false;
        for player in pending {
            if self.players[player].left {
                continue;
            }
            self.players[player].conceded = true;
            self.remove_player(player, "conceded");
            changed = true;
        }
        changed
    }

    /// Take a player out of the game along with everything they own.
    pub(crate) fn remove_player(&mut self, player: PlayerId, reason: &str) {
        {
            let p = &mut self.players[player];
            p.lost = true;
            p.left = true;
            p.passed = true;
            p.has_priority = false;
        }
        if self.turn.priority == Some(player) {
            self.turn.priority = None;
        }
        info!(%player, reason, "player left the game");
        self.log(format!("{} {}", self.players[player].name, reason));
        self.publish(Event::for_player(EventType::Lost, player).with_meta("reason", reason));

        for item in self.stack.remove_controlled_by(player) {
            self.publish(
                Event::new(EventType::StackItemRemoved)
                    .with_target(item.id)
                    .with_player(player)
                    .with_meta("reason", "controller left"),
            );
        }

        let owned: Vec<ObjectId> =
            self.objects.iter().filter(|o| o.owner == player).map(|o| o.id).collect();
        for id in owned {
            self.combat.remove_object(id);
            self.effects.cleanup(crate::effects::CleanupPass::SourceLeft(id));
            self.triggers.remove_for_source(id);
            self.objects.remove(id);
        }

        let borrowed: Vec<ObjectId> = self
            .objects
            .iter()
            .filter(|o| o.controller == player)
            .map(|o| o.id)
            .collect();
        for id in borrowed {
            if let Some(object) = self.objects.get_mut(id) {
                object.controller = object.owner;
            }
        }

        let controlled: Vec<_> =
            self.triggers.iter().filter(|t| t.controller == player).map(|t| t.id).collect();
        for id in controlled {
            self.triggers.unregister(id);
        }
        self.trigger_queue.retain(|t| t.controller != player);
    }

    /// Decide the game if at most one player is left. Returns whether the
    /// game ended on this call.
    fn check_game_over(&mut self) -> bool {
        if self.is_over() || self.player_count() < 2 {
            return false;
        }
        let remaining: Vec<PlayerId> =
            self.players.values().filter(|p| p.can_respond()).map(|p| p.id).collect();
        let result = match remaining.as_slice() {
            [] => GameResult::Draw,
            [winner] => {
                self.players[*winner].won = true;
                GameResult::Winner(*winner)
            }
            _ => return false,
        };

        self.result = Some(result);
        self.clear_priority();
        info!(?result, turn = self.turn.turn, "game over");
        self.log(match result {
            GameResult::Winner(p) => format!("{} wins", self.players[p].name),
            GameResult::Draw => "the game is a draw".to_string(),
        });
        let mut event = Event::new(EventType::GameOver);
        if let GameResult::Winner(p) = result {
            event = event.with_player(p);
        }
        self.publish(event);
        true
    }

    /// One pass of state-based actions. Returns whether anything happened.
    pub fn check_state_based_actions(&mut self) -> Result<bool> {
        let mut changed = false;

        let threshold = self.config.poison_threshold;
        let losers: Vec<(PlayerId, &'static str)> = self
            .players
            .values()
            .filter(|p| p.can_respond())
            .filter_map(|p| {
                if p.life <= 0 {
                    Some((p.id, "lost at zero life"))
                } else if p.poison >= threshold {
                    Some((p.id, "lost to poison"))
                } else if p.drew_from_empty_library {
                    Some((p.id, "lost drawing from an empty library"))
                } else {
                    None
                }
            })
            .collect();
        for (player, reason) in losers {
            self.remove_player(player, reason);
            changed = true;
        }

        let mut doomed = Vec::new();
        for id in self.objects.battlefield().collect::<Vec<_>>() {
            let chars = self.characteristics(id)?;
            let object = self.objects.require(id)?;
            let dies = if chars.is_creature() {
                let toughness = chars.toughness_or_zero();
                toughness <= 0 || object.damage >= toughness || object.deathtouch_damage
            } else if chars.has_type(CardType::Planeswalker) {
                object.counter(CounterKind::Loyalty) <= 0
            } else if chars.has_type(CardType::Enchantment) && chars.has_subtype("Aura") {
                !object
                    .attached_to
                    .is_some_and(|host| self.objects.is_in_zone(host, Zone::Battlefield))
            } else {
                false
            };
            if dies {
                doomed.push(id);
            }
        }
        for id in doomed {
            if self.objects.is_in_zone(id, Zone::Battlefield) {
                self.move_object(id, Zone::Graveyard)?;
                changed = true;
            }
        }

        if changed {
            self.publish(Event::new(EventType::StateBasedActions));
        }
        Ok(changed)
    }

    /// Put queued triggers on the stack in APNAP order, or resolve them on
    /// the spot if they don't use the stack.
    fn drain_triggers(&mut self) -> Result<bool> {
        if self.trigger_queue.is_empty() {
            return Ok(false);
        }
        let queue = std::mem::take(&mut self.trigger_queue);
        let count = self.player_count();

        for player in PlayerId::apnap(self.turn.active, count).collect::<Vec<_>>() {
            if !self.players[player].can_respond() {
                continue;
            }
            for pending in queue.iter().filter(|t| t.controller == player) {
                let mut item = StackItem::new(
                    StackItemKind::Triggered { trigger: pending.trigger },
                    pending.controller,
                    pending.name.clone(),
                )
                .with_targets(pending.targets.iter().copied())
                .with_effects(pending.effects.iter().cloned());
                item.source = pending.source;

                if pending.uses_stack {
                    let id = self.stack.push(item);
                    tracing::debug!(
                        item = %id,
                        trigger = %pending.trigger,
                        "trigger put on the stack"
                    );
                } else {
                    self.execute_effects(&item)?;
                }
            }
        }
        Ok(true)
    }
}
