//! Resolving stack items and executing their effects.

use tracing::debug;

use super::state::GameState;
use crate::core::{IllegalAction, Result, RulesError, StackItemId, Target};
use crate::effects::{
    AffectedObjects, ContinuousEffect, ContinuousKind, Duration, ReplacementEffect,
};
use crate::events::{Event, EventType};
use crate::stack::{Legality, LegalityContext, SpellEffect, StackItem};
use crate::zones::{CardType, Zone};

impl GameState {
    /// Resolve the top item of the stack.
    ///
    /// An item whose controller, source or targets are no longer legal
    /// fizzles: it leaves the stack without doing anything and its card goes
    /// to the graveyard.
    pub fn resolve_top(&mut self) -> Result<()> {
        let Some(item) = self.stack.pop() else {
            return Ok(());
        };

        let legality =
            LegalityContext::new(&self.players, &self.objects, &self.stack).check_item(&item);
        if let Legality::Illegal(reason) = legality {
            debug!(item = %item.id, %reason, "stack item fizzled");
            self.log(format!("{} fizzles: {}", item.description, reason));
            self.discard_spell_card(&item)?;
            self.publish(
                Event::new(EventType::StackItemRemoved)
                    .with_target(item.id)
                    .with_player(item.controller)
                    .with_meta("reason", reason),
            );
            return Ok(());
        }

        debug!(item = %item.id, description = %item.description, "resolving");
        self.execute_effects(&item)?;

        if item.is_spell() {
            if let Some(card) = item.source.filter(|&c| self.objects.is_in_zone(c, Zone::Stack)) {
                let object = self.objects.require(card)?;
                if object.is_permanent_card() {
                    let is_aura = object.has_type(CardType::Enchantment)
                        && object.spec.subtypes.iter().any(|s| s == "Aura");
                    self.move_object_as(card, Zone::Battlefield, Some(item.controller))?;
                    if is_aura && self.objects.is_in_zone(card, Zone::Battlefield) {
                        let host = item.object_targets().first().copied();
                        self.objects.require_mut(card)?.attached_to = host;
                    }
                } else {
                    self.move_object(card, Zone::Graveyard)?;
                }
            }
        }

        let mut event = Event::new(EventType::StackItemResolved)
            .with_target(item.id)
            .with_player(item.controller)
            .with_meta("description", item.description.clone());
        event.source = item.source;
        self.publish(event);
        Ok(())
    }

    /// Remove an item from the stack without resolving it.
    pub fn counter_stack_item(&mut self, id: StackItemId) -> Result<StackItem> {
        let item = self.stack.remove(id).ok_or(RulesError::StackItemNotFound(id))?;
        debug!(item = %id, "countered");
        self.log(format!("{} is countered", item.description));
        self.discard_spell_card(&item)?;

        self.publish(
            Event::new(EventType::StackItemRemoved)
                .with_target(id)
                .with_player(item.controller)
                .with_meta("reason", "countered"),
        );
        let mut countered = Event::new(EventType::Countered)
            .with_target(id)
            .with_player(item.controller);
        countered.source = item.source;
        self.publish(countered);
        Ok(item)
    }

    fn discard_spell_card(&mut self, item: &StackItem) -> Result<()> {
        if !item.is_spell() {
            return Ok(());
        }
        if let Some(card) = item.source.filter(|&c| self.objects.is_in_zone(c, Zone::Stack)) {
            self.move_object(card, Zone::Graveyard)?;
        }
        Ok(())
    }

    /// Execute every effect of an item, in order.
    pub fn execute_effects(&mut self, item: &StackItem) -> Result<()> {
        for effect in &item.effects {
            self.execute_effect(item, effect)?;
        }
        Ok(())
    }

    fn execute_effect(&mut self, item: &StackItem, effect: &SpellEffect) -> Result<()> {
        let controller = item.controller;
        match *effect {
            SpellEffect::DealDamage { amount } => {
                for &target in &item.targets {
                    match target {
                        Target::StackItem(_) => {}
                        Target::Player(p)
                            if !self.players.get(p).is_some_and(|pl| pl.can_respond()) => {}
                        Target::Object(o) if !self.objects.is_in_zone(o, Zone::Battlefield) => {}
                        _ => {
                            self.deal_damage(item.source, target, amount)?;
                        }
                    }
                }
            }
            SpellEffect::GainLife { amount } => {
                for p in item.player_targets() {
                    self.change_life(p, amount)?;
                }
            }
            SpellEffect::LoseLife { amount } => {
                for p in item.player_targets() {
                    self.change_life(p, -amount)?;
                }
            }
            SpellEffect::DrawCards { count } => {
                for p in item.player_targets() {
                    self.draw(p, count)?;
                }
            }
            SpellEffect::AddPoison { amount } => {
                for p in item.player_targets() {
                    self.player_mut(p)?.poison += amount;
                }
            }
            SpellEffect::Destroy | SpellEffect::Exile => {
                let to = if *effect == SpellEffect::Destroy {
                    Zone::Graveyard
                } else {
                    Zone::Exile
                };
                for o in item.object_targets() {
                    if self.objects.is_in_zone(o, Zone::Battlefield) {
                        self.move_object(o, to)?;
                    }
                }
            }
            SpellEffect::Pump { power, toughness } => {
                self.grant_until_end_of_turn(
                    item,
                    ContinuousKind::ModifyPowerToughness { power, toughness },
                );
            }
            SpellEffect::GrantKeyword(keyword) => {
                self.grant_until_end_of_turn(item, ContinuousKind::GrantKeyword(keyword));
            }
            SpellEffect::PreventDamage { shield } => {
                let targets: Vec<Target> = if item.targets.is_empty() {
                    vec![Target::Player(controller)]
                } else {
                    item.targets.iter().copied().collect()
                };
                for target in targets {
                    let mut prevention = ReplacementEffect::prevention(
                        controller,
                        Some(target),
                        shield,
                        Duration::EndOfTurn,
                    );
                    prevention.source = item.source;
                    self.add_replacement_effect(prevention);
                }
            }
            SpellEffect::CounterItem => {
                for target in &item.targets {
                    if let Target::StackItem(id) = *target {
                        if self.stack.contains(id) {
                            self.counter_stack_item(id)?;
                        }
                    }
                }
            }
            SpellEffect::GainControl => {
                for o in item.object_targets() {
                    match self.change_control(o, controller) {
                        Ok(()) | Err(RulesError::Illegal(IllegalAction::NotInZone { .. })) => {}
                        Err(e) => return Err(e),
                    }
                }
            }
            SpellEffect::AddCounters { kind, amount } => {
                for o in item.object_targets() {
                    if self.objects.is_in_zone(o, Zone::Battlefield) {
                        self.add_counters(o, kind, amount)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn grant_until_end_of_turn(&mut self, item: &StackItem, kind: ContinuousKind) {
        for o in item.object_targets() {
            if !self.objects.is_in_zone(o, Zone::Battlefield) {
                continue;
            }
            let mut effect = ContinuousEffect::new(
                item.controller,
                AffectedObjects::Object(o),
                kind.clone(),
                Duration::EndOfTurn,
            );
            effect.source = item.source;
            self.add_continuous_effect(effect);
        }
    }
}
