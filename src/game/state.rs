//! The complete state of one game and its primitive operations.
//!
//! Every mutation that the rules care about goes through a method here so
//! that replacement effects run first and the resulting event is published
//! exactly once. Higher-level operations (priority, combat, state-based
//! actions) are built from these.

use im::Vector;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::combat::CombatState;
use crate::core::{
    EffectId, EngineConfig, GameRng, IllegalAction, ObjectId, Player, PlayerId, PlayerMap, Result,
    RulesError, Target, TriggerId,
};
use crate::effects::{
    Characteristics, CleanupPass, ContinuousEffect, EffectRegistry, ReplacementEffect,
};
use crate::events::{
    Event, EventType, PendingTrigger, TriggerRegistry, TriggeredAbility, WatcherRegistry,
};
use crate::rules::{GameResult, TurnManager};
use crate::stack::SpellStack;
use crate::zones::{CardSpec, CardType, CounterKind, Keyword, ObjectStore, Zone, ZonePosition};

/// Everything that makes up a game at one moment.
///
/// Cloning is cheap enough to take a bookmark before every action: the
/// object store and the message log are persistent vectors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameState {
    pub config: EngineConfig,
    pub players: PlayerMap<Player>,
    pub objects: ObjectStore,
    pub stack: SpellStack,
    pub turn: TurnManager,
    pub effects: EffectRegistry,
    pub triggers: TriggerRegistry,
    /// Fired triggers waiting for the next stabilization pass.
    pub trigger_queue: Vec<PendingTrigger>,
    pub watchers: WatcherRegistry,
    pub combat: CombatState,
    pub messages: Vector<String>,
    pub rng: GameRng,
    pub result: Option<GameResult>,
    /// Players who conceded and leave on the next stabilization pass.
    pub pending_concessions: Vec<PlayerId>,
    /// How often the stabilization loop hit its cap.
    pub stabilization_trips: u64,
    /// Opening hands are still being decided; the first turn has not begun.
    pub mulligan: bool,

    /// Events published since the last flush.
    #[serde(skip)]
    outbox: Vec<Event>,
}

impl GameState {
    /// A game that has not started yet: empty zones, turn 0.
    pub fn new<S: Into<String>>(
        config: EngineConfig,
        names: impl IntoIterator<Item = S>,
        seed: u64,
    ) -> Self {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let count = names.len();
        let life = config.starting_life;
        let players = PlayerMap::new(count, |id| Player::new(id, names[id.index()].clone(), life));
        let replacement_cap = config.replacement_cap;

        Self {
            config,
            players,
            objects: ObjectStore::new(count),
            stack: SpellStack::new(),
            turn: TurnManager::new(PlayerId::new(0)),
            effects: EffectRegistry::new(replacement_cap),
            triggers: TriggerRegistry::new(),
            trigger_queue: Vec::new(),
            watchers: WatcherRegistry::with_defaults(),
            combat: CombatState::new(),
            messages: Vector::new(),
            rng: GameRng::new(seed),
            result: None,
            pending_concessions: Vec::new(),
            stabilization_trips: 0,
            mulligan: false,
            outbox: Vec::new(),
        }
    }

    // === Queries ===

    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.player_count()
    }

    pub fn player(&self, id: PlayerId) -> Result<&Player> {
        self.players.get(id).ok_or(RulesError::PlayerNotFound(id))
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player> {
        self.players.get_mut(id).ok_or(RulesError::PlayerNotFound(id))
    }

    #[must_use]
    pub fn is_over(&self) -> bool {
        self.result.is_some()
    }

    pub fn ensure_running(&self) -> Result<()> {
        if self.is_over() {
            return Err(RulesError::GameOver);
        }
        Ok(())
    }

    /// Derived characteristics of an object.
    pub fn characteristics(&self, id: ObjectId) -> Result<Characteristics> {
        self.effects.characteristics(id, &self.objects)
    }

    /// Derived controller, falling back to the stored one.
    #[must_use]
    pub fn controller_of(&self, id: ObjectId) -> Option<PlayerId> {
        match self.characteristics(id) {
            Ok(c) => Some(c.controller),
            Err(_) => self.objects.get(id).map(|o| o.controller),
        }
    }

    /// Total loop-guard trips, stabilization and replacement combined.
    #[must_use]
    pub fn loop_guard_trips(&self) -> u64 {
        self.stabilization_trips + self.effects.replacements.guard_trips()
    }

    // === Setup ===

    /// Create an object directly in a zone, outside of any rules action.
    pub fn create_object(&mut self, spec: CardSpec, owner: PlayerId, zone: Zone) -> ObjectId {
        self.objects.create(spec, owner, zone)
    }

    pub fn add_continuous_effect(&mut self, effect: ContinuousEffect) -> EffectId {
        self.effects.add_continuous(effect)
    }

    pub fn add_replacement_effect(&mut self, effect: ReplacementEffect) -> EffectId {
        self.effects.add_replacement(effect)
    }

    pub fn register_trigger(&mut self, ability: TriggeredAbility) -> TriggerId {
        self.triggers.register(ability)
    }

    // === Events ===

    /// Publish an event in its final form.
    ///
    /// Watchers and triggers see it now; bus subscribers see it when the
    /// owning [`Game`](super::Game) flushes the outbox.
    pub fn publish(&mut self, event: Event) {
        trace!(
            event_type = ?event.event_type,
            source = ?event.source,
            amount = event.amount,
            "publish"
        );
        self.watchers.notify(&event);
        let fired = self.triggers.collect(&event, &self.objects, self.player_count());
        self.trigger_queue.extend(fired);
        self.outbox.push(event);
    }

    /// Drain the events published since the last call.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }

    /// Append to the game log.
    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(%message, "game log");
        self.messages.push_back(message);
    }

    // === Zone moves ===

    /// Move an object between zones.
    ///
    /// The move is run through replacement effects first, so the object
    /// may end up somewhere else. Returns the zone it left, or `None` if
    /// the move was replaced away entirely.
    pub fn move_object(&mut self, id: ObjectId, to: Zone) -> Result<Option<Zone>> {
        self.move_object_as(id, to, None)
    }

    /// As [`move_object`](Self::move_object), entering under `controller`.
    pub(crate) fn move_object_as(
        &mut self,
        id: ObjectId,
        to: Zone,
        controller: Option<PlayerId>,
    ) -> Result<Option<Zone>> {
        self.objects.check_destination(id, to)?;
        let from = self.objects.require(id)?.zone;

        let outcome = self.effects.resolve(Event::zone_change(id, from, to));
        if outcome.completely_replaced {
            debug!(object = %id, "zone change replaced");
            return Ok(None);
        }
        let mut event = outcome.event;
        let destination = event.zone.unwrap_or(to);
        self.objects.check_destination(id, destination)?;

        let before = self.characteristics(id)?;
        self.objects.relocate(id, destination, ZonePosition::Top)?;
        if let Some(controller) = controller.filter(|_| destination == Zone::Battlefield) {
            self.objects.require_mut(id)?.controller = controller;
        }
        let now_controlled_by = self.objects.require(id)?.controller;

        event.player = Some(if destination == Zone::Battlefield {
            now_controlled_by
        } else {
            before.controller
        });
        self.publish(event);

        if destination == Zone::Battlefield {
            self.publish(
                Event::new(EventType::EntersTheBattlefield)
                    .with_source(id)
                    .with_target(id)
                    .with_player(now_controlled_by)
                    .with_from_zone(from)
                    .with_zone(Zone::Battlefield)
                    .with_flag(before.is_creature()),
            );
        }
        if from == Zone::Battlefield && destination == Zone::Graveyard {
            self.publish(
                Event::new(EventType::PermanentDies)
                    .with_source(id)
                    .with_target(id)
                    .with_player(before.controller)
                    .with_from_zone(Zone::Battlefield)
                    .with_zone(Zone::Graveyard)
                    .with_flag(before.is_creature()),
            );
        }
        if from == Zone::Battlefield && destination != Zone::Battlefield {
            self.left_battlefield(id);
        }

        Ok(Some(from))
    }

    /// Move a card from hand to the stack as part of casting it.
    pub(crate) fn put_on_stack(&mut self, id: ObjectId, caster: PlayerId) -> Result<()> {
        let from = self.objects.put_on_stack(id, caster)?;
        self.publish(Event::zone_change(id, from, Zone::Stack).with_player(caster));
        Ok(())
    }

    fn left_battlefield(&mut self, id: ObjectId) {
        self.effects.cleanup(CleanupPass::SourceLeft(id));
        if self.combat.remove_object(id) {
            self.publish(Event::new(EventType::RemovedFromCombat).with_source(id).with_target(id));
        }
        for other in self.objects.battlefield().collect::<Vec<_>>() {
            if let Some(obj) = self.objects.get_mut(other) {
                obj.blocking.retain(|&mut a| a != id);
            }
        }
    }

    // === Damage and life ===

    /// Deal damage through the replacement engine. Returns the amount dealt.
    ///
    /// Players lose life, planeswalkers lose loyalty and other permanents
    /// have the damage marked.
    pub fn deal_damage(
        &mut self,
        source: Option<ObjectId>,
        target: Target,
        amount: i32,
    ) -> Result<i32> {
        if amount <= 0 {
            return Ok(0);
        }
        let deathtouch = source
            .and_then(|s| self.characteristics(s).ok())
            .is_some_and(|c| c.has_keyword(Keyword::Deathtouch));

        let outcome = self.effects.resolve(Event::damage(source, target, amount));
        if outcome.completely_replaced {
            debug!(?source, %target, amount, "damage prevented");
            return Ok(0);
        }
        let mut event = outcome.event;
        let dealt = event.amount;

        match target {
            Target::Player(p) => {
                let player = self.player_mut(p)?;
                if !player.can_respond() {
                    return Ok(0);
                }
                player.life -= dealt;
                event.player = Some(p);
            }
            Target::Object(o) => {
                let chars = self.characteristics(o)?;
                if chars.zone != Zone::Battlefield {
                    return Ok(0);
                }
                let object = self.objects.require_mut(o)?;
                if chars.has_type(CardType::Planeswalker) && !chars.is_creature() {
                    object.add_counters(CounterKind::Loyalty, -dealt);
                } else {
                    object.mark_damage(dealt, source);
                    if deathtouch {
                        object.deathtouch_damage = true;
                    }
                }
                event.player = Some(chars.controller);
            }
            Target::StackItem(_) => return Err(IllegalAction::InvalidTarget(target).into()),
        }

        event.flag = deathtouch;
        self.publish(event);
        Ok(dealt)
    }

    /// Gain (positive) or lose (negative) life through the replacement
    /// engine. Returns the signed change actually applied.
    pub fn change_life(&mut self, player: PlayerId, delta: i32) -> Result<i32> {
        if delta == 0 || !self.player(player)?.can_respond() {
            return Ok(0);
        }
        let event_type = if delta > 0 { EventType::GainedLife } else { EventType::LostLife };
        let outcome = self.effects.resolve(
            Event::for_player(event_type, player)
                .with_target(player)
                .with_amount(delta.abs()),
        );
        if outcome.completely_replaced {
            return Ok(0);
        }
        let applied = if delta > 0 { outcome.event.amount } else { -outcome.event.amount };
        self.player_mut(player)?.life += applied;
        self.publish(outcome.event);
        Ok(applied)
    }

    /// Draw cards. Drawing from an empty library flags the player.
    /// Returns how many cards were drawn.
    pub fn draw(&mut self, player: PlayerId, count: u32) -> Result<u32> {
        let mut drawn = 0;
        for _ in 0..count {
            let Some(card) = self.objects.top_of_library(player) else {
                debug!(%player, "draw from empty library");
                self.player_mut(player)?.drew_from_empty_library = true;
                break;
            };
            self.move_object(card, Zone::Hand)?;
            self.publish(
                Event::for_player(EventType::DrewCard, player).with_source(card).with_amount(1),
            );
            drawn += 1;
        }
        Ok(drawn)
    }

    pub fn add_counters(&mut self, id: ObjectId, kind: CounterKind, amount: i32) -> Result<()> {
        let object = self.objects.require_mut(id)?;
        object.add_counters(kind, amount);
        let controller = object.controller;
        self.publish(
            Event::new(EventType::CountersAdded)
                .with_target(id)
                .with_player(controller)
                .with_amount(amount)
                .with_meta("counter", format!("{:?}", kind)),
        );
        Ok(())
    }

    /// Give control of a permanent to another player.
    pub fn change_control(&mut self, id: ObjectId, new_controller: PlayerId) -> Result<()> {
        if !self.objects.is_in_zone(id, Zone::Battlefield) {
            return Err(IllegalAction::NotInZone { object: id, zone: Zone::Battlefield }.into());
        }
        if !self.player(new_controller)?.can_respond() {
            return Err(IllegalAction::PlayerLeft(new_controller).into());
        }
        let old = self.objects.require(id)?.controller;
        if old == new_controller {
            return Ok(());
        }

        self.publish(
            Event::new(EventType::LoseControl)
                .with_source(id)
                .with_target(id)
                .with_player(old),
        );
        self.objects.require_mut(id)?.controller = new_controller;
        if self.combat.remove_object(id) {
            if let Some(obj) = self.objects.get_mut(id) {
                obj.clear_combat();
            }
            self.publish(Event::new(EventType::RemovedFromCombat).with_source(id).with_target(id));
        }
        self.publish(
            Event::new(EventType::GainControl)
                .with_source(id)
                .with_target(id)
                .with_player(new_controller),
        );
        self.effects.cleanup(CleanupPass::ControlChanged { source: id, new_controller });
        debug!(object = %id, from = %old, to = %new_controller, "control changed");
        Ok(())
    }

    // === Priority bookkeeping ===

    /// The next player after `after` who can still act and has not passed.
    #[must_use]
    pub fn next_eligible(&self, after: PlayerId) -> Option<PlayerId> {
        let count = self.player_count();
        PlayerId::apnap(after.next(count), count)
            .find(|&p| self.players.get(p).is_some_and(|pl| pl.can_respond() && !pl.passed))
    }

    /// Every player who can respond has passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.players.values().all(|p| p.passed || !p.can_respond())
    }

    /// Clear passes; players who lost or left stay passed.
    pub fn reset_passed(&mut self) {
        for player in self.players.values_mut() {
            player.passed = !player.can_respond();
        }
    }

    /// Hand priority to a player.
    pub fn give_priority(&mut self, player: PlayerId) {
        for p in self.players.values_mut() {
            p.has_priority = p.id == player;
        }
        if self.turn.priority != Some(player) {
            self.turn.priority = Some(player);
            self.publish(Event::for_player(EventType::PriorityChanged, player));
        }
    }

    pub(crate) fn clear_priority(&mut self) {
        for p in self.players.values_mut() {
            p.has_priority = false;
        }
        self.turn.priority = None;
    }

    /// Give priority to the active player, or the next one still in the
    /// game. Returns `false` if nobody can take it.
    pub(crate) fn give_priority_to_active(&mut self) -> bool {
        let active = self.turn.active;
        let count = self.player_count();
        match PlayerId::apnap(active, count).find(|&p| self.players[p].can_respond()) {
            Some(p) => {
                self.give_priority(p);
                true
            }
            None => {
                self.clear_priority();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{Duration, ReplacementKind};

    const P0: PlayerId = PlayerId(0);
    const P1: PlayerId = PlayerId(1);

    fn state() -> GameState {
        GameState::new(EngineConfig::default(), ["Alice", "Bob"], 1)
    }

    #[test]
    fn test_new_state() {
        let state = state();
        assert_eq!(state.player_count(), 2);
        assert_eq!(state.players[P1].name, "Bob");
        assert_eq!(state.players[P0].life, 20);
        assert!(!state.is_over());
        assert!(matches!(state.player(PlayerId(7)), Err(RulesError::PlayerNotFound(_))));
    }

    #[test]
    fn test_move_to_graveyard_publishes_dies() {
        let mut state = state();
        let bear = state.create_object(CardSpec::creature("Bear", 2, 2), P1, Zone::Battlefield);

        assert_eq!(state.move_object(bear, Zone::Graveyard).unwrap(), Some(Zone::Battlefield));
        let events = state.take_events();
        let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::ZoneChange, EventType::PermanentDies]);
        assert!(events[1].flag);
        assert_eq!(events[0].metadata.get("target_zone").map(String::as_str), Some("graveyard"));
    }

    #[test]
    fn test_redirected_move() {
        let mut state = state();
        let bear = state.create_object(CardSpec::creature("Bear", 2, 2), P1, Zone::Battlefield);
        state.add_replacement_effect(ReplacementEffect::new(
            P0,
            ReplacementKind::RedirectZone {
                object: Some(bear),
                instead_of: Zone::Graveyard,
                to: Zone::Exile,
            },
            Duration::Permanent,
        ));

        state.move_object(bear, Zone::Graveyard).unwrap();
        assert_eq!(state.objects.zone_of(bear), Some(Zone::Exile));
        assert!(state.take_events().iter().all(|e| e.event_type != EventType::PermanentDies));
    }

    #[test]
    fn test_move_to_stack_rejected() {
        let mut state = state();
        let card = state.create_object(CardSpec::instant("Shock"), P0, Zone::Hand);
        assert!(matches!(
            state.move_object(card, Zone::Stack),
            Err(RulesError::Illegal(IllegalAction::MoveToStack(_)))
        ));
    }

    #[test]
    fn test_damage_kinds() {
        let mut state = state();
        let bear = state.create_object(CardSpec::creature("Bear", 2, 2), P1, Zone::Battlefield);
        let walker = state.create_object(CardSpec::planeswalker("Jace", 3), P1, Zone::Battlefield);

        assert_eq!(state.deal_damage(None, Target::Player(P1), 3).unwrap(), 3);
        assert_eq!(state.players[P1].life, 17);

        state.deal_damage(Some(walker), Target::Object(bear), 1).unwrap();
        assert_eq!(state.objects.get(bear).unwrap().damage, 1);

        state.deal_damage(None, Target::Object(walker), 2).unwrap();
        assert_eq!(state.objects.get(walker).unwrap().counter(CounterKind::Loyalty), 1);
    }

    #[test]
    fn test_deathtouch_marks() {
        let mut state = state();
        let viper = state.create_object(
            CardSpec::creature("Viper", 1, 1).with_keyword(Keyword::Deathtouch),
            P0,
            Zone::Battlefield,
        );
        let giant = state.create_object(CardSpec::creature("Giant", 6, 6), P1, Zone::Battlefield);

        state.deal_damage(Some(viper), Target::Object(giant), 1).unwrap();
        assert!(state.objects.get(giant).unwrap().deathtouch_damage);
    }

    #[test]
    fn test_change_life_events() {
        let mut state = state();
        assert_eq!(state.change_life(P0, 4).unwrap(), 4);
        assert_eq!(state.change_life(P0, -6).unwrap(), -6);
        assert_eq!(state.players[P0].life, 18);

        let types: Vec<_> = state.take_events().iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::GainedLife, EventType::LostLife]);
    }

    #[test]
    fn test_draw_from_empty_library() {
        let mut state = state();
        let card = state.create_object(CardSpec::creature("Bear", 2, 2), P0, Zone::Library);

        assert_eq!(state.draw(P0, 2).unwrap(), 1);
        assert_eq!(state.objects.zone_of(card), Some(Zone::Hand));
        assert!(state.players[P0].drew_from_empty_library);
        let drawn = state.watchers.of_kind(crate::events::WatcherKind::CardsDrawn).unwrap();
        assert_eq!(drawn.total(), 1);
    }

    #[test]
    fn test_change_control() {
        let mut state = state();
        let bear = state.create_object(CardSpec::creature("Bear", 2, 2), P1, Zone::Battlefield);

        state.change_control(bear, P0).unwrap();
        assert_eq!(state.controller_of(bear), Some(P0));
        let types: Vec<_> = state.take_events().iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::LoseControl, EventType::GainControl]);

        state.players[P1].left = true;
        assert!(state.change_control(bear, P1).is_err());
    }

    #[test]
    fn test_priority_helpers() {
        let mut state = GameState::new(EngineConfig::default(), ["A", "B", "C"], 1);
        state.players[PlayerId(1)].lost = true;
        state.reset_passed();

        assert!(state.players[PlayerId(1)].passed);
        assert_eq!(state.next_eligible(PlayerId(0)), Some(PlayerId(2)));

        state.give_priority(PlayerId(2));
        assert!(state.players[PlayerId(2)].has_priority);
        assert_eq!(state.turn.priority, Some(PlayerId(2)));
    }
}
