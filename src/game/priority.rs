//! The priority state machine and the actions a player takes with priority.
//!
//! A player keeps priority after acting and gives it up only by passing.
//! Once everyone still in the game has passed in succession, the top of the
//! stack resolves; with an empty stack the game moves to the next step
//! instead.

use tracing::{debug, info};

use super::state::GameState;
use crate::core::{IllegalAction, ObjectId, PlayerId, Result, StackItemId, Target};
use crate::events::{Event, EventType};
use crate::rules::ManaPayment;
use crate::stack::{LegalityContext, StackItem, StackItemKind};
use crate::zones::{CardType, Keyword, Zone};

impl GameState {
    /// Begin the first turn and run forward to the first priority.
    pub fn start(&mut self) -> Result<()> {
        self.ensure_running()?;
        self.turn.begin();
        info!(active = %self.turn.active, players = self.player_count(), "game started");
        self.publish(
            Event::for_player(EventType::ChangePhase, self.turn.active)
                .with_meta("phase", "beginning"),
        );
        self.publish(
            Event::for_player(EventType::ChangeStep, self.turn.active)
                .with_meta("step", self.turn.step.name()),
        );
        self.enter_step()?;
        self.stabilize()?;
        if self.step_gives_priority() {
            self.reset_passed();
            self.give_priority_to_active();
            Ok(())
        } else {
            self.advance_step()
        }
    }

    fn ensure_priority(&self, player: PlayerId) -> Result<()> {
        self.ensure_running()?;
        if !self.player(player)?.can_respond() {
            return Err(IllegalAction::PlayerLeft(player).into());
        }
        if self.turn.priority != Some(player) {
            return Err(IllegalAction::NoPriority(player).into());
        }
        Ok(())
    }

    // === Passing ===

    /// Pass priority.
    pub fn pass_priority(&mut self, player: PlayerId) -> Result<()> {
        self.ensure_priority(player)?;
        self.players[player].passed = true;
        self.clear_priority();
        debug!(%player, step = %self.turn.step, "passed priority");
        self.resume_priority(player)
    }

    /// After `from` gave up priority: hand it on, resolve, or advance.
    pub(crate) fn resume_priority(&mut self, from: PlayerId) -> Result<()> {
        if self.is_over() {
            return Ok(());
        }
        if !self.all_passed() {
            if let Some(next) = self.next_eligible(from) {
                self.give_priority(next);
                return Ok(());
            }
        }

        if !self.stack.is_empty() {
            self.resolve_top()?;
            self.reset_passed();
            self.stabilize()?;
            if !self.is_over() {
                self.give_priority_to_active();
            }
            return Ok(());
        }
        self.advance_step()
    }

    // === Turn progression ===

    /// Whether players get priority in the current step.
    ///
    /// Declare blockers and combat damage are skipped without attackers.
    #[must_use]
    pub fn step_gives_priority(&self) -> bool {
        use crate::rules::Step;
        if !self.turn.step.gives_priority() {
            return false;
        }
        !matches!(self.turn.step, Step::DeclareBlockers | Step::CombatDamage)
            || self.combat.has_attackers()
    }

    /// Move through steps until one gives priority.
    pub(crate) fn advance_step(&mut self) -> Result<()> {
        loop {
            if self.is_over() || self.players.values().all(|p| !p.can_respond()) {
                self.clear_priority();
                return Ok(());
            }
            self.leave_step()?;
            if self.is_over() {
                return Ok(());
            }

            let previous_phase = self.turn.phase();
            let next_active = self.next_active_player();
            if self.turn.advance_step(next_active) {
                self.begin_turn();
            }
            let active = self.turn.active;
            if self.turn.phase() != previous_phase {
                self.publish(
                    Event::for_player(EventType::ChangePhase, active)
                        .with_meta("phase", format!("{:?}", self.turn.phase())),
                );
            }
            let step = self.turn.step.name();
            self.publish(Event::for_player(EventType::ChangeStep, active).with_meta("step", step));
            debug!(turn = self.turn.turn, step = %self.turn.step, %active, "step");

            self.enter_step()?;
            self.stabilize()?;
            if self.is_over() {
                return Ok(());
            }
            if self.step_gives_priority() {
                break;
            }
        }
        self.reset_passed();
        self.give_priority_to_active();
        Ok(())
    }

    fn next_active_player(&self) -> PlayerId {
        let count = self.player_count();
        let active = self.turn.active;
        PlayerId::apnap(active.next(count), count)
            .find(|&p| self.players[p].can_respond())
            .unwrap_or(active)
    }

    fn begin_turn(&mut self) {
        self.combat = crate::combat::CombatState::new();
        info!(turn = self.turn.turn, active = %self.turn.active, "turn started");
        let turn = self.turn.turn;
        self.log(format!("turn {} ({})", turn, self.players[self.turn.active].name));
    }

    // === Casting and activating ===

    /// Cast a spell from hand.
    pub fn cast_spell(
        &mut self,
        player: PlayerId,
        card: ObjectId,
        targets: &[Target],
        payment: &dyn ManaPayment,
    ) -> Result<StackItemId> {
        self.ensure_priority(player)?;
        let object = self.objects.require(card)?;
        if object.zone != Zone::Hand || object.owner != player {
            return Err(IllegalAction::NotInZone { object: card, zone: Zone::Hand }.into());
        }
        let chars = self.characteristics(card)?;
        let instant_speed = chars.has_type(CardType::Instant) || chars.has_keyword(Keyword::Flash);
        if !instant_speed && !self.sorcery_timing(player) {
            return Err(IllegalAction::SorceryTiming(card).into());
        }
        self.check_targets(targets)?;

        let spec = self.objects.require(card)?.spec.clone();
        if let Some(cost) = spec.mana_cost.as_deref() {
            if !payment.pay(player, cost) {
                return Err(IllegalAction::CannotPay {
                    object: card,
                    cost: cost.to_string(),
                }
                .into());
            }
        }

        self.put_on_stack(card, player)?;
        let item = StackItem::new(StackItemKind::Spell, player, spec.name.clone())
            .with_source(card)
            .with_targets(targets.iter().copied())
            .with_effects(spec.spell_effects.iter().cloned());
        let id = self.stack.push(item);
        debug!(%player, item = %id, name = %spec.name, "spell cast");
        self.log(format!("{} casts {}", self.players[player].name, spec.name));
        self.publish(
            Event::new(EventType::SpellCast)
                .with_source(card)
                .with_target(id)
                .with_player(player)
                .with_meta("name", spec.name),
        );

        self.after_action(player)?;
        Ok(id)
    }

    /// Cast the first card in hand with the given name.
    pub fn cast_by_name(
        &mut self,
        player: PlayerId,
        name: &str,
        targets: &[Target],
        payment: &dyn ManaPayment,
    ) -> Result<StackItemId> {
        let card = self
            .objects
            .find_in_hand(player, name)
            .ok_or_else(|| IllegalAction::CardNotInHand { player, name: name.to_string() })?;
        self.cast_spell(player, card, targets, payment)
    }

    /// Activate an ability of a permanent.
    pub fn activate_ability(
        &mut self,
        player: PlayerId,
        source: ObjectId,
        index: usize,
        targets: &[Target],
        payment: &dyn ManaPayment,
    ) -> Result<StackItemId> {
        self.ensure_priority(player)?;
        let chars = self.characteristics(source)?;
        if chars.zone != Zone::Battlefield {
            return Err(IllegalAction::NotInZone { object: source, zone: Zone::Battlefield }.into());
        }
        if chars.controller != player {
            return Err(IllegalAction::NotController { object: source, player }.into());
        }
        let object = self.objects.require(source)?;
        let ability = object
            .spec
            .activated
            .get(index)
            .cloned()
            .ok_or(IllegalAction::NoSuchAbility { object: source, index })?;
        if ability.tap_cost {
            if object.tapped {
                return Err(IllegalAction::Tapped(source).into());
            }
            if object.summoning_sick && chars.is_creature() && !chars.has_keyword(Keyword::Haste) {
                return Err(IllegalAction::SummoningSick(source).into());
            }
        }
        self.check_targets(targets)?;
        if let Some(cost) = ability.cost.as_deref() {
            if !payment.pay(player, cost) {
                return Err(IllegalAction::CannotPay {
                    object: source,
                    cost: cost.to_string(),
                }
                .into());
            }
        }
        if ability.tap_cost {
            self.objects.require_mut(source)?.tapped = true;
        }

        let item = StackItem::new(
            StackItemKind::Activated { index },
            player,
            ability.description.clone(),
        )
        .with_source(source)
        .with_targets(targets.iter().copied())
        .with_effects(ability.effects);
        let id = self.stack.push(item);
        debug!(%player, item = %id, source = %source, index, "ability activated");
        self.publish(
            Event::new(EventType::AbilityActivated)
                .with_source(source)
                .with_target(id)
                .with_player(player)
                .with_amount(index as i32),
        );

        self.after_action(player)?;
        Ok(id)
    }

    // === Other actions ===

    /// Change a player's life total as an action. The player keeps priority.
    pub fn adjust_life(&mut self, player: PlayerId, delta: i32) -> Result<i32> {
        self.ensure_priority(player)?;
        let applied = self.change_life(player, delta)?;
        self.after_action(player)?;
        Ok(applied)
    }

    /// Counter a stack item as an action. Priority moves on afterwards.
    pub fn counter_action(&mut self, player: PlayerId, item: StackItemId) -> Result<()> {
        self.ensure_priority(player)?;
        self.counter_stack_item(item)?;
        self.reset_passed();
        self.stabilize()?;
        if self.is_over() {
            return Ok(());
        }
        match self.next_eligible(player) {
            Some(next) => self.give_priority(next),
            None => self.give_priority(player),
        }
        Ok(())
    }

    /// Concede. The player leaves on the stabilization pass this runs.
    pub fn concede(&mut self, player: PlayerId) -> Result<()> {
        self.ensure_running()?;
        if !self.player(player)?.can_respond() {
            return Err(IllegalAction::PlayerLeft(player).into());
        }
        self.request_concession(player)?;
        self.stabilize()?;
        if self.is_over() {
            return Ok(());
        }
        if self.mulligan {
            return self.finish_mulligan_if_ready();
        }
        let holder_gone = self
            .turn
            .priority
            .map_or(true, |p| !self.players[p].can_respond());
        if holder_gone {
            self.resume_priority(player)?;
        }
        Ok(())
    }

    // === Helpers ===

    /// Whether `player` could cast a sorcery right now.
    #[must_use]
    pub fn sorcery_timing(&self, player: PlayerId) -> bool {
        self.turn.active == player && self.turn.step.is_main() && self.stack.is_empty()
    }

    fn check_targets(&self, targets: &[Target]) -> Result<()> {
        let ctx = LegalityContext::new(&self.players, &self.objects, &self.stack);
        match targets.iter().find(|&&t| !ctx.target_is_legal(t)) {
            Some(&target) => Err(IllegalAction::InvalidTarget(target).into()),
            None => Ok(()),
        }
    }

    /// Everyone gets to respond again; the actor keeps priority.
    fn after_action(&mut self, player: PlayerId) -> Result<()> {
        self.reset_passed();
        self.stabilize()?;
        if !self.is_over() && self.players[player].can_respond() {
            self.give_priority(player);
        }
        Ok(())
    }
}
