//! Opening hands: the London mulligan.
//!
//! While the mulligan runs, nobody has priority and turn 1 has not begun.
//! A player who mulligans shuffles their hand into their library and draws
//! a full new hand. When they keep, they put one card from it on the bottom
//! of their library for every mulligan taken. The first turn starts as soon
//! as every player still in the game has kept.

use tracing::info;

use super::state::GameState;
use crate::core::{IllegalAction, ObjectId, PlayerId, Result, RulesError};
use crate::events::{Event, EventType};
use crate::zones::{Zone, ZonePosition};

impl GameState {
    /// Open the mulligan for a game whose hands are dealt but which has not
    /// started yet.
    pub fn start_mulligan(&mut self) -> Result<()> {
        self.ensure_running()?;
        if self.turn.turn > 0 {
            return Err(IllegalAction::NotInMulligan.into());
        }
        self.mulligan = true;
        for player in self.players.values_mut() {
            player.mulligans = 0;
            player.kept_hand = false;
        }
        info!(players = self.player_count(), "mulligan started");
        self.log("Mulligan phase started");
        Ok(())
    }

    /// Shuffle the hand away and draw a new one.
    pub fn mulligan(&mut self, player: PlayerId) -> Result<()> {
        self.ensure_undecided(player)?;

        let hand: Vec<ObjectId> = self.objects.in_zone(Zone::Hand, player).collect();
        for card in hand {
            self.objects.relocate(card, Zone::Library, ZonePosition::Top)?;
        }
        self.objects.shuffle_library(player, &mut self.rng);

        let hand_size = self.config.opening_hand_size;
        let mulligans = {
            let p = &mut self.players[player];
            p.mulligans += 1;
            p.mulligans
        };
        self.draw(player, hand_size as u32)?;

        let keeps = hand_size.saturating_sub(mulligans as usize);
        info!(%player, mulligans, keeps, "mulligan");
        let name = self.players[player].name.clone();
        self.log(format!("{name} mulligans to {keeps} cards"));
        self.publish(Event::for_player(EventType::Mulligan, player).with_amount(mulligans as i32));
        Ok(())
    }

    /// Keep the current hand, putting `bottom` on the bottom of the library
    /// in the order given.
    ///
    /// `bottom` must hold exactly one card from the hand per mulligan taken.
    /// Starts the first turn once every remaining player has kept.
    pub fn keep_hand(&mut self, player: PlayerId, bottom: &[ObjectId]) -> Result<()> {
        self.ensure_undecided(player)?;

        let hand_size = self.objects.zone_size(Zone::Hand, player);
        let expected = (self.players[player].mulligans as usize).min(hand_size);
        if bottom.len() != expected {
            return Err(IllegalAction::WrongBottomCount {
                player,
                expected,
                actual: bottom.len(),
            }
            .into());
        }
        for (i, &card) in bottom.iter().enumerate() {
            let in_hand = self
                .objects
                .get(card)
                .is_some_and(|o| o.zone == Zone::Hand && o.owner == player);
            if !in_hand || bottom[..i].contains(&card) {
                return Err(IllegalAction::NotInZone {
                    object: card,
                    zone: Zone::Hand,
                }
                .into());
            }
        }
        for &card in bottom {
            self.objects.relocate(card, Zone::Library, ZonePosition::Bottom)?;
        }

        self.players[player].kept_hand = true;
        let kept = self.objects.zone_size(Zone::Hand, player);
        info!(%player, kept, "kept hand");
        let name = self.players[player].name.clone();
        self.log(format!("{name} keeps their hand"));
        self.publish(Event::for_player(EventType::KeptHand, player).with_amount(kept as i32));

        self.finish_mulligan_if_ready()
    }

    /// Close the mulligan and begin turn 1.
    pub fn end_mulligan(&mut self) -> Result<()> {
        if !self.mulligan {
            return Err(IllegalAction::NotInMulligan.into());
        }
        if !self.all_hands_kept() {
            return Err(IllegalAction::HandsNotKept.into());
        }
        self.mulligan = false;
        info!("mulligan complete");
        self.log("Mulligan phase complete, game starting");
        self.watchers.reset_all();
        self.start()
    }

    /// Every player still in the game has kept.
    #[must_use]
    pub fn all_hands_kept(&self) -> bool {
        self.players.values().filter(|p| p.can_respond()).all(|p| p.kept_hand)
    }

    pub(crate) fn finish_mulligan_if_ready(&mut self) -> Result<()> {
        if self.mulligan && !self.is_over() && self.all_hands_kept() {
            self.end_mulligan()?;
        }
        Ok(())
    }

    fn ensure_undecided(&self, player: PlayerId) -> Result<()> {
        self.ensure_running()?;
        if !self.mulligan {
            return Err(IllegalAction::NotInMulligan.into());
        }
        let p = self.player(player)?;
        if !p.can_respond() {
            return Err(IllegalAction::PlayerLeft(player).into());
        }
        if p.kept_hand {
            return Err(IllegalAction::HandAlreadyKept(player).into());
        }
        Ok(())
    }

    /// Reject anything but mulligan decisions and concessions while hands
    /// are being decided.
    pub(crate) fn ensure_not_in_mulligan(&self) -> Result<()> {
        if self.mulligan {
            return Err(RulesError::from(IllegalAction::MulliganInProgress));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EngineConfig;
    use crate::rules::Step;
    use crate::zones::CardSpec;

    const P0: PlayerId = PlayerId(0);
    const P1: PlayerId = PlayerId(1);

    fn dealt() -> GameState {
        let mut state = GameState::new(EngineConfig::default(), ["Alice", "Bob"], 3);
        for player in [P0, P1] {
            for i in 0..20 {
                let spec = CardSpec::creature(format!("Card {i}"), 1, 1);
                state.create_object(spec, player, Zone::Library);
            }
            state.draw(player, 7).unwrap();
        }
        state.take_events();
        state.start_mulligan().unwrap();
        state
    }

    fn hand(state: &GameState, player: PlayerId) -> Vec<ObjectId> {
        state.objects.in_zone(Zone::Hand, player).collect()
    }

    #[test]
    fn test_mulligan_draws_a_full_hand() {
        let mut state = dealt();
        state.mulligan(P0).unwrap();

        assert_eq!(state.objects.zone_size(Zone::Hand, P0), 7);
        assert_eq!(state.objects.zone_size(Zone::Library, P0), 13);
        assert_eq!(state.players[P0].mulligans, 1);
        assert_eq!(state.messages.back().unwrap(), "Alice mulligans to 6 cards");
        assert!(state.take_events().iter().any(|e| e.event_type == EventType::Mulligan));
    }

    #[test]
    fn test_keep_puts_cards_on_bottom() {
        let mut state = dealt();
        state.mulligan(P0).unwrap();
        state.mulligan(P0).unwrap();

        let cards = hand(&state, P0);
        let bottom = [cards[0], cards[3]];
        assert!(matches!(
            state.keep_hand(P0, &cards[..1]),
            Err(RulesError::Illegal(IllegalAction::WrongBottomCount { expected: 2, actual: 1, .. }))
        ));
        assert!(matches!(
            state.keep_hand(P0, &[cards[0], cards[0]]),
            Err(RulesError::Illegal(IllegalAction::NotInZone { .. }))
        ));

        state.keep_hand(P0, &bottom).unwrap();
        assert_eq!(state.objects.zone_size(Zone::Hand, P0), 5);
        let library: Vec<ObjectId> = state.objects.in_zone(Zone::Library, P0).collect();
        assert_eq!(&library[..2], &[cards[3], cards[0]]);
        assert!(state.players[P0].kept_hand);
        assert!(state.mulligan);
    }

    #[test]
    fn test_kept_hand_is_final() {
        let mut state = dealt();
        state.keep_hand(P0, &[]).unwrap();
        assert!(matches!(
            state.mulligan(P0),
            Err(RulesError::Illegal(IllegalAction::HandAlreadyKept(_)))
        ));
        assert!(matches!(
            state.end_mulligan(),
            Err(RulesError::Illegal(IllegalAction::HandsNotKept))
        ));
    }

    #[test]
    fn test_last_keep_starts_the_game() {
        let mut state = dealt();
        assert_eq!(state.turn.priority, None);

        state.keep_hand(P0, &[]).unwrap();
        state.keep_hand(P1, &[]).unwrap();

        assert!(!state.mulligan);
        assert_eq!(state.turn.turn, 1);
        assert_ne!(state.turn.step, Step::Untap);
        assert_eq!(state.turn.priority, Some(P0));
        assert!(state.messages.iter().any(|m| m == "Mulligan phase complete, game starting"));
        assert!(matches!(
            state.keep_hand(P1, &[]),
            Err(RulesError::Illegal(IllegalAction::NotInMulligan))
        ));
    }
}
