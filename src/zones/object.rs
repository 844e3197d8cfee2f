//! Game objects: cards, tokens and permanents.
//!
//! A `GameObject` stores *base* characteristics and the transient state the
//! rules mutate directly (tapped, damage, combat flags). Derived
//! characteristics (power/toughness after effects, granted keywords, the
//! effective controller) are never stored; ask the layer system for a
//! [`Characteristics`](crate::effects::Characteristics) snapshot instead.
//!
//! Objects are created from a [`CardSpec`]:
//!
//! ```
//! use mtg_rules::zones::{CardSpec, CardType, Keyword};
//!
//! let spec = CardSpec::creature("Serra Angel", 4, 4)
//!     .with_keyword(Keyword::Flying)
//!     .with_keyword(Keyword::Vigilance);
//! assert!(spec.card_types.contains(&CardType::Creature));
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::zone::Zone;
use crate::core::{ObjectId, PlayerId, Target};
use crate::stack::SpellEffect;

/// Card types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    Creature,
    Artifact,
    Enchantment,
    Planeswalker,
    Land,
    Instant,
    Sorcery,
}

impl CardType {
    /// Types whose cards stay on the battlefield after resolving.
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        !matches!(self, CardType::Instant | CardType::Sorcery)
    }
}

/// Keyword abilities the engine understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    Flying,
    Reach,
    FirstStrike,
    DoubleStrike,
    Vigilance,
    Trample,
    Deathtouch,
    Defender,
    Haste,
    Flash,
}

/// Colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    White,
    Blue,
    Black,
    Red,
    Green,
}

/// Counter kinds tracked on objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterKind {
    PlusOne,
    MinusOne,
    Loyalty,
}

/// An activated ability printed on an object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivatedAbility {
    pub description: String,
    /// `{T}` is part of the cost.
    pub tap_cost: bool,
    /// Additional mana cost, handed to the payment capability.
    pub cost: Option<String>,
    pub effects: Vec<SpellEffect>,
}

impl ActivatedAbility {
    /// An ability with no cost.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            tap_cost: false,
            cost: None,
            effects: Vec::new(),
        }
    }

    /// Require tapping the source.
    #[must_use]
    pub fn with_tap_cost(mut self) -> Self {
        self.tap_cost = true;
        self
    }

    /// Add a mana cost.
    #[must_use]
    pub fn with_cost(mut self, cost: impl Into<String>) -> Self {
        self.cost = Some(cost.into());
        self
    }

    /// Add an effect.
    #[must_use]
    pub fn with_effect(mut self, effect: SpellEffect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Printed characteristics used to create an object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSpec {
    pub name: String,
    pub card_types: SmallVec<[CardType; 2]>,
    pub subtypes: SmallVec<[String; 2]>,
    pub colors: SmallVec<[Color; 2]>,
    pub mana_cost: Option<String>,
    pub power: Option<i32>,
    pub toughness: Option<i32>,
    pub loyalty: Option<i32>,
    pub keywords: SmallVec<[Keyword; 4]>,
    pub spell_effects: Vec<SpellEffect>,
    pub activated: Vec<ActivatedAbility>,
}

impl CardSpec {
    /// A card with a name and no types.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A creature card.
    pub fn creature(name: impl Into<String>, power: i32, toughness: i32) -> Self {
        Self::new(name).with_type(CardType::Creature).with_power_toughness(power, toughness)
    }

    /// An instant card.
    pub fn instant(name: impl Into<String>) -> Self {
        Self::new(name).with_type(CardType::Instant)
    }

    /// A sorcery card.
    pub fn sorcery(name: impl Into<String>) -> Self {
        Self::new(name).with_type(CardType::Sorcery)
    }

    /// A planeswalker card with starting loyalty.
    pub fn planeswalker(name: impl Into<String>, loyalty: i32) -> Self {
        let mut spec = Self::new(name).with_type(CardType::Planeswalker);
        spec.loyalty = Some(loyalty);
        spec
    }

    #[must_use]
    pub fn with_type(mut self, card_type: CardType) -> Self {
        if !self.card_types.contains(&card_type) {
            self.card_types.push(card_type);
        }
        self
    }

    #[must_use]
    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtypes.push(subtype.into());
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: Color) -> Self {
        self.colors.push(color);
        self
    }

    #[must_use]
    pub fn with_cost(mut self, cost: impl Into<String>) -> Self {
        self.mana_cost = Some(cost.into());
        self
    }

    #[must_use]
    pub fn with_power_toughness(mut self, power: i32, toughness: i32) -> Self {
        self.power = Some(power);
        self.toughness = Some(toughness);
        self
    }

    #[must_use]
    pub fn with_keyword(mut self, keyword: Keyword) -> Self {
        if !self.keywords.contains(&keyword) {
            self.keywords.push(keyword);
        }
        self
    }

    #[must_use]
    pub fn with_effect(mut self, effect: SpellEffect) -> Self {
        self.spell_effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_ability(mut self, ability: ActivatedAbility) -> Self {
        self.activated.push(ability);
        self
    }
}

/// A card or permanent in a game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameObject {
    pub id: ObjectId,

    /// Owner for the whole life of the object.
    pub owner: PlayerId,

    /// Base controller. Layer 2 effects may override it in snapshots.
    pub controller: PlayerId,

    pub zone: Zone,

    /// Printed characteristics.
    pub spec: CardSpec,

    // === Permanent state ===
    pub tapped: bool,
    pub summoning_sick: bool,
    pub counters: FxHashMap<CounterKind, i32>,
    pub attached_to: Option<ObjectId>,

    // === Damage ===
    pub damage: i32,
    pub damage_sources: FxHashMap<ObjectId, i32>,
    /// Dealt damage by a deathtouch source since damage was last cleared.
    pub deathtouch_damage: bool,

    // === Combat ===
    pub attacking: Option<Target>,
    pub blocking: SmallVec<[ObjectId; 2]>,
}

impl GameObject {
    /// Create an object from a spec.
    #[must_use]
    pub fn new(id: ObjectId, spec: CardSpec, owner: PlayerId, zone: Zone) -> Self {
        let mut object = Self {
            id,
            owner,
            controller: owner,
            zone,
            spec,
            tapped: false,
            summoning_sick: false,
            counters: FxHashMap::default(),
            attached_to: None,
            damage: 0,
            damage_sources: FxHashMap::default(),
            deathtouch_damage: false,
            attacking: None,
            blocking: SmallVec::new(),
        };
        if zone == Zone::Battlefield {
            object.enter_battlefield_counters();
        }
        object
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Printed type check. Use a snapshot for type-changing effects.
    #[must_use]
    pub fn has_type(&self, card_type: CardType) -> bool {
        self.spec.card_types.contains(&card_type)
    }

    #[must_use]
    pub fn is_permanent_card(&self) -> bool {
        self.spec.card_types.iter().any(|t| t.is_permanent())
    }

    #[must_use]
    pub fn is_instant_speed(&self) -> bool {
        self.has_type(CardType::Instant) || self.spec.keywords.contains(&Keyword::Flash)
    }

    #[must_use]
    pub fn counter(&self, kind: CounterKind) -> i32 {
        self.counters.get(&kind).copied().unwrap_or(0)
    }

    pub fn add_counters(&mut self, kind: CounterKind, amount: i32) {
        let entry = self.counters.entry(kind).or_insert(0);
        *entry = (*entry + amount).max(0);
    }

    /// Mark damage from a source.
    pub fn mark_damage(&mut self, amount: i32, source: Option<ObjectId>) {
        if amount <= 0 {
            return;
        }
        self.damage += amount;
        if let Some(source) = source {
            *self.damage_sources.entry(source).or_insert(0) += amount;
        }
    }

    pub fn clear_damage(&mut self) {
        self.damage = 0;
        self.damage_sources.clear();
        self.deathtouch_damage = false;
    }

    pub fn clear_combat(&mut self) {
        self.attacking = None;
        self.blocking.clear();
    }

    /// Forget everything that does not survive a zone change.
    ///
    /// Owner and identity are kept; controller returns to the owner.
    pub fn reset_for_zone(&mut self, zone: Zone) {
        self.zone = zone;
        self.controller = self.owner;
        self.tapped = false;
        self.summoning_sick = zone == Zone::Battlefield;
        self.counters.clear();
        self.attached_to = None;
        self.clear_damage();
        self.clear_combat();
        if zone == Zone::Battlefield {
            self.enter_battlefield_counters();
        }
    }

    fn enter_battlefield_counters(&mut self) {
        if let Some(loyalty) = self.spec.loyalty {
            self.counters.insert(CounterKind::Loyalty, loyalty);
        }
    }
}
