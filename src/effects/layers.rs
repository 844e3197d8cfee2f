//! Continuous effects applied in layer order.
//!
//! Characteristics are never stored on an object after modification.
//! Every read goes through [`LayerSystem::characteristics`], which starts
//! from the printed values and applies effects layer by layer:
//!
//! | Layer | Kinds |
//! |-------|-------|
//! | 1 Copy | `BecomeCopy` |
//! | 2 Control | `SetController` |
//! | 3 Text | `ChangeSubtype` |
//! | 4 Type | `AddTypes` |
//! | 5 Color | `SetColors` |
//! | 6 Ability | keyword grants/removals, attack/block restrictions |
//! | 7 Power/toughness | `SetBasePowerToughness`, `ModifyPowerToughness`, `SwitchPowerToughness` |
//!
//! Within a layer effects apply in the order they were added. Counters are
//! applied after layer 7. Which objects an effect affects is decided
//! against the partially computed snapshot, so a layer 4 type change
//! makes a non-creature eligible for a layer 7 "creatures you control"
//! bonus.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::duration::{CleanupPass, Duration};
use crate::core::{EffectId, ObjectId, PlayerId, Result};
use crate::zones::{CardSpec, CardType, Color, CounterKind, GameObject, Keyword, ObjectStore, Zone};

/// The seven layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Layer {
    Copy = 1,
    Control = 2,
    Text = 3,
    Type = 4,
    Color = 5,
    Ability = 6,
    PowerToughness = 7,
}

impl Layer {
    pub const ALL: [Layer; 7] = [
        Layer::Copy,
        Layer::Control,
        Layer::Text,
        Layer::Type,
        Layer::Color,
        Layer::Ability,
        Layer::PowerToughness,
    ];

    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8
    }
}

/// Derived characteristics of an object at one moment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristics {
    pub object: ObjectId,
    pub name: String,
    pub owner: PlayerId,
    pub controller: PlayerId,
    pub zone: Zone,
    pub card_types: SmallVec<[CardType; 2]>,
    pub subtypes: SmallVec<[String; 2]>,
    pub colors: SmallVec<[Color; 2]>,
    pub keywords: SmallVec<[Keyword; 4]>,
    pub base_power: Option<i32>,
    pub base_toughness: Option<i32>,
    pub power: Option<i32>,
    pub toughness: Option<i32>,
    pub cant_attack: bool,
    pub cant_block: bool,
    pub must_attack: bool,
}

impl Characteristics {
    /// Printed values of an object, before any effect.
    #[must_use]
    pub fn printed(object: &GameObject) -> Self {
        let spec = &object.spec;
        Self {
            object: object.id,
            name: spec.name.clone(),
            owner: object.owner,
            controller: object.controller,
            zone: object.zone,
            card_types: spec.card_types.clone(),
            subtypes: spec.subtypes.clone(),
            colors: spec.colors.clone(),
            keywords: spec.keywords.clone(),
            base_power: spec.power,
            base_toughness: spec.toughness,
            power: spec.power,
            toughness: spec.toughness,
            cant_attack: false,
            cant_block: false,
            must_attack: false,
        }
    }

    #[must_use]
    pub fn has_type(&self, card_type: CardType) -> bool {
        self.card_types.contains(&card_type)
    }

    #[must_use]
    pub fn is_creature(&self) -> bool {
        self.has_type(CardType::Creature)
    }

    #[must_use]
    pub fn has_keyword(&self, keyword: Keyword) -> bool {
        self.keywords.contains(&keyword)
    }

    #[must_use]
    pub fn has_subtype(&self, subtype: &str) -> bool {
        self.subtypes.iter().any(|s| s == subtype)
    }

    /// Power, treating "no power" as zero.
    #[must_use]
    pub fn power_or_zero(&self) -> i32 {
        self.power.unwrap_or(0)
    }

    /// Toughness, treating "no toughness" as zero.
    #[must_use]
    pub fn toughness_or_zero(&self) -> i32 {
        self.toughness.unwrap_or(0)
    }

    fn add_keyword(&mut self, keyword: Keyword) {
        if !self.keywords.contains(&keyword) {
            self.keywords.push(keyword);
        }
    }

    fn copy_from(&mut self, spec: &CardSpec) {
        self.name = spec.name.clone();
        self.card_types = spec.card_types.clone();
        self.subtypes = spec.subtypes.clone();
        self.colors = spec.colors.clone();
        self.keywords = spec.keywords.clone();
        self.base_power = spec.power;
        self.base_toughness = spec.toughness;
        self.power = spec.power;
        self.toughness = spec.toughness;
    }

    fn modify_pt(&mut self, power: i32, toughness: i32) {
        if let Some(p) = self.power.as_mut() {
            *p += power;
        }
        if let Some(t) = self.toughness.as_mut() {
            *t += toughness;
        }
    }
}

/// Which objects a continuous effect applies to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AffectedObjects {
    /// One object, in any zone.
    Object(ObjectId),
    /// Creatures on the battlefield controlled by a player.
    CreaturesControlledBy(PlayerId),
    /// As above, excluding the effect's own source.
    OtherCreaturesControlledBy(PlayerId),
    /// Every creature on the battlefield.
    AllCreatures,
    /// The object the effect's source is attached to.
    AttachedToSource,
}

/// What a continuous effect does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContinuousKind {
    // Layer 1
    BecomeCopy(Box<CardSpec>),
    // Layer 2
    SetController(PlayerId),
    // Layer 3
    ChangeSubtype { from: String, to: String },
    // Layer 4
    AddTypes {
        types: SmallVec<[CardType; 2]>,
        subtypes: SmallVec<[String; 2]>,
    },
    // Layer 5
    SetColors(SmallVec<[Color; 2]>),
    // Layer 6
    GrantKeyword(Keyword),
    RemoveKeyword(Keyword),
    RemoveAllAbilities,
    CantAttack,
    CantBlock,
    MustAttack,
    // Layer 7
    SetBasePowerToughness { power: i32, toughness: i32 },
    ModifyPowerToughness { power: i32, toughness: i32 },
    SwitchPowerToughness,
}

impl ContinuousKind {
    #[must_use]
    pub fn layer(&self) -> Layer {
        match self {
            Self::BecomeCopy(_) => Layer::Copy,
            Self::SetController(_) => Layer::Control,
            Self::ChangeSubtype { .. } => Layer::Text,
            Self::AddTypes { .. } => Layer::Type,
            Self::SetColors(_) => Layer::Color,
            Self::GrantKeyword(_)
            | Self::RemoveKeyword(_)
            | Self::RemoveAllAbilities
            | Self::CantAttack
            | Self::CantBlock
            | Self::MustAttack => Layer::Ability,
            Self::SetBasePowerToughness { .. }
            | Self::ModifyPowerToughness { .. }
            | Self::SwitchPowerToughness => Layer::PowerToughness,
        }
    }

    fn apply(&self, snapshot: &mut Characteristics) {
        match self {
            Self::BecomeCopy(spec) => snapshot.copy_from(spec),
            Self::SetController(player) => snapshot.controller = *player,
            Self::ChangeSubtype { from, to } => {
                let matching = snapshot.subtypes.iter_mut().filter(|s| s.as_str() == from.as_str());
                for subtype in matching {
                    subtype.clone_from(to);
                }
            }
            Self::AddTypes { types, subtypes } => {
                for t in types {
                    if !snapshot.card_types.contains(t) {
                        snapshot.card_types.push(*t);
                    }
                }
                for s in subtypes {
                    if !snapshot.has_subtype(s) {
                        snapshot.subtypes.push(s.clone());
                    }
                }
            }
            Self::SetColors(colors) => snapshot.colors = colors.clone(),
            Self::GrantKeyword(keyword) => snapshot.add_keyword(*keyword),
            Self::RemoveKeyword(keyword) => snapshot.keywords.retain(|k| k != keyword),
            Self::RemoveAllAbilities => snapshot.keywords.clear(),
            Self::CantAttack => snapshot.cant_attack = true,
            Self::CantBlock => snapshot.cant_block = true,
            Self::MustAttack => snapshot.must_attack = true,
            Self::SetBasePowerToughness { power, toughness } => {
                snapshot.base_power = Some(*power);
                snapshot.base_toughness = Some(*toughness);
                snapshot.power = Some(*power);
                snapshot.toughness = Some(*toughness);
            }
            Self::ModifyPowerToughness { power, toughness } => {
                snapshot.modify_pt(*power, *toughness)
            }
            Self::SwitchPowerToughness => {
                std::mem::swap(&mut snapshot.power, &mut snapshot.toughness);
            }
        }
    }
}

/// A registered continuous effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuousEffect {
    pub id: EffectId,
    pub source: Option<ObjectId>,
    pub controller: PlayerId,
    pub affected: AffectedObjects,
    pub kind: ContinuousKind,
    pub duration: Duration,
}

impl ContinuousEffect {
    /// Build an effect; the id is assigned on registration.
    pub fn new(
        controller: PlayerId,
        affected: AffectedObjects,
        kind: ContinuousKind,
        duration: Duration,
    ) -> Self {
        Self {
            id: EffectId::new(0),
            source: None,
            controller,
            affected,
            kind,
            duration,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: ObjectId) -> Self {
        self.source = Some(source);
        self
    }

    /// "Creatures you control get +N/+N" style effect.
    pub fn anthem(
        source: ObjectId,
        controller: PlayerId,
        power: i32,
        toughness: i32,
        include_self: bool,
    ) -> Self {
        let affected = if include_self {
            AffectedObjects::CreaturesControlledBy(controller)
        } else {
            AffectedObjects::OtherCreaturesControlledBy(controller)
        };
        Self::new(
            controller,
            affected,
            ContinuousKind::ModifyPowerToughness { power, toughness },
            Duration::WhileOnBattlefield,
        )
        .with_source(source)
    }

    #[must_use]
    pub fn layer(&self) -> Layer {
        self.kind.layer()
    }

    fn applies_to(&self, snapshot: &Characteristics, store: &ObjectStore) -> bool {
        let on_battlefield_creature = snapshot.zone == Zone::Battlefield && snapshot.is_creature();
        match &self.affected {
            AffectedObjects::Object(id) => *id == snapshot.object,
            AffectedObjects::CreaturesControlledBy(player) => {
                on_battlefield_creature && snapshot.controller == *player
            }
            AffectedObjects::OtherCreaturesControlledBy(player) => {
                on_battlefield_creature
                    && snapshot.controller == *player
                    && self.source != Some(snapshot.object)
            }
            AffectedObjects::AllCreatures => on_battlefield_creature,
            AffectedObjects::AttachedToSource => self
                .source
                .and_then(|s| store.get(s))
                .and_then(|s| s.attached_to)
                == Some(snapshot.object),
        }
    }
}

/// Registry of continuous effects in insertion order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LayerSystem {
    effects: Vec<ContinuousEffect>,
}

impl LayerSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an effect that already carries its id.
    pub fn add(&mut self, effect: ContinuousEffect) {
        tracing::trace!(
            effect = %effect.id,
            layer = effect.layer().number(),
            "continuous effect added"
        );
        self.effects.push(effect);
    }

    pub fn remove(&mut self, id: EffectId) -> Option<ContinuousEffect> {
        let idx = self.effects.iter().position(|e| e.id == id)?;
        Some(self.effects.remove(idx))
    }

    #[must_use]
    pub fn get(&self, id: EffectId) -> Option<&ContinuousEffect> {
        self.effects.iter().find(|e| e.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContinuousEffect> {
        self.effects.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Effects that currently apply to an object.
    pub fn effects_on(&self, id: ObjectId, store: &ObjectStore) -> Vec<EffectId> {
        let Some(object) = store.get(id) else {
            return Vec::new();
        };
        let mut snapshot = Characteristics::printed(object);
        let mut applied = Vec::new();
        self.run_layers(&mut snapshot, store, |e| applied.push(e.id));
        applied
    }

    /// Compute the characteristics of an object.
    pub fn characteristics(&self, id: ObjectId, store: &ObjectStore) -> Result<Characteristics> {
        let object = store.require(id)?;
        let mut snapshot = Characteristics::printed(object);
        self.run_layers(&mut snapshot, store, |_| {});

        let counters = object.counter(CounterKind::PlusOne) - object.counter(CounterKind::MinusOne);
        if counters != 0 {
            snapshot.modify_pt(counters, counters);
        }
        Ok(snapshot)
    }

    /// Drop every effect that expires at this pass. Returns how many.
    pub fn cleanup(&mut self, pass: CleanupPass) -> usize {
        let before = self.effects.len();
        self.effects.retain(|e| !pass.expires(e.duration, e.source, e.controller));
        before - self.effects.len()
    }

    fn run_layers(
        &self,
        snapshot: &mut Characteristics,
        store: &ObjectStore,
        mut on_apply: impl FnMut(&ContinuousEffect),
    ) {
        for layer in Layer::ALL {
            for effect in self.effects.iter().filter(|e| e.layer() == layer) {
                if effect.applies_to(snapshot, store) {
                    effect.kind.apply(snapshot);
                    on_apply(effect);
                }
            }
        }
    }
}
