//! Arena object store with per-zone ordering.
//!
//! The `ObjectStore` owns every object in a game. Objects live in an arena
//! indexed by `ObjectId`; ids are never reused, so a removed slot simply
//! stays empty. Each zone keeps an ordered list of the ids it contains:
//! - Library, hand and graveyard exist once per owner
//! - Battlefield, stack, exile and command are shared
//!
//! Both the arena and the zone lists are `im` vectors, so cloning the store
//! for a bookmark is O(1).
//!
//! The store itself does not publish events or run replacement effects;
//! [`GameState::move_object`](crate::game::GameState::move_object) does that
//! and calls [`ObjectStore::relocate`] for the actual move.

use im::Vector;
use serde::{Deserialize, Serialize};

use super::object::{CardSpec, GameObject};
use super::zone::{Zone, ZonePosition};
use crate::core::{GameRng, IllegalAction, ObjectId, PlayerId, PlayerMap, Result, RulesError};

/// Ordered zones belonging to one player.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct OwnedZones {
    library: Vector<ObjectId>,
    hand: Vector<ObjectId>,
    graveyard: Vector<ObjectId>,
}

/// Owns all objects of a game and tracks which zone each is in.
///
/// ```
/// use mtg_rules::zones::{CardSpec, ObjectStore, Zone, ZonePosition};
/// use mtg_rules::core::PlayerId;
///
/// let mut store = ObjectStore::new(2);
/// let p0 = PlayerId::new(0);
/// let bear = store.create(CardSpec::creature("Bear", 2, 2), p0, Zone::Hand);
///
/// assert_eq!(store.zone_of(bear), Some(Zone::Hand));
/// store.relocate(bear, Zone::Battlefield, ZonePosition::Top).unwrap();
/// assert_eq!(store.battlefield().count(), 1);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectStore {
    objects: Vector<Option<GameObject>>,
    owned: PlayerMap<OwnedZones>,
    battlefield: Vector<ObjectId>,
    stack: Vector<ObjectId>,
    exile: Vector<ObjectId>,
    command: Vector<ObjectId>,
}

impl ObjectStore {
    /// Create an empty store for `player_count` players.
    #[must_use]
    pub fn new(player_count: usize) -> Self {
        Self {
            objects: Vector::new(),
            owned: PlayerMap::new(player_count, |_| OwnedZones::default()),
            battlefield: Vector::new(),
            stack: Vector::new(),
            exile: Vector::new(),
            command: Vector::new(),
        }
    }

    // === Creation and lookup ===

    /// Create a new object on top of `zone`.
    pub fn create(&mut self, spec: CardSpec, owner: PlayerId, zone: Zone) -> ObjectId {
        let id = ObjectId::new(self.objects.len() as u32);
        self.objects.push_back(Some(GameObject::new(id, spec, owner, zone)));
        self.zone_list_mut(zone, owner).push_back(id);
        id
    }

    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Like [`get`](Self::get) but reports a missing object as an error.
    pub fn require(&self, id: ObjectId) -> Result<&GameObject> {
        self.get(id).ok_or(RulesError::ObjectNotFound(id))
    }

    /// Like [`get_mut`](Self::get_mut) but reports a missing object as an error.
    pub fn require_mut(&mut self, id: ObjectId) -> Result<&mut GameObject> {
        self.get_mut(id).ok_or(RulesError::ObjectNotFound(id))
    }

    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn zone_of(&self, id: ObjectId) -> Option<Zone> {
        self.get(id).map(|o| o.zone)
    }

    #[must_use]
    pub fn is_in_zone(&self, id: ObjectId, zone: Zone) -> bool {
        self.zone_of(id) == Some(zone)
    }

    /// Iterate over every live object.
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.iter().filter_map(Option::as_ref)
    }

    /// Total number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // === Zone contents ===

    /// Objects in a zone, bottom to top. `owner` selects the per-player
    /// zone for library, hand and graveyard and is ignored otherwise.
    pub fn in_zone(&self, zone: Zone, owner: PlayerId) -> impl Iterator<Item = ObjectId> + '_ {
        self.zone_list(zone, owner).iter().copied()
    }

    /// Permanents on the battlefield in the order they entered.
    pub fn battlefield(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.battlefield.iter().copied()
    }

    #[must_use]
    pub fn zone_size(&self, zone: Zone, owner: PlayerId) -> usize {
        self.zone_list(zone, owner).len()
    }

    /// Top card of a player's library.
    #[must_use]
    pub fn top_of_library(&self, player: PlayerId) -> Option<ObjectId> {
        self.zone_list(Zone::Library, player).last().copied()
    }

    /// Find a card in a player's hand by name.
    #[must_use]
    pub fn find_in_hand(&self, player: PlayerId, name: &str) -> Option<ObjectId> {
        self.in_zone(Zone::Hand, player)
            .find(|&id| self.get(id).is_some_and(|o| o.name() == name))
    }

    // === Movement ===

    /// Move an object to a zone, resetting its zone-bound state.
    ///
    /// Owned zones resolve to the object's owner. Returns the zone it left.
    pub fn relocate(&mut self, id: ObjectId, to: Zone, position: ZonePosition) -> Result<Zone> {
        let (from, owner) = {
            let object = self.require(id)?;
            (object.zone, object.owner)
        };

        self.zone_list_mut(from, owner).retain(|&e| e != id);
        insert_at(self.zone_list_mut(to, owner), id, position);
        self.require_mut(id)?.reset_for_zone(to);

        Ok(from)
    }

    /// Put a card onto the stack as part of casting it.
    ///
    /// Only casting is allowed to do this; it keeps the controller the caster.
    pub fn put_on_stack(&mut self, id: ObjectId, caster: PlayerId) -> Result<Zone> {
        let from = self.relocate(id, Zone::Stack, ZonePosition::Top)?;
        self.require_mut(id)?.controller = caster;
        Ok(from)
    }

    /// Remove an object from the game entirely.
    pub fn remove(&mut self, id: ObjectId) -> Option<GameObject> {
        let (zone, owner) = {
            let object = self.get(id)?;
            (object.zone, object.owner)
        };
        self.zone_list_mut(zone, owner).retain(|&e| e != id);
        self.objects.get_mut(id.index()).and_then(Option::take)
    }

    /// Shuffle a player's library.
    pub fn shuffle_library(&mut self, player: PlayerId, rng: &mut GameRng) {
        let library = &mut self.owned[player].library;
        let mut order: Vec<ObjectId> = library.iter().copied().collect();
        rng.shuffle(&mut order);
        *library = order.into_iter().collect();
    }

    /// Reject moves that only casting may perform.
    pub fn check_destination(&self, id: ObjectId, to: Zone) -> Result<()> {
        if to == Zone::Stack {
            return Err(IllegalAction::MoveToStack(id).into());
        }
        Ok(())
    }

    fn zone_list(&self, zone: Zone, owner: PlayerId) -> &Vector<ObjectId> {
        match zone {
            Zone::Library => &self.owned[owner].library,
            Zone::Hand => &self.owned[owner].hand,
            Zone::Graveyard => &self.owned[owner].graveyard,
            Zone::Battlefield => &self.battlefield,
            Zone::Stack => &self.stack,
            Zone::Exile => &self.exile,
            Zone::Command => &self.command,
        }
    }

    fn zone_list_mut(&mut self, zone: Zone, owner: PlayerId) -> &mut Vector<ObjectId> {
        match zone {
            Zone::Library => &mut self.owned[owner].library,
            Zone::Hand => &mut self.owned[owner].hand,
            Zone::Graveyard => &mut self.owned[owner].graveyard,
            Zone::Battlefield => &mut self.battlefield,
            Zone::Stack => &mut self.stack,
            Zone::Exile => &mut self.exile,
            Zone::Command => &mut self.command,
        }
    }
}

fn insert_at(list: &mut Vector<ObjectId>, id: ObjectId, position: ZonePosition) {
    match position {
        ZonePosition::Top => list.push_back(id),
        ZonePosition::Bottom => list.push_front(id),
        ZonePosition::Index(i) => {
            let idx = i.min(list.len());
            list.insert(idx, id);
        }
    }
}
