//! Base id to instance id tables.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use slicework_foundation::{EntityId, Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maps entity ids as authored in a source asset ("base") to the ids an
/// instance uses ("new").
///
/// Iteration is ordered by base id so persisted maps are stable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct EntityIdMap {
    entries: BTreeMap<EntityId, EntityId>,
}

impl EntityIdMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `base` to `new`, returning the previous mapping.
    pub fn insert(&mut self, base: EntityId, new: EntityId) -> Option<EntityId> {
        self.entries.insert(base, new)
    }

    /// Looks up the new id for `base`.
    #[must_use]
    pub fn get(&self, base: EntityId) -> Option<EntityId> {
        self.entries.get(&base).copied()
    }

    /// Maps `id` if present, else returns it unchanged.
    #[must_use]
    pub fn map_or_keep(&self, id: EntityId) -> EntityId {
        self.get(id).unwrap_or(id)
    }

    /// Finds the base id that maps to `new`.
    ///
    /// Linear in the map size; callers doing repeated lookups should build
    /// [`reverse`](Self::reverse) once instead.
    #[must_use]
    pub fn base_of(&self, new: EntityId) -> Option<EntityId> {
        self.entries
            .iter()
            .find_map(|(base, mapped)| (*mapped == new).then_some(*base))
    }

    /// Removes the mapping for `base`.
    pub fn remove(&mut self, base: EntityId) -> Option<EntityId> {
        self.entries.remove(&base)
    }

    /// Returns true if `base` is mapped.
    #[must_use]
    pub fn contains_base(&self, base: EntityId) -> bool {
        self.entries.contains_key(&base)
    }

    /// Number of mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no mappings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(base, new)` pairs in base order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        self.entries.iter().map(|(b, n)| (*b, *n))
    }

    /// Iterates new ids.
    pub fn values(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entries.values().copied()
    }

    /// Keeps only mappings for which `f` returns true.
    pub fn retain(&mut self, mut f: impl FnMut(EntityId, EntityId) -> bool) {
        self.entries.retain(|b, n| f(*b, *n));
    }

    /// Returns the inverse map (new to base).
    ///
    /// If the map is not a bijection the inverse keeps the largest base id
    /// for each collision; call [`validate_bijection`](Self::validate_bijection)
    /// first when that matters.
    #[must_use]
    pub fn reverse(&self) -> Self {
        Self {
            entries: self.entries.iter().map(|(b, n)| (*n, *b)).collect(),
        }
    }

    /// Checks that no two base ids map to the same new id.
    ///
    /// # Errors
    ///
    /// Returns [`IdCollision`](slicework_foundation::ErrorKind::IdCollision)
    /// naming the first collision found.
    pub fn validate_bijection(&self) -> Result<()> {
        let mut seen: BTreeMap<EntityId, EntityId> = BTreeMap::new();
        for (base, new) in self.iter() {
            match seen.entry(new) {
                Entry::Vacant(slot) => {
                    slot.insert(base);
                }
                Entry::Occupied(slot) => {
                    return Err(Error::id_collision(new, *slot.get(), base));
                }
            }
        }
        Ok(())
    }

    /// Composes two maps: `self` maps a to b, `next` maps b to c, the result
    /// maps a to c. Ids `next` does not know pass through unchanged.
    #[must_use]
    pub fn compose(&self, next: &EntityIdMap) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(a, b)| (*a, next.map_or_keep(*b)))
                .collect(),
        }
    }
}

impl FromIterator<(EntityId, EntityId)> for EntityIdMap {
    fn from_iter<I: IntoIterator<Item = (EntityId, EntityId)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<(EntityId, EntityId)> for EntityIdMap {
    fn extend<I: IntoIterator<Item = (EntityId, EntityId)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}
