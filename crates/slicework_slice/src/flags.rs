//! Override flags stored per entity.
//!
//! Flags are keyed by live entity id and addressed relative to the entity
//! record. [`SliceInstance::flags_for_patching`](crate::SliceInstance::flags_for_patching)
//! rewrites them into container-relative addresses under base ids.

use std::collections::{BTreeMap, BTreeSet};

use slicework_foundation::{EntityId, FieldAddress};
use slicework_patch::{DataFlags, FlagsMap};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sparse flag storage: entities without flags have no entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DataFlagsPerEntity {
    entities: BTreeMap<EntityId, FlagsMap>,
}

impl DataFlagsPerEntity {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags map of one entity.
    #[must_use]
    pub fn entity_flags(&self, entity: EntityId) -> Option<&FlagsMap> {
        self.entities.get(&entity)
    }

    /// Replaces all flags of one entity.
    pub fn set_entity_flags(&mut self, entity: EntityId, flags: FlagsMap) {
        if flags.is_empty() {
            self.entities.remove(&entity);
        } else {
            self.entities.insert(entity, flags);
        }
    }

    /// Sets flags at one address of one entity.
    pub fn set_flags_at(&mut self, entity: EntityId, address: FieldAddress, flags: DataFlags) {
        let mut map = self.entities.remove(&entity).unwrap_or_default();
        map.set(address, flags);
        self.set_entity_flags(entity, map);
    }

    /// Flags stored at one address of one entity.
    #[must_use]
    pub fn flags_at(&self, entity: EntityId, address: &FieldAddress) -> DataFlags {
        self.entities
            .get(&entity)
            .map(|m| m.get(address))
            .unwrap_or_default()
    }

    /// Drops all flags of one entity, returning them.
    pub fn clear_entity_flags(&mut self, entity: EntityId) -> Option<FlagsMap> {
        self.entities.remove(&entity)
    }

    /// Drops flags of entities not in `valid`.
    pub fn cleanup(&mut self, valid: &BTreeSet<EntityId>) {
        self.entities.retain(|id, _| valid.contains(id));
    }

    /// Returns a copy re-keyed by `f`.
    #[must_use]
    pub fn remap(&self, mut f: impl FnMut(EntityId) -> EntityId) -> Self {
        Self {
            entities: self
                .entities
                .iter()
                .map(|(id, flags)| (f(*id), flags.clone()))
                .collect(),
        }
    }

    /// Iterates `(entity, flags)` in entity order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &FlagsMap)> {
        self.entities.iter().map(|(id, f)| (*id, f))
    }

    /// Number of entities with flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entity has flags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
