//! Per-address override flags.
//!
//! Flags are stored sparsely. An address without flags inherits the flags of
//! its nearest flagged ancestor, so flagging a component record covers every
//! field beneath it.

use std::collections::BTreeMap;

use slicework_foundation::{EntityId, FieldAddress};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Override policy for one field address.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct DataFlags: u8 {
        /// Instances may never change this field. Local changes are not
        /// recorded and patch edits here are not applied.
        const PREVENT_OVERRIDE = 1 << 0;
        /// The instance value always wins and is always recorded, even when
        /// it equals the source.
        const FORCE_OVERRIDE = 1 << 1;
        /// Excluded from diffing. Existing edits still apply.
        const HIDDEN = 1 << 2;
    }
}

impl DataFlags {
    /// Returns true if diffing must skip this address.
    #[must_use]
    pub fn skips_create(self) -> bool {
        self.intersects(Self::PREVENT_OVERRIDE | Self::HIDDEN)
    }

    /// Returns true if applying must skip this address.
    #[must_use]
    pub fn skips_apply(self) -> bool {
        self.contains(Self::PREVENT_OVERRIDE)
    }
}

/// Sparse map from field address to flags.
///
/// Never stores an empty flag set: writing empty flags removes the entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct FlagsMap {
    entries: BTreeMap<FieldAddress, DataFlags>,
}

impl FlagsMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: sets flags at an address.
    #[must_use]
    pub fn with(mut self, address: FieldAddress, flags: DataFlags) -> Self {
        self.set(address, flags);
        self
    }

    /// Replaces the flags stored at `address`. Empty flags remove the entry.
    pub fn set(&mut self, address: FieldAddress, flags: DataFlags) {
        if flags.is_empty() {
            self.entries.remove(&address);
        } else {
            self.entries.insert(address, flags);
        }
    }

    /// Adds flags to whatever is stored at `address`.
    pub fn insert(&mut self, address: FieldAddress, flags: DataFlags) {
        let merged = self.get(&address) | flags;
        self.set(address, merged);
    }

    /// Clears flags at `address`.
    pub fn clear(&mut self, address: &FieldAddress) {
        self.entries.remove(address);
    }

    /// Flags stored exactly at `address` (empty if none).
    #[must_use]
    pub fn get(&self, address: &FieldAddress) -> DataFlags {
        self.entries.get(address).copied().unwrap_or_default()
    }

    /// Flags in effect at `address`: its own, else the nearest ancestor's.
    #[must_use]
    pub fn effective(&self, address: &FieldAddress) -> DataFlags {
        if self.entries.is_empty() {
            return DataFlags::empty();
        }
        address
            .ancestors()
            .find_map(|a| self.entries.get(&a).copied())
            .unwrap_or_default()
    }

    /// Number of flagged addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is flagged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in address order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldAddress, DataFlags)> {
        self.entries.iter().map(|(a, f)| (a, *f))
    }

    /// Returns a copy with every address re-rooted under `prefix`.
    #[must_use]
    pub fn prefixed(&self, prefix: &FieldAddress) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(a, f)| (prefix.join(a), *f))
                .collect(),
        }
    }

    /// Returns the entries under `prefix`, made relative to it.
    #[must_use]
    pub fn relative_to(&self, prefix: &FieldAddress) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter_map(|(a, f)| a.strip_prefix(prefix).map(|rel| (rel, *f)))
                .collect(),
        }
    }

    /// Merges another map into this one, OR-ing overlapping entries.
    pub fn extend(&mut self, other: &FlagsMap) {
        for (address, flags) in other.iter() {
            self.insert(address.clone(), flags);
        }
    }

    /// Returns a copy with entity keys in addresses rewritten by `f`.
    #[must_use]
    pub fn remap_entities(&self, mut f: impl FnMut(EntityId) -> EntityId) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(a, flags)| (a.remap_entities(&mut f), *flags))
                .collect(),
        }
    }
}

impl FromIterator<(FieldAddress, DataFlags)> for FlagsMap {
    fn from_iter<I: IntoIterator<Item = (FieldAddress, DataFlags)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (address, flags) in iter {
            map.insert(address, flags);
        }
        map
    }
}
