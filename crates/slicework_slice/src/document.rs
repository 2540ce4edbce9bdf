//! Persisted form of a [`SliceComponent`](crate::SliceComponent).
//!
//! Only authored state is stored: direct entities, and per instance the id
//! map, the data patch and the override flags. Live instance entities are
//! rebuilt from the source assets on load.

use slicework_foundation::{EntityId, SliceAssetId, SliceInstanceId};
use slicework_patch::{DataPatch, EntityIdMap};
use slicework_tree::Entity;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::flags::DataFlagsPerEntity;

/// A saved component.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SliceDocument {
    /// The asset this component is, if it is one.
    pub asset_id: Option<SliceAssetId>,
    /// Directly authored entities.
    pub entities: Vec<Entity>,
    /// The component's own metadata entity.
    pub metadata_entity: Entity,
    /// One record per referenced asset.
    pub slices: Vec<SliceReferenceRecord>,
}

/// A saved [`SliceReference`](crate::SliceReference).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SliceReferenceRecord {
    /// The source asset.
    pub asset: SliceAssetId,
    /// Saved instances.
    pub instances: Vec<SliceInstanceRecord>,
}

/// A saved [`SliceInstance`](crate::SliceInstance).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SliceInstanceRecord {
    /// Instance id.
    pub id: SliceInstanceId,
    /// Base id to live id.
    pub entity_id_map: EntityIdMap,
    /// Edits against the source asset, addressed by base ids.
    pub patch: DataPatch,
    /// Override flags keyed by live id.
    pub data_flags: DataFlagsPerEntity,
    /// Live id of the instance's metadata entity.
    pub metadata_entity: Option<EntityId>,
}

impl SliceDocument {
    /// Total number of instances across all references.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.slices.iter().map(|s| s.instances.len()).sum()
    }

    /// Total number of patch edits across all instances.
    #[must_use]
    pub fn patch_edit_count(&self) -> usize {
        self.slices
            .iter()
            .flat_map(|s| &s.instances)
            .map(|i| i.patch.len())
            .sum()
    }
}
