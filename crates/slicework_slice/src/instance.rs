//! One instantiated copy of a slice asset.
//!
//! An instance persists three things: the base-to-new id map, the data patch
//! (addressed by base ids, relative to the instantiated container), and the
//! per-entity override flags (keyed by live ids). Its live entities are
//! derived from those plus the source graph and can be dropped and rebuilt
//! at any time without loss.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use slicework_foundation::{
    EntityId, Error, ErrorContext, ErrorKind, FieldAddress, Result, SliceAssetId, SliceInstanceId,
};
use slicework_patch::{
    CustomIdMapper, DataFlags, DataPatch, EntityIdMap, EntityIdRemapper, FlagsMap, IdGenerator,
    StaleEdit,
};
use slicework_tree::{Entity, FieldTree, InstantiatedContainer};
use tracing::debug;

use crate::flags::DataFlagsPerEntity;

/// Locates an instance inside a component: which reference, which instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SliceInstanceAddress {
    /// Asset of the owning reference.
    pub asset: SliceAssetId,
    /// Instance within the reference.
    pub instance: SliceInstanceId,
}

impl SliceInstanceAddress {
    /// Creates an address.
    #[must_use]
    pub const fn new(asset: SliceAssetId, instance: SliceInstanceId) -> Self {
        Self { asset, instance }
    }
}

impl fmt::Display for SliceInstanceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.asset, self.instance)
    }
}

/// The fully instantiated entity graph of a source asset, as a container
/// tree, plus the id of the asset's own metadata entity.
#[derive(Clone, Debug)]
pub struct SourceGraph {
    /// The asset this graph was built from.
    pub asset: SliceAssetId,
    /// Encoded [`InstantiatedContainer`] of every entity the asset yields.
    pub tree: FieldTree,
    /// The asset component's metadata entity.
    pub metadata_entity: EntityId,
}

impl SourceGraph {
    /// Builds a source graph from decoded entities.
    #[must_use]
    pub fn new(
        asset: SliceAssetId,
        container: &InstantiatedContainer,
        metadata_entity: EntityId,
    ) -> Self {
        Self {
            asset,
            tree: container.to_tree(),
            metadata_entity,
        }
    }

    /// Decodes the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree is not a container.
    pub fn container(&self) -> Result<InstantiatedContainer> {
        InstantiatedContainer::from_tree(&self.tree)
    }
}

/// One instantiation of a slice asset.
#[derive(Clone)]
pub struct SliceInstance {
    id: SliceInstanceId,
    base_to_new: EntityIdMap,
    new_to_base: OnceLock<EntityIdMap>,
    patch: DataPatch,
    data_flags: DataFlagsPerEntity,
    instantiated: Option<InstantiatedContainer>,
    metadata_entity: Option<EntityId>,
    custom_mapper: Option<CustomIdMapper>,
}

impl fmt::Debug for SliceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceInstance")
            .field("id", &self.id)
            .field("base_to_new", &self.base_to_new)
            .field("patch_edits", &self.patch.len())
            .field("data_flags", &self.data_flags)
            .field("instantiated", &self.instantiated.is_some())
            .field("metadata_entity", &self.metadata_entity)
            .field("custom_mapper", &self.custom_mapper.is_some())
            .finish()
    }
}

impl SliceInstance {
    pub(crate) fn new(id: SliceInstanceId, custom_mapper: Option<CustomIdMapper>) -> Self {
        Self {
            id,
            base_to_new: EntityIdMap::new(),
            new_to_base: OnceLock::new(),
            patch: DataPatch::new(),
            data_flags: DataFlagsPerEntity::new(),
            instantiated: None,
            metadata_entity: None,
            custom_mapper,
        }
    }

    pub(crate) fn from_parts(
        id: SliceInstanceId,
        base_to_new: EntityIdMap,
        patch: DataPatch,
        data_flags: DataFlagsPerEntity,
        metadata_entity: Option<EntityId>,
    ) -> Self {
        Self {
            base_to_new,
            patch,
            data_flags,
            metadata_entity,
            ..Self::new(id, None)
        }
    }

    /// The instance id.
    #[must_use]
    pub fn id(&self) -> SliceInstanceId {
        self.id
    }

    /// Base id to live id.
    #[must_use]
    pub fn entity_id_map(&self) -> &EntityIdMap {
        &self.base_to_new
    }

    /// Live id to base id, built on first use and cached until the forward
    /// map changes.
    pub fn entity_id_to_base_map(&self) -> &EntityIdMap {
        self.new_to_base.get_or_init(|| self.base_to_new.reverse())
    }

    /// Base id of a live entity.
    #[must_use]
    pub fn base_id(&self, entity: EntityId) -> Option<EntityId> {
        self.entity_id_to_base_map().get(entity)
    }

    fn invalidate_reverse(&mut self) {
        self.new_to_base = OnceLock::new();
    }

    fn set_map(&mut self, map: EntityIdMap) {
        self.base_to_new = map;
        self.invalidate_reverse();
    }

    /// The stored data patch.
    #[must_use]
    pub fn patch(&self) -> &DataPatch {
        &self.patch
    }

    /// Per-entity override flags.
    #[must_use]
    pub fn data_flags(&self) -> &DataFlagsPerEntity {
        &self.data_flags
    }

    /// Sets override flags on an entity this instance owns.
    ///
    /// `address` is relative to the entity record, for example
    /// `components/#1/height`.
    ///
    /// # Errors
    ///
    /// Returns [`EntityNotFound`](ErrorKind::EntityNotFound) if the entity
    /// does not belong to this instance.
    pub fn set_data_flags(&mut self, entity: EntityId, address: FieldAddress, flags: DataFlags) -> Result<()> {
        if !self.owns(entity) {
            return Err(Error::entity_not_found(entity)
                .with_context(ErrorContext::new().with_instance(self.id)));
        }
        self.data_flags.set_flags_at(entity, address, flags);
        Ok(())
    }

    fn owns(&self, entity: EntityId) -> bool {
        self.contains_entity(entity) || self.entity_id_to_base_map().contains_base(entity)
    }

    /// Returns true if live entities are materialized.
    #[must_use]
    pub fn is_instantiated(&self) -> bool {
        self.instantiated.is_some()
    }

    /// The live container, if instantiated.
    #[must_use]
    pub fn instantiated(&self) -> Option<&InstantiatedContainer> {
        self.instantiated.as_ref()
    }

    /// Live entities (empty when not instantiated).
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        self.instantiated
            .as_ref()
            .map_or(&[][..], |c| c.entities.as_slice())
    }

    /// Looks up a live entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.instantiated.as_ref()?.entity(id)
    }

    /// Looks up a live entity mutably.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.instantiated.as_mut()?.entity_mut(id)
    }

    /// Returns true if `id` is one of the live entities.
    #[must_use]
    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.entity(id).is_some()
    }

    /// Id of this instance's metadata entity.
    #[must_use]
    pub fn metadata_entity_id(&self) -> Option<EntityId> {
        self.metadata_entity
    }

    /// This instance's metadata entity, if instantiated.
    #[must_use]
    pub fn metadata_entity(&self) -> Option<&Entity> {
        let id = self.metadata_entity?;
        self.instantiated
            .as_ref()?
            .metadata_entities
            .iter()
            .find(|e| e.id() == id)
    }

    /// Entity-relative flags rewritten as container-relative flags under
    /// base ids, the addressing the stored patch uses.
    #[must_use]
    pub fn flags_for_patching(&self) -> FlagsMap {
        let reverse = self.entity_id_to_base_map();
        let mut result = FlagsMap::new();
        for (entity, flags) in self.data_flags.iter() {
            let base = reverse.map_or_keep(entity);
            result.extend(&flags.prefixed(&InstantiatedContainer::entity_address(base)));
        }
        result
    }

    /// Builds the live entities from `source`.
    ///
    /// The stored patch is applied to the source first (patch addresses use
    /// base ids), then every id is remapped. Entities new to the source get
    /// fresh ids; map entries for entities the source no longer has are
    /// pruned. Nothing changes if remapping fails.
    ///
    /// Returns the edits that no longer matched the source.
    ///
    /// # Errors
    ///
    /// Returns [`IdCollision`](ErrorKind::IdCollision) if the id map is not a
    /// bijection, or [`MalformedTree`](ErrorKind::MalformedTree) if the
    /// patched graph no longer decodes.
    pub fn instantiate(&mut self, source: &SourceGraph, ids: &mut dyn IdGenerator) -> Result<Vec<StaleEdit>> {
        let context = || {
            ErrorContext::new()
                .with_asset(source.asset)
                .with_instance(self.id)
        };

        let flags = self.flags_for_patching();
        let outcome = self.patch.apply_with_flags(&source.tree, &flags);

        let defined = outcome.tree.defined_entity_ids();
        let mut map = self.base_to_new.clone();
        map.retain(|base, _| defined.contains(&base));

        let mapper = self.custom_mapper.clone();
        let remapped = EntityIdRemapper::replace_ids(&outcome.tree, &mut map, |base| {
            EntityIdRemapper::assign(base, ids, mapper.as_ref())
        })
        .map_err(|e| e.with_context(context()))?;
        let container = InstantiatedContainer::from_tree(&remapped).map_err(|e| e.with_context(context()))?;

        debug!(
            instance = %self.id,
            asset = %source.asset,
            entities = container.entities.len(),
            stale = outcome.stale.len(),
            "instantiated slice instance"
        );

        let live: BTreeSet<EntityId> = container.all_ids().collect();
        self.data_flags.cleanup(&live);
        self.metadata_entity = map.get(source.metadata_entity);
        self.set_map(map);
        self.instantiated = Some(container);
        Ok(outcome.stale)
    }

    /// Drops the live entities. The map, patch, and flags are kept.
    pub fn uninstantiate(&mut self) {
        self.instantiated = None;
    }

    /// Re-derives the stored patch from the live entities.
    ///
    /// Live entities without a base id (added to the instance directly) are
    /// mapped to themselves so the next instantiation keeps their ids.
    ///
    /// # Errors
    ///
    /// Returns [`NotInstantiated`](ErrorKind::NotInstantiated) if there are
    /// no live entities to diff.
    pub fn compute_data_patch(&mut self, source: &SourceGraph) -> Result<()> {
        let (live_tree, live_ids) = match &self.instantiated {
            Some(container) => (
                container.to_tree(),
                container.all_ids().collect::<BTreeSet<EntityId>>(),
            ),
            None => {
                return Err(Error::new(ErrorKind::NotInstantiated)
                    .with_context(ErrorContext::new().with_instance(self.id)));
            }
        };

        let unmapped: Vec<EntityId> = live_ids
            .iter()
            .copied()
            .filter(|id| self.base_id(*id).is_none())
            .collect();
        if !unmapped.is_empty() {
            let mut map = self.base_to_new.clone();
            map.extend(unmapped.into_iter().map(|id| (id, id)));
            self.set_map(map);
        }

        let base_tree = EntityIdRemapper::remap(&live_tree, self.entity_id_to_base_map())?;

        self.data_flags.cleanup(&live_ids);
        let flags = self.flags_for_patching();
        self.patch = DataPatch::create(&source.tree, &base_tree, &flags);
        debug!(instance = %self.id, edits = self.patch.len(), "computed data patch");
        Ok(())
    }

    /// Adds a live entity, optionally recording the base entity it derives
    /// from. Creates an empty live container if needed.
    pub(crate) fn add_entity(&mut self, entity: Entity, ancestor: Option<EntityId>, flags: FlagsMap) {
        let id = entity.id();
        self.instantiated
            .get_or_insert_with(InstantiatedContainer::default)
            .entities
            .push(entity);
        if let Some(base) = ancestor {
            let mut map = self.base_to_new.clone();
            map.insert(base, id);
            self.set_map(map);
        }
        self.data_flags.set_entity_flags(id, flags);
    }

    /// Removes a live entity along with its map entry and flags.
    pub(crate) fn take_entity(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.instantiated.as_mut()?.remove_entity(id)?;
        self.data_flags.clear_entity_flags(id);
        if let Some(base) = self.base_id(id) {
            let mut map = self.base_to_new.clone();
            map.remove(base);
            self.set_map(map);
        }
        Some(entity)
    }

    pub(crate) fn set_instantiated(&mut self, container: InstantiatedContainer, metadata_entity: Option<EntityId>) {
        self.instantiated = Some(container);
        self.metadata_entity = metadata_entity;
    }

    pub(crate) fn merge_map(&mut self, extra: &EntityIdMap) {
        let mut map = self.base_to_new.clone();
        map.extend(extra.iter());
        self.set_map(map);
    }

    /// Every live-side id this instance knows: mapped ids plus live entities.
    pub(crate) fn known_ids(&self) -> BTreeSet<EntityId> {
        let mut ids: BTreeSet<EntityId> = self.base_to_new.values().collect();
        if let Some(container) = &self.instantiated {
            ids.extend(container.all_ids());
        }
        if let Some(meta) = self.metadata_entity {
            ids.insert(meta);
        }
        ids
    }

    /// Rewrites every live-side id through `map`: live entities and the
    /// references inside them, map values, flag keys, and the metadata id.
    /// Base ids are untouched.
    pub(crate) fn remap_live_ids(&mut self, map: &EntityIdMap) -> Result<()> {
        let container = match &self.instantiated {
            Some(c) => Some(InstantiatedContainer::from_tree(&EntityIdRemapper::remap(&c.to_tree(), map)?)?),
            None => None,
        };
        let forward = self.base_to_new.compose(map);
        forward.validate_bijection()?;

        self.instantiated = container;
        self.set_map(forward);
        self.data_flags = self.data_flags.remap(|id| map.map_or_keep(id));
        self.metadata_entity = self.metadata_entity.map(|id| map.map_or_keep(id));
        Ok(())
    }

    /// Copies this instance under a new id with fresh live ids.
    ///
    /// Returns the copy and the map from this instance's live ids to the
    /// copy's.
    pub(crate) fn clone_with_new_ids(
        &self,
        id: SliceInstanceId,
        ids: &mut dyn IdGenerator,
    ) -> Result<(SliceInstance, EntityIdMap)> {
        let source_to_clone: EntityIdMap = self
            .known_ids()
            .into_iter()
            .map(|old| (old, ids.next_id()))
            .collect();
        let mut clone = self.clone();
        clone.id = id;
        clone.custom_mapper = None;
        clone.remap_live_ids(&source_to_clone)?;
        Ok((clone, source_to_clone))
    }

    /// Consumes the instance, returning its live entities.
    #[must_use]
    pub fn into_entities(self) -> Vec<Entity> {
        self.instantiated.map(|c| c.entities).unwrap_or_default()
    }

    /// Consumes the instance, returning its live container.
    #[must_use]
    pub fn into_container(self) -> Option<InstantiatedContainer> {
        self.instantiated
    }
}
