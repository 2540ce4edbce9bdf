//! All instances of one source asset inside a component.

use std::collections::{BTreeMap, HashMap};

use slicework_foundation::{
    EntityId, Error, ErrorContext, ErrorKind, Result, SliceAssetId, SliceInstanceId,
};
use slicework_patch::{CustomIdMapper, EntityIdMap, IdGenerator, StaleEdit};
use slicework_tree::{Entity, InstantiatedContainer};
use tracing::debug;

use crate::asset::AssetProvider;
use crate::instance::{SliceInstance, SourceGraph};

/// One step of an entity's ancestry: the asset and the entity id within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityAncestor {
    /// Asset the ancestor entity lives in.
    pub asset: SliceAssetId,
    /// Id of the ancestor inside that asset.
    pub entity: EntityId,
}

/// An instance detached by [`SliceReference::remove_instance`].
#[derive(Debug)]
pub struct RemovedInstance {
    /// The detached instance, live entities included.
    pub instance: SliceInstance,
    /// True if the reference has no instances left and should be dropped.
    pub reference_empty: bool,
}

/// Result of [`SliceReference::remove_entity`].
#[derive(Debug)]
pub struct EntityRemoval {
    /// The entity, unless it was deleted.
    pub entity: Option<Entity>,
    /// The instance the entity was removed from.
    pub instance: SliceInstanceId,
    /// True if the instance became empty and was removed too.
    pub instance_removed: bool,
}

/// All instances of one slice asset.
#[derive(Clone, Debug)]
pub struct SliceReference {
    asset: SliceAssetId,
    instances: BTreeMap<SliceInstanceId, SliceInstance>,
    instantiated: bool,
}

impl SliceReference {
    /// Creates an empty, uninstantiated reference.
    #[must_use]
    pub fn new(asset: SliceAssetId) -> Self {
        Self {
            asset,
            instances: BTreeMap::new(),
            instantiated: false,
        }
    }

    pub(crate) fn with_instances(
        asset: SliceAssetId,
        instances: impl IntoIterator<Item = SliceInstance>,
    ) -> Self {
        Self {
            asset,
            instances: instances.into_iter().map(|i| (i.id(), i)).collect(),
            instantiated: false,
        }
    }

    /// The source asset.
    #[must_use]
    pub fn asset(&self) -> SliceAssetId {
        self.asset
    }

    /// Returns true once [`instantiate`](Self::instantiate) has run.
    #[must_use]
    pub fn is_instantiated(&self) -> bool {
        self.instantiated
    }

    /// Returns true if the reference or any of its instances still needs
    /// entities built.
    #[must_use]
    pub fn needs_instantiation(&self) -> bool {
        !self.instantiated || self.instances.values().any(|i| !i.is_instantiated())
    }

    pub(crate) fn set_instantiated(&mut self, instantiated: bool) {
        self.instantiated = instantiated;
    }

    /// Adds a new instance.
    ///
    /// If the reference is already instantiated and `source` is given, the
    /// instance is built immediately; otherwise it waits for the next
    /// [`instantiate`](Self::instantiate).
    ///
    /// `claimed` maps every live id already owned in the component to its
    /// owner's base id; the new instance's ids are added to it.
    ///
    /// # Errors
    ///
    /// Returns an error if immediate instantiation fails, including
    /// [`IdCollision`](ErrorKind::IdCollision) when a new live id is already
    /// claimed. The instance is not added in that case.
    pub fn create_instance(
        &mut self,
        mapper: Option<CustomIdMapper>,
        source: Option<&SourceGraph>,
        ids: &mut dyn IdGenerator,
        claimed: &mut HashMap<EntityId, EntityId>,
    ) -> Result<SliceInstanceId> {
        let id = SliceInstanceId::random();
        let mut instance = SliceInstance::new(id, mapper);
        if let (true, Some(source)) = (self.instantiated, source) {
            instance.instantiate(source, ids)?;
            self.claim(&instance, claimed)?;
        }
        debug!(asset = %self.asset, instance = %id, "created slice instance");
        self.instances.insert(id, instance);
        Ok(id)
    }

    /// Adds an existing instance, for example one moved from another
    /// component.
    ///
    /// # Errors
    ///
    /// Returns [`Internal`](ErrorKind::Internal) if an
    /// instance with the same id is already present.
    pub fn insert_instance(&mut self, instance: SliceInstance) -> Result<()> {
        let id = instance.id();
        if self.instances.contains_key(&id) {
            return Err(
                Error::new(ErrorKind::Internal(format!("slice instance {id} already present")))
                    .with_context(ErrorContext::new().with_asset(self.asset)),
            );
        }
        self.instances.insert(id, instance);
        Ok(())
    }

    /// Deep-copies an instance under a new instance id and fresh entity ids.
    ///
    /// Returns the new instance id and the map from the original's live ids
    /// to the copy's.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceNotFound`](ErrorKind::InstanceNotFound)
    /// if `instance` is not part of this reference.
    pub fn clone_instance(
        &mut self,
        instance: SliceInstanceId,
        ids: &mut dyn IdGenerator,
    ) -> Result<(SliceInstanceId, EntityIdMap)> {
        let original = self.instances.get(&instance).ok_or_else(|| {
            Error::instance_not_found(instance).with_context(ErrorContext::new().with_asset(self.asset))
        })?;
        let id = SliceInstanceId::random();
        let (copy, source_to_clone) = original.clone_with_new_ids(id, ids)?;
        debug!(asset = %self.asset, from = %instance, to = %id, "cloned slice instance");
        self.instances.insert(id, copy);
        Ok((id, source_to_clone))
    }

    /// Detaches an instance, handing ownership of its entities to the caller.
    pub fn remove_instance(&mut self, instance: SliceInstanceId) -> Option<RemovedInstance> {
        let instance = self.instances.remove(&instance)?;
        Some(RemovedInstance {
            instance,
            reference_empty: self.instances.is_empty(),
        })
    }

    /// Removes one live entity.
    ///
    /// Searches `instance` if given, every instance otherwise. When
    /// `is_delete` is false the entity is handed back. An instance left with
    /// no live entities is removed too if `remove_empty_instance` is set.
    pub fn remove_entity(
        &mut self,
        entity: EntityId,
        is_delete: bool,
        remove_empty_instance: bool,
        instance: Option<SliceInstanceId>,
    ) -> Option<EntityRemoval> {
        let owner = match instance {
            Some(id) => id,
            None => self.find_entity_instance(entity)?,
        };
        let slot = self.instances.get_mut(&owner)?;
        let removed = slot.take_entity(entity)?;

        let instance_removed = remove_empty_instance && slot.entities().is_empty();
        if instance_removed {
            self.instances.remove(&owner);
            debug!(asset = %self.asset, instance = %owner, "removed empty slice instance");
        }

        Some(EntityRemoval {
            entity: (!is_delete).then_some(removed),
            instance: owner,
            instance_removed,
        })
    }

    /// The instance owning a live entity.
    #[must_use]
    pub fn find_entity_instance(&self, entity: EntityId) -> Option<SliceInstanceId> {
        self.instances
            .values()
            .find(|i| i.instantiated().is_some_and(|c| c.all_ids().any(|id| id == entity)))
            .map(SliceInstance::id)
    }

    /// Re-derives the patches of every instantiated instance.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`SliceInstance::compute_data_patch`].
    pub fn compute_data_patch(&mut self, source: &SourceGraph) -> Result<()> {
        for instance in self.instances.values_mut().filter(|i| i.is_instantiated()) {
            instance.compute_data_patch(source)?;
        }
        Ok(())
    }

    /// Builds the live entities of every instance that has none.
    ///
    /// Either all instances are built or none is: on error the reference is
    /// left as it was. `claimed` holds the live ids already owned in the
    /// component, mapped to their owner's base id, and receives the ids
    /// built here.
    ///
    /// # Errors
    ///
    /// Returns the first instantiation error, or
    /// [`IdCollision`](ErrorKind::IdCollision) if a built id is already
    /// claimed by another owner.
    pub fn instantiate(
        &mut self,
        source: &SourceGraph,
        ids: &mut dyn IdGenerator,
        claimed: &mut HashMap<EntityId, EntityId>,
    ) -> Result<Vec<StaleEdit>> {
        let mut staged = self.instances.clone();
        let mut stale = Vec::new();
        for instance in staged.values_mut().filter(|i| !i.is_instantiated()) {
            stale.extend(instance.instantiate(source, ids)?);
            self.claim(instance, claimed)?;
        }
        self.instances = staged;
        self.instantiated = true;
        debug!(
            asset = %self.asset,
            instances = self.instances.len(),
            stale = stale.len(),
            "instantiated slice reference"
        );
        Ok(stale)
    }

    /// Records a freshly built instance's live ids in `claimed`.
    fn claim(&self, instance: &SliceInstance, claimed: &mut HashMap<EntityId, EntityId>) -> Result<()> {
        for id in instance.instantiated().into_iter().flat_map(InstantiatedContainer::all_ids) {
            let base = instance.base_id(id).unwrap_or(id);
            if let Some(&first) = claimed.get(&id) {
                return Err(Error::id_collision(id, first, base).with_context(
                    ErrorContext::new()
                        .with_asset(self.asset)
                        .with_instance(instance.id()),
                ));
            }
            claimed.insert(id, base);
        }
        Ok(())
    }

    /// Drops every instance's live entities. Patches and id maps are kept.
    pub fn uninstantiate(&mut self) {
        for instance in self.instances.values_mut() {
            instance.uninstantiate();
        }
        self.instantiated = false;
    }

    /// Looks up an instance.
    #[must_use]
    pub fn instance(&self, id: SliceInstanceId) -> Option<&SliceInstance> {
        self.instances.get(&id)
    }

    /// Looks up an instance mutably.
    pub fn instance_mut(&mut self, id: SliceInstanceId) -> Option<&mut SliceInstance> {
        self.instances.get_mut(&id)
    }

    /// Iterates instances in id order.
    pub fn instances(&self) -> impl Iterator<Item = &SliceInstance> {
        self.instances.values()
    }

    pub(crate) fn instances_mut(&mut self) -> impl Iterator<Item = &mut SliceInstance> {
        self.instances.values_mut()
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns true if there are no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Walks a live entity's base ids up through nested assets.
    ///
    /// The first entry is the entity's base in this reference's asset; each
    /// following entry is the base of the previous one in the asset it was
    /// instanced from. Stops after `max_levels` entries, at a directly
    /// authored entity, or at an asset the provider cannot load.
    pub fn instance_entity_ancestry(
        &self,
        entity: EntityId,
        max_levels: usize,
        provider: &dyn AssetProvider,
    ) -> Vec<EntityAncestor> {
        let mut ancestors = Vec::new();
        let Some(mut base) = self.instances.values().find_map(|i| i.base_id(entity)) else {
            return ancestors;
        };
        let mut asset = self.asset;

        while ancestors.len() < max_levels {
            ancestors.push(EntityAncestor { asset, entity: base });
            let Some(handle) = provider.load_slice(asset) else {
                break;
            };
            let next = handle.with_component(|component| {
                if !component.is_instantiated() {
                    component.instantiate(provider)?;
                }
                Ok(component.find_slice(base).and_then(|address| {
                    let parent = component.instance(address)?.base_id(base)?;
                    Some((address.asset, parent))
                }))
            });
            match next {
                Ok(Some((parent_asset, parent))) => {
                    asset = parent_asset;
                    base = parent;
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(%asset, error = %e, "stopped entity ancestry walk");
                    break;
                }
            }
        }
        ancestors
    }
}
