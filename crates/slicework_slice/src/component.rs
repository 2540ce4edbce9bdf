//! The composition root.
//!
//! A [`SliceComponent`] owns directly authored entities and one
//! [`SliceReference`] per referenced asset. Every entity it holds is either
//! direct or live in exactly one instance; [`SliceComponent::find_slice`]
//! tells which.
//!
//! Instantiation recurses through the asset graph: building an instance needs
//! the source asset's full entity graph, which needs that asset's own
//! references built first. An [`InstantiationCycleGuard`] created per
//! top-level call is threaded through the recursion.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use slicework_foundation::{
    EntityId, Error, ErrorContext, ErrorKind, FieldAddress, Result, SliceAssetId, SliceInstanceId,
};
use slicework_patch::{
    CustomIdMapper, DataFlags, EntityIdMap, EntityIdRemapper, FlagsMap, IdGenerator,
    RandomIdGenerator,
};
use slicework_tree::{Entity, InstantiatedContainer};
use tracing::{debug, warn};

use crate::asset::AssetProvider;
use crate::config::SliceConfig;
use crate::document::{SliceDocument, SliceInstanceRecord, SliceReferenceRecord};
use crate::guard::InstantiationCycleGuard;
use crate::instance::{SliceInstance, SliceInstanceAddress, SourceGraph};
use crate::reference::SliceReference;

/// Name given to a component's metadata entity.
pub const METADATA_ENTITY_NAME: &str = "SliceMetadata";

/// What a successful [`SliceComponent::instantiate`] did.
#[derive(Debug, Default)]
pub struct InstantiateReport {
    /// Recoverable problems: missing assets (partial mode) and stale edits.
    pub warnings: Vec<Error>,
    /// References instantiated by this call, nested assets excluded.
    pub instantiated_references: usize,
}

impl InstantiateReport {
    /// Returns true if there were no warnings.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Where an extracted entity came from, enough to put it back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestoreInfo {
    /// Source asset of the owning reference.
    pub asset: SliceAssetId,
    /// Owning instance.
    pub instance: SliceInstanceId,
    /// The entity's base id in the source asset.
    pub ancestor: EntityId,
    /// The entity's override flags.
    pub flags: FlagsMap,
}

/// Policy for one instantiation call tree, taken from the root component.
#[derive(Clone, Copy, Debug)]
struct InstantiateContext {
    allow_partial: bool,
    report_stale: bool,
}

/// Direct entities plus slice references.
#[derive(Clone)]
pub struct SliceComponent {
    asset_id: Option<SliceAssetId>,
    entities: Vec<Entity>,
    slices: Vec<SliceReference>,
    metadata_entity: Entity,
    entity_info: OnceLock<HashMap<EntityId, Option<SliceInstanceAddress>>>,
    instantiated: bool,
    config: SliceConfig,
    ids: Arc<Mutex<Box<dyn IdGenerator>>>,
}

impl fmt::Debug for SliceComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceComponent")
            .field("asset_id", &self.asset_id)
            .field("entities", &self.entities.len())
            .field("slices", &self.slices)
            .field("metadata_entity", &self.metadata_entity.id())
            .field("instantiated", &self.instantiated)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for SliceComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl SliceComponent {
    /// Creates an empty component with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SliceConfig::default())
    }

    /// Creates an empty component.
    #[must_use]
    pub fn with_config(config: SliceConfig) -> Self {
        let mut ids: Box<dyn IdGenerator> = match config.id_seed {
            Some(seed) => Box::new(RandomIdGenerator::seeded(seed)),
            None => Box::new(RandomIdGenerator::new()),
        };
        let metadata_entity = Entity::new(ids.next_id(), METADATA_ENTITY_NAME);
        Self {
            asset_id: None,
            entities: Vec::new(),
            slices: Vec::new(),
            metadata_entity,
            entity_info: OnceLock::new(),
            instantiated: false,
            config,
            ids: Arc::new(Mutex::new(ids)),
        }
    }

    /// The asset this component is, if it is one.
    #[must_use]
    pub fn asset_id(&self) -> Option<SliceAssetId> {
        self.asset_id
    }

    pub(crate) fn set_asset_id(&mut self, asset: Option<SliceAssetId>) {
        self.asset_id = asset;
    }

    /// The component's configuration.
    #[must_use]
    pub fn config(&self) -> &SliceConfig {
        &self.config
    }

    /// Allows or forbids skipping missing assets during instantiation.
    pub fn set_allow_partial_instantiation(&mut self, allow: bool) {
        self.config.allow_partial_instantiation = allow;
    }

    /// Returns true once [`instantiate`](Self::instantiate) has run.
    #[must_use]
    pub fn is_instantiated(&self) -> bool {
        self.instantiated
    }

    /// The component's own metadata entity.
    #[must_use]
    pub fn metadata_entity(&self) -> &Entity {
        &self.metadata_entity
    }

    fn context(&self) -> InstantiateContext {
        InstantiateContext {
            allow_partial: self.config.allow_partial_instantiation,
            report_stale: self.config.report_stale_edits,
        }
    }

    // -------------------------------------------------------------------------
    // Entity info
    // -------------------------------------------------------------------------

    fn entity_info(&self) -> &HashMap<EntityId, Option<SliceInstanceAddress>> {
        self.entity_info.get_or_init(|| {
            let mut info: HashMap<_, _> = self.entities.iter().map(|e| (e.id(), None)).collect();
            for reference in &self.slices {
                for instance in reference.instances() {
                    let address = SliceInstanceAddress::new(reference.asset(), instance.id());
                    if let Some(live) = instance.instantiated() {
                        info.extend(live.all_ids().map(|id| (id, Some(address))));
                    }
                }
            }
            info
        })
    }

    /// Every id owned here, mapped to its owner's base id. Direct and
    /// metadata entities map to themselves.
    fn claimed_ids(&self) -> HashMap<EntityId, EntityId> {
        let mut claimed: HashMap<_, _> = self
            .entity_info()
            .iter()
            .map(|(&id, &address)| {
                let base = address
                    .and_then(|address| self.instance(address)?.base_id(id))
                    .unwrap_or(id);
                (id, base)
            })
            .collect();
        claimed.insert(self.metadata_entity.id(), self.metadata_entity.id());
        claimed
    }

    fn invalidate_entity_info(&mut self) {
        self.entity_info = OnceLock::new();
    }

    // -------------------------------------------------------------------------
    // Direct entities
    // -------------------------------------------------------------------------

    /// Takes ownership of a directly authored entity.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateEntity`](ErrorKind::DuplicateEntity) if the id is
    /// already used anywhere in the component. Nothing changes in that case.
    pub fn add_entity(&mut self, entity: Entity) -> Result<()> {
        let id = entity.id();
        if self.entity_info().contains_key(&id) || id == self.metadata_entity.id() {
            return Err(Error::duplicate_entity(id));
        }
        self.entities.push(entity);
        self.invalidate_entity_info();
        Ok(())
    }

    /// Directly authored entities.
    #[must_use]
    pub fn new_entities(&self) -> &[Entity] {
        &self.entities
    }

    fn all_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().chain(
            self.slices
                .iter()
                .flat_map(|r| r.instances())
                .flat_map(SliceInstance::entities),
        )
    }

    /// Ids of every entity, direct and live. Metadata entities are excluded.
    #[must_use]
    pub fn entity_ids(&self) -> BTreeSet<EntityId> {
        self.all_entities().map(Entity::id).collect()
    }

    /// Finds an entity, direct or live.
    #[must_use]
    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        if let Some(entity) = self.entities.iter().find(|e| e.id() == id) {
            return Some(entity);
        }
        self.instance(self.find_slice(id)?)?.entity(id)
    }

    /// Finds an entity mutably.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if let Some(pos) = self.entities.iter().position(|e| e.id() == id) {
            return self.entities.get_mut(pos);
        }
        let address = self.find_slice(id)?;
        self.instance_mut(address)?.entity_mut(id)
    }

    /// Returns true if the component holds the entity.
    #[must_use]
    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.entity_info().contains_key(&id)
    }

    /// The instance owning an entity, or `None` for direct or unknown
    /// entities.
    #[must_use]
    pub fn find_slice(&self, id: EntityId) -> Option<SliceInstanceAddress> {
        self.entity_info().get(&id).copied().flatten()
    }

    /// Every entity, building instances first if needed.
    ///
    /// # Errors
    ///
    /// Returns an error only if instantiation fails hard.
    pub fn get_entities(&mut self, provider: &dyn AssetProvider) -> Result<Vec<&Entity>> {
        if !self.instantiated {
            self.instantiate(provider)?;
        }
        Ok(self.all_entities().collect())
    }

    /// Removes an entity, direct or live.
    ///
    /// When `is_delete` is false the entity is handed back. An instance left
    /// without live entities is dropped if `remove_empty_instance` is set, and
    /// a reference left without instances is dropped with it.
    ///
    /// # Errors
    ///
    /// Returns [`EntityNotFound`](ErrorKind::EntityNotFound) if the
    /// component does not hold the entity.
    pub fn remove_entity(
        &mut self,
        id: EntityId,
        is_delete: bool,
        remove_empty_instance: bool,
    ) -> Result<Option<Entity>> {
        if let Some(pos) = self.entities.iter().position(|e| e.id() == id) {
            let entity = self.entities.remove(pos);
            self.invalidate_entity_info();
            return Ok((!is_delete).then_some(entity));
        }

        let address = self.find_slice(id).ok_or_else(|| Error::entity_not_found(id))?;
        let index = self
            .reference_index(address.asset)
            .ok_or_else(|| Error::entity_not_found(id))?;
        let removal = self.slices[index]
            .remove_entity(id, is_delete, remove_empty_instance, Some(address.instance))
            .ok_or_else(|| Error::entity_not_found(id))?;
        if self.slices[index].is_empty() {
            debug!(asset = %address.asset, "dropping empty slice reference");
            self.slices.remove(index);
        }
        self.invalidate_entity_info();
        Ok(removal.entity)
    }

    // -------------------------------------------------------------------------
    // References and instances
    // -------------------------------------------------------------------------

    fn reference_index(&self, asset: SliceAssetId) -> Option<usize> {
        self.slices.iter().position(|r| r.asset() == asset)
    }

    /// All references, in the order they were added.
    #[must_use]
    pub fn slices(&self) -> &[SliceReference] {
        &self.slices
    }

    /// The reference for `asset`.
    #[must_use]
    pub fn slice(&self, asset: SliceAssetId) -> Option<&SliceReference> {
        self.slices.iter().find(|r| r.asset() == asset)
    }

    /// The reference for `asset`, mutably.
    pub fn slice_mut(&mut self, asset: SliceAssetId) -> Option<&mut SliceReference> {
        self.invalidate_entity_info();
        self.slices.iter_mut().find(|r| r.asset() == asset)
    }

    /// Looks up an instance.
    #[must_use]
    pub fn instance(&self, address: SliceInstanceAddress) -> Option<&SliceInstance> {
        self.slice(address.asset)?.instance(address.instance)
    }

    /// Looks up an instance mutably.
    pub fn instance_mut(&mut self, address: SliceInstanceAddress) -> Option<&mut SliceInstance> {
        self.slices
            .iter_mut()
            .find(|r| r.asset() == address.asset)?
            .instance_mut(address.instance)
    }

    /// Adds an instance of `asset`.
    ///
    /// If the component is already instantiated the instance is built right
    /// away; otherwise it waits for the next [`instantiate`](Self::instantiate).
    ///
    /// # Errors
    ///
    /// Returns [`MissingAsset`](ErrorKind::MissingAsset) if the component is
    /// instantiated, the asset cannot be loaded and partial instantiation is
    /// off, [`CyclicDependency`](ErrorKind::CyclicDependency) if `asset`
    /// leads back to this component's own asset, or any instantiation error.
    /// The component is unchanged on error.
    pub fn add_slice(
        &mut self,
        asset: SliceAssetId,
        mapper: Option<CustomIdMapper>,
        provider: &dyn AssetProvider,
    ) -> Result<SliceInstanceAddress> {
        let source = if self.instantiated {
            let source = self.load_source(asset, provider)?;
            if source.is_none() {
                Self::missing_asset(asset, self.context(), &mut Vec::new())?;
            }
            source
        } else {
            None
        };

        let index = if let Some(index) = self.reference_index(asset) {
            index
        } else {
            let mut reference = SliceReference::new(asset);
            reference.set_instantiated(source.is_some());
            self.slices.push(reference);
            self.slices.len() - 1
        };

        let mut claimed = self.claimed_ids();
        let created = {
            let mut ids = self.ids.lock();
            self.slices[index].create_instance(mapper, source.as_ref(), &mut **ids, &mut claimed)
        };
        let instance = match created {
            Ok(instance) => instance,
            Err(e) => {
                if self.slices[index].is_empty() {
                    self.slices.remove(index);
                }
                return Err(e);
            }
        };

        self.invalidate_entity_info();
        Ok(SliceInstanceAddress::new(asset, instance))
    }

    /// Moves an instance, typically detached from another component, into
    /// this one.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateEntity`](ErrorKind::DuplicateEntity) if any of the
    /// instance's live ids is already used here.
    pub fn add_slice_instance(
        &mut self,
        asset: SliceAssetId,
        instance: SliceInstance,
    ) -> Result<SliceInstanceAddress> {
        let info = self.entity_info();
        let metadata = self.metadata_entity.id();
        if let Some(duplicate) = instance
            .instantiated()
            .into_iter()
            .flat_map(InstantiatedContainer::all_ids)
            .find(|id| info.contains_key(id) || *id == metadata)
        {
            return Err(Error::duplicate_entity(duplicate));
        }

        let address = SliceInstanceAddress::new(asset, instance.id());
        if let Some(index) = self.reference_index(asset) {
            self.slices[index].insert_instance(instance)?;
        } else {
            let mut reference = SliceReference::new(asset);
            reference.set_instantiated(instance.is_instantiated());
            reference.insert_instance(instance)?;
            self.slices.push(reference);
        }
        self.invalidate_entity_info();
        Ok(address)
    }

    /// Copies an instance under fresh ids, in the same reference.
    ///
    /// Returns the new address and the map from the original's live ids to
    /// the copy's.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceNotFound`](ErrorKind::InstanceNotFound) if the
    /// instance does not exist.
    pub fn clone_instance(
        &mut self,
        address: SliceInstanceAddress,
    ) -> Result<(SliceInstanceAddress, EntityIdMap)> {
        let index = self
            .reference_index(address.asset)
            .ok_or_else(|| Error::instance_not_found(address.instance))?;
        let (instance, map) = {
            let mut ids = self.ids.lock();
            self.slices[index].clone_instance(address.instance, &mut **ids)?
        };
        self.invalidate_entity_info();
        Ok((SliceInstanceAddress::new(address.asset, instance), map))
    }

    /// Drops the reference to `asset` with all its instances.
    pub fn remove_slice(&mut self, asset: SliceAssetId) -> Option<SliceReference> {
        let index = self.reference_index(asset)?;
        let reference = self.slices.remove(index);
        debug!(%asset, instances = reference.len(), "removed slice reference");
        self.invalidate_entity_info();
        Some(reference)
    }

    /// Detaches an instance. Its reference is dropped if it was the last one.
    pub fn remove_slice_instance(&mut self, address: SliceInstanceAddress) -> Option<SliceInstance> {
        let index = self.reference_index(address.asset)?;
        let removed = self.slices[index].remove_instance(address.instance)?;
        if removed.reference_empty {
            debug!(asset = %address.asset, "dropping empty slice reference");
            self.slices.remove(index);
        }
        self.invalidate_entity_info();
        Some(removed.instance)
    }

    /// Sets override flags on a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`EntityNotFound`](ErrorKind::EntityNotFound) if the entity is
    /// not live in any instance.
    pub fn set_data_flags(
        &mut self,
        entity: EntityId,
        address: FieldAddress,
        flags: DataFlags,
    ) -> Result<()> {
        let owner = self.find_slice(entity).ok_or_else(|| Error::entity_not_found(entity))?;
        self.instance_mut(owner)
            .ok_or_else(|| Error::entity_not_found(entity))?
            .set_data_flags(entity, address, flags)
    }

    // -------------------------------------------------------------------------
    // Restore
    // -------------------------------------------------------------------------

    /// Captures where a live entity came from, so it can be restored after
    /// being removed.
    #[must_use]
    pub fn entity_restore_info(&self, id: EntityId) -> Option<RestoreInfo> {
        let address = self.find_slice(id)?;
        let instance = self.instance(address)?;
        Some(RestoreInfo {
            asset: address.asset,
            instance: address.instance,
            ancestor: instance.base_id(id)?,
            flags: instance
                .data_flags()
                .entity_flags(id)
                .cloned()
                .unwrap_or_default(),
        })
    }

    /// Puts an extracted entity back into the instance slot it came from,
    /// recreating the reference and instance if they are gone.
    ///
    /// Returns the existing address if the entity is already live.
    ///
    /// # Errors
    ///
    /// Returns [`NotInstantiated`](ErrorKind::NotInstantiated) if the
    /// component is not instantiated, [`MissingAsset`](ErrorKind::MissingAsset)
    /// if the source cannot be loaded, [`EntityNotFound`](ErrorKind::EntityNotFound)
    /// if the ancestor no longer exists in the source, or
    /// [`DuplicateEntity`](ErrorKind::DuplicateEntity) if the id is taken by a
    /// direct entity.
    pub fn restore_entity(
        &mut self,
        entity: Entity,
        info: &RestoreInfo,
        provider: &dyn AssetProvider,
    ) -> Result<SliceInstanceAddress> {
        let context = || {
            ErrorContext::new()
                .with_asset(info.asset)
                .with_instance(info.instance)
        };
        if !self.instantiated {
            return Err(Error::new(ErrorKind::NotInstantiated).with_context(context()));
        }
        let source = self
            .load_source(info.asset, provider)?
            .ok_or_else(|| Error::missing_asset(info.asset))?;
        let source_container = source.container()?;
        if source_container.entity(info.ancestor).is_none() {
            return Err(Error::entity_not_found(info.ancestor).with_context(context()));
        }

        if let Some(existing) = self.find_slice(entity.id()) {
            return Ok(existing);
        }
        if self.contains_entity(entity.id()) {
            return Err(Error::duplicate_entity(entity.id()).with_context(context()));
        }

        let index = if let Some(index) = self.reference_index(info.asset) {
            index
        } else {
            let mut reference = SliceReference::new(info.asset);
            reference.set_instantiated(true);
            self.slices.push(reference);
            self.slices.len() - 1
        };

        if self.slices[index].instance(info.instance).is_none() {
            let metadata = InstantiatedContainer::new(Vec::new(), source_container.metadata_entities);
            let (tree, map) = {
                let mut ids = self.ids.lock();
                EntityIdRemapper::clone_and_generate_new_ids(&metadata.to_tree(), &mut **ids, None)?
            };
            let mut instance = SliceInstance::new(info.instance, None);
            instance.merge_map(&map);
            instance.set_instantiated(
                InstantiatedContainer::from_tree(&tree)?,
                map.get(source.metadata_entity),
            );
            self.slices[index].insert_instance(instance)?;
            debug!(asset = %info.asset, instance = %info.instance, "recreated slice instance for restore");
        }

        let slot = self.slices[index]
            .instance_mut(info.instance)
            .ok_or_else(|| Error::instance_not_found(info.instance))?;
        slot.add_entity(entity, Some(info.ancestor), info.flags.clone());

        self.invalidate_entity_info();
        Ok(SliceInstanceAddress::new(info.asset, info.instance))
    }

    // -------------------------------------------------------------------------
    // Instantiation
    // -------------------------------------------------------------------------

    /// Builds the live entities of every reference, recursing through nested
    /// assets.
    ///
    /// With partial instantiation allowed, missing assets are skipped and
    /// reported as warnings; the skipped references are retried on the next
    /// call.
    ///
    /// # Errors
    ///
    /// Returns [`CyclicDependency`](ErrorKind::CyclicDependency) with the
    /// offending chain if the asset graph loops, and
    /// [`IdCollision`](ErrorKind::IdCollision) if a built id is already owned
    /// by a direct entity or another instance. Every reference built by the
    /// call is rolled back on those errors.
    ///
    /// Returns [`MissingAsset`](ErrorKind::MissingAsset) if an asset is
    /// missing and partial instantiation is off. References instantiated
    /// before that failure stay instantiated.
    pub fn instantiate(&mut self, provider: &dyn AssetProvider) -> Result<InstantiateReport> {
        let ctx = self.context();
        let mut guard = InstantiationCycleGuard::new();
        if let Some(own) = self.asset_id {
            guard.push(own);
        }
        let result = self.instantiate_with(provider, &mut guard, ctx);
        if let Some(own) = self.asset_id {
            guard.pop(own);
        }

        if let Ok(report) = &result {
            debug!(
                references = report.instantiated_references,
                warnings = report.warnings.len(),
                "instantiated slice component"
            );
        }
        result
    }

    fn instantiate_with(
        &mut self,
        provider: &dyn AssetProvider,
        guard: &mut InstantiationCycleGuard,
        ctx: InstantiateContext,
    ) -> Result<InstantiateReport> {
        let mut report = InstantiateReport::default();
        let mut claimed = self.claimed_ids();
        let mut built: Vec<(usize, SliceReference)> = Vec::new();

        for index in 0..self.slices.len() {
            if !self.slices[index].needs_instantiation() {
                continue;
            }
            let asset = self.slices[index].asset();
            let fetched = match Self::fetch_source(asset, provider, guard, ctx) {
                Ok(fetched) => fetched,
                Err(e) => return Err(self.roll_back(built, e)),
            };
            let Some((source, warnings)) = fetched else {
                Self::missing_asset(asset, ctx, &mut report.warnings)?;
                continue;
            };
            report.warnings.extend(warnings);

            let previous = self.slices[index].clone();
            let result = {
                let mut ids = self.ids.lock();
                self.slices[index].instantiate(&source, &mut **ids, &mut claimed)
            };
            let stale = match result {
                Ok(stale) => stale,
                Err(e) => return Err(self.roll_back(built, e)),
            };
            built.push((index, previous));
            if ctx.report_stale {
                for edit in &stale {
                    warn!(%asset, address = %edit.address, op = edit.op.kind_name(), "dropped stale patch edit");
                }
            }
            report.warnings.extend(stale.iter().map(Error::from));
            report.instantiated_references += 1;
        }

        self.instantiated = true;
        self.invalidate_entity_info();
        Ok(report)
    }

    /// Restores the references built by a failed instantiation and hands
    /// back the error.
    fn roll_back(&mut self, built: Vec<(usize, SliceReference)>, error: Error) -> Error {
        if !built.is_empty() {
            warn!(references = built.len(), error = %error, "rolling back slice instantiation");
        }
        for (index, previous) in built.into_iter().rev() {
            self.slices[index] = previous;
        }
        self.invalidate_entity_info();
        error
    }

    fn missing_asset(
        asset: SliceAssetId,
        ctx: InstantiateContext,
        warnings: &mut Vec<Error>,
    ) -> Result<()> {
        let error = Error::missing_asset(asset);
        if ctx.allow_partial {
            warn!(%asset, "slice asset missing, reference left uninstantiated");
            warnings.push(error);
            Ok(())
        } else {
            Err(error)
        }
    }

    /// Loads `asset` and builds its full entity graph.
    ///
    /// `Ok(None)` means the provider does not have the asset.
    fn fetch_source(
        asset: SliceAssetId,
        provider: &dyn AssetProvider,
        guard: &mut InstantiationCycleGuard,
        ctx: InstantiateContext,
    ) -> Result<Option<(SourceGraph, Vec<Error>)>> {
        if let Some(chain) = guard.cycle_report(asset) {
            return Err(Error::cyclic_dependency(chain));
        }
        let Some(handle) = provider.load_slice(asset) else {
            return Ok(None);
        };
        guard.push(asset);
        let result =
            handle.with_component(|component| component.source_graph(asset, provider, guard, ctx));
        guard.pop(asset);
        result.map(Some)
    }

    /// Source graph of `asset` for a one-off operation outside
    /// [`instantiate`](Self::instantiate). Nested warnings are logged where
    /// they occur and otherwise dropped.
    fn load_source(
        &self,
        asset: SliceAssetId,
        provider: &dyn AssetProvider,
    ) -> Result<Option<SourceGraph>> {
        let mut guard = InstantiationCycleGuard::new();
        if let Some(own) = self.asset_id {
            guard.push(own);
        }
        let result = Self::fetch_source(asset, provider, &mut guard, self.context());
        if let Some(own) = self.asset_id {
            guard.pop(own);
        }
        Ok(result?.map(|(source, _)| source))
    }

    /// Everything this component yields when used as a source: direct and
    /// live entities, and all metadata entities.
    fn source_graph(
        &mut self,
        asset: SliceAssetId,
        provider: &dyn AssetProvider,
        guard: &mut InstantiationCycleGuard,
        ctx: InstantiateContext,
    ) -> Result<(SourceGraph, Vec<Error>)> {
        let report = self.instantiate_with(provider, guard, ctx)?;
        let container = InstantiatedContainer::new(
            self.all_entities().cloned().collect(),
            self.all_metadata_entities().into_iter().cloned().collect(),
        );
        Ok((
            SourceGraph::new(asset, &container, self.metadata_entity.id()),
            report.warnings,
        ))
    }

    /// Drops every instance's live entities. Patches and id maps are kept,
    /// so call [`prepare_save`](Self::prepare_save) first to keep live edits.
    pub fn uninstantiate(&mut self) {
        for reference in &mut self.slices {
            reference.uninstantiate();
        }
        self.instantiated = false;
        self.invalidate_entity_info();
    }

    /// Recomputes the data patch of every instantiated reference from the
    /// live entities.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be built. Missing assets are
    /// skipped when partial instantiation is allowed.
    pub fn prepare_save(&mut self, provider: &dyn AssetProvider) -> Result<()> {
        for index in 0..self.slices.len() {
            if !self.slices[index].is_instantiated() {
                continue;
            }
            let asset = self.slices[index].asset();
            match self.load_source(asset, provider)? {
                Some(source) => self.slices[index].compute_data_patch(&source)?,
                None => Self::missing_asset(asset, self.context(), &mut Vec::new())?,
            }
        }
        Ok(())
    }

    /// Computes patches and stores the component through `provider` under
    /// its asset id.
    ///
    /// # Errors
    ///
    /// Returns [`Internal`](ErrorKind::Internal) if the component has no
    /// asset id, or any error from [`prepare_save`](Self::prepare_save) or
    /// the provider.
    pub fn save(&mut self, provider: &dyn AssetProvider) -> Result<()> {
        let asset = self.asset_id.ok_or_else(|| {
            Error::new(ErrorKind::Internal("component has no asset id".to_string()))
        })?;
        self.prepare_save(provider)?;
        provider.save_slice(asset, self)
    }

    // -------------------------------------------------------------------------
    // Metadata
    // -------------------------------------------------------------------------

    /// The metadata entity of each instance.
    #[must_use]
    pub fn instance_metadata_entities(&self) -> Vec<&Entity> {
        self.slices
            .iter()
            .flat_map(|r| r.instances())
            .filter_map(SliceInstance::metadata_entity)
            .collect()
    }

    /// The component's own metadata entity followed by every metadata entity
    /// its instances carry, nested ones included.
    #[must_use]
    pub fn all_metadata_entities(&self) -> Vec<&Entity> {
        std::iter::once(&self.metadata_entity)
            .chain(
                self.slices
                    .iter()
                    .flat_map(|r| r.instances())
                    .filter_map(SliceInstance::instantiated)
                    .flat_map(|c| c.metadata_entities.iter()),
            )
            .collect()
    }

    // -------------------------------------------------------------------------
    // Copies and ids
    // -------------------------------------------------------------------------

    /// Copies the whole component verbatim: same entity ids, same patches
    /// and flags.
    ///
    /// The copy does not get fresh ids. Instantiating it rebuilds the same
    /// live ids as the original, so the two must not share a world until
    /// [`generate_new_entity_ids`](Self::generate_new_entity_ids) has run on
    /// the copy.
    ///
    /// If `source_to_clone` is given it receives the identity mapping of
    /// every entity id in the copy.
    #[must_use]
    pub fn clone_component(&self, source_to_clone: Option<&mut EntityIdMap>) -> SliceComponent {
        if let Some(map) = source_to_clone {
            map.extend(
                self.entity_ids()
                    .into_iter()
                    .chain(self.all_metadata_entities().into_iter().map(Entity::id))
                    .map(|id| (id, id)),
            );
        }
        self.clone()
    }

    /// Gives every entity a fresh id: direct entities, the metadata entity,
    /// and every live id of every instance. References between entities are
    /// rewritten to match. Base ids and patches are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`IdCollision`](ErrorKind::IdCollision) if the generator
    /// repeats an id. The component is unchanged in that case.
    pub fn generate_new_entity_ids(&mut self, old_to_new: Option<&mut EntityIdMap>) -> Result<()> {
        let mut map = EntityIdMap::new();
        {
            let mut ids = self.ids.lock();
            let direct = self
                .entities
                .iter()
                .map(Entity::id)
                .chain(std::iter::once(self.metadata_entity.id()));
            for id in direct {
                map.insert(id, ids.next_id());
            }
            for instance in self.slices.iter().flat_map(|r| r.instances()) {
                for id in instance.known_ids() {
                    map.insert(id, ids.next_id());
                }
            }
        }
        map.validate_bijection()?;

        let own = InstantiatedContainer::new(self.entities.clone(), vec![self.metadata_entity.clone()]);
        let remapped = InstantiatedContainer::from_tree(&EntityIdRemapper::remap(&own.to_tree(), &map)?)?;
        let metadata_entity = remapped
            .metadata_entities
            .into_iter()
            .next()
            .ok_or_else(|| Error::malformed_tree("metadata entity lost during remap"))?;
        let mut slices = self.slices.clone();
        for instance in slices.iter_mut().flat_map(|r| r.instances_mut()) {
            instance.remap_live_ids(&map)?;
        }

        self.entities = remapped.entities;
        self.metadata_entity = metadata_entity;
        self.slices = slices;
        self.invalidate_entity_info();
        if let Some(out) = old_to_new {
            out.extend(map.iter());
        }
        Ok(())
    }

    /// Assets this component references, and with `recurse` the assets
    /// those reference in turn.
    #[must_use]
    pub fn referenced_slice_assets(
        &self,
        recurse: bool,
        provider: &dyn AssetProvider,
    ) -> BTreeSet<SliceAssetId> {
        let mut found = BTreeSet::new();
        self.collect_referenced(recurse, provider, &mut found);
        found
    }

    fn collect_referenced(
        &self,
        recurse: bool,
        provider: &dyn AssetProvider,
        found: &mut BTreeSet<SliceAssetId>,
    ) {
        for reference in &self.slices {
            let asset = reference.asset();
            if !found.insert(asset) || !recurse {
                continue;
            }
            let Some(handle) = provider.load_slice(asset) else {
                continue;
            };
            if let Err(e) = handle.with_component(|c| {
                c.collect_referenced(true, provider, found);
                Ok(())
            }) {
                debug!(%asset, error = %e, "skipped nested asset while collecting references");
            }
        }
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// The persisted form: authored state only.
    #[must_use]
    pub fn to_document(&self) -> SliceDocument {
        SliceDocument {
            asset_id: self.asset_id,
            entities: self.entities.clone(),
            metadata_entity: self.metadata_entity.clone(),
            slices: self
                .slices
                .iter()
                .map(|reference| SliceReferenceRecord {
                    asset: reference.asset(),
                    instances: reference
                        .instances()
                        .map(|instance| SliceInstanceRecord {
                            id: instance.id(),
                            entity_id_map: instance.entity_id_map().clone(),
                            patch: instance.patch().clone(),
                            data_flags: instance.data_flags().clone(),
                            metadata_entity: instance.metadata_entity_id(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Rebuilds an uninstantiated component from its persisted form.
    #[must_use]
    pub fn from_document(document: SliceDocument, config: SliceConfig) -> Self {
        let slices = document
            .slices
            .into_iter()
            .map(|record| {
                SliceReference::with_instances(
                    record.asset,
                    record.instances.into_iter().map(|i| {
                        SliceInstance::from_parts(
                            i.id,
                            i.entity_id_map,
                            i.patch,
                            i.data_flags,
                            i.metadata_entity,
                        )
                    }),
                )
            })
            .collect();
        Self {
            asset_id: document.asset_id,
            entities: document.entities,
            slices,
            metadata_entity: document.metadata_entity,
            ..Self::with_config(config)
        }
    }
}
