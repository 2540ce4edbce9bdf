//! Integration tests for adding, removing, and restoring instances and
//! entities.

use std::collections::HashMap;

use slicework_foundation::{EntityId, ErrorKind};
use slicework_patch::SequentialIdGenerator;
use slicework_slice::{MemoryAssetProvider, SliceComponent, SliceConfig, SliceReference};
use slicework_tree::Entity;

use crate::fixtures::{BULB, POST, height, lamppost, lamppost_id, live, root, set_height};

// =============================================================================
// Removing Instances
// =============================================================================

#[test]
fn reference_reports_when_last_instance_leaves() {
    let mut reference = SliceReference::new(lamppost_id());
    let mut ids = SequentialIdGenerator::default();
    let first = reference.create_instance(None, None, &mut ids, &mut HashMap::new()).unwrap();
    let second = reference.create_instance(None, None, &mut ids, &mut HashMap::new()).unwrap();

    let removed = reference.remove_instance(first).unwrap();
    assert!(!removed.reference_empty);
    let removed = reference.remove_instance(second).unwrap();
    assert!(removed.reference_empty);
    assert!(reference.remove_instance(second).is_none());
}

#[test]
fn removing_last_instance_drops_reference_from_component() {
    let provider = MemoryAssetProvider::new();
    provider.insert(lamppost_id(), lamppost(3));
    let mut level = root(2);
    let first = level.add_slice(lamppost_id(), None, &provider).unwrap();
    let second = level.add_slice(lamppost_id(), None, &provider).unwrap();
    level.instantiate(&provider).unwrap();

    let detached = level.remove_slice_instance(first).unwrap();
    assert_eq!(detached.entities().len(), 2);
    assert!(level.slice(lamppost_id()).is_some());

    level.remove_slice_instance(second).unwrap();
    assert!(level.slice(lamppost_id()).is_none());
    assert!(level.entity_ids().is_empty());
}

#[test]
fn remove_slice_drops_every_instance() {
    let provider = MemoryAssetProvider::new();
    provider.insert(lamppost_id(), lamppost(3));
    let mut level = root(2);
    level.add_slice(lamppost_id(), None, &provider).unwrap();
    level.add_slice(lamppost_id(), None, &provider).unwrap();
    level.instantiate(&provider).unwrap();

    let reference = level.remove_slice(lamppost_id()).unwrap();
    assert_eq!(reference.len(), 2);
    assert!(level.slices().is_empty());
    assert!(level.remove_slice(lamppost_id()).is_none());
}

// =============================================================================
// Removing Entities
// =============================================================================

#[test]
fn deleting_live_entity_keeps_non_empty_instance() {
    let provider = MemoryAssetProvider::new();
    provider.insert(lamppost_id(), lamppost(3));
    let mut level = root(2);
    let address = level.add_slice(lamppost_id(), None, &provider).unwrap();
    level.instantiate(&provider).unwrap();
    let bulb = live(&level, address, BULB);

    assert_eq!(level.remove_entity(bulb, true, true).unwrap(), None);
    assert!(!level.contains_entity(bulb));
    let instance = level.instance(address).unwrap();
    assert_eq!(instance.entities().len(), 1);
    assert!(instance.entity_id_map().get(BULB).is_none());
}

#[test]
fn deletion_is_recorded_in_patch() {
    let provider = MemoryAssetProvider::new();
    provider.insert(lamppost_id(), lamppost(3));
    let mut level = root(2);
    let address = level.add_slice(lamppost_id(), None, &provider).unwrap();
    level.instantiate(&provider).unwrap();
    let bulb = live(&level, address, BULB);
    level.remove_entity(bulb, true, false).unwrap();
    level.prepare_save(&provider).unwrap();
    assert_eq!(level.instance(address).unwrap().patch().len(), 1);

    level.uninstantiate();
    level.instantiate(&provider).unwrap();
    assert_eq!(level.instance(address).unwrap().entities().len(), 1);
}

#[test]
fn empty_instance_survives_unless_asked() {
    let provider = MemoryAssetProvider::new();
    provider.insert(lamppost_id(), lamppost(3));
    let mut level = root(2);
    let address = level.add_slice(lamppost_id(), None, &provider).unwrap();
    level.instantiate(&provider).unwrap();
    let post = live(&level, address, POST);
    let bulb = live(&level, address, BULB);

    level.remove_entity(post, true, false).unwrap();
    level.remove_entity(bulb, true, false).unwrap();
    assert!(level.instance(address).is_some());
    assert_eq!(level.slices().len(), 1);
}

#[test]
fn direct_entities_are_handed_back() {
    let mut level = root(2);
    level.add_entity(Entity::new(EntityId::new(1), "Ground")).unwrap();
    let entity = level.remove_entity(EntityId::new(1), false, true).unwrap();
    assert_eq!(entity.as_ref().map(Entity::id), Some(EntityId::new(1)));

    let err = level.remove_entity(EntityId::new(1), true, true).unwrap_err();
    assert_eq!(err.kind, ErrorKind::EntityNotFound(EntityId::new(1)));
}

// =============================================================================
// Restoring
// =============================================================================

#[test]
fn restored_entity_keeps_its_override() {
    let provider = MemoryAssetProvider::new();
    provider.insert(lamppost_id(), lamppost(3));
    let mut level = root(2);
    let address = level.add_slice(lamppost_id(), None, &provider).unwrap();
    level.instantiate(&provider).unwrap();
    let post = live(&level, address, POST);
    set_height(&mut level, post, 5);
    level.prepare_save(&provider).unwrap();
    let before = level.instance(address).unwrap().patch().clone();

    let info = level.entity_restore_info(post).unwrap();
    let entity = level.remove_entity(post, false, false).unwrap().unwrap();
    assert!(!level.contains_entity(post));

    level.restore_entity(entity, &info, &provider).unwrap();
    assert_eq!(level.find_slice(post), Some(address));
    assert_eq!(height(&level, post), Some(5));
    level.prepare_save(&provider).unwrap();
    assert_eq!(level.instance(address).unwrap().patch(), &before);
}

// =============================================================================
// Missing Assets
// =============================================================================

#[test]
fn skipped_reference_is_retried() {
    let provider = MemoryAssetProvider::new();
    let mut level = SliceComponent::with_config(SliceConfig::deterministic(2));
    let address = level.add_slice(lamppost_id(), None, &provider).unwrap();

    let report = level.instantiate(&provider).unwrap();
    assert_eq!(report.warnings.len(), 1);
    assert!(level.is_instantiated());
    assert!(!level.instance(address).unwrap().is_instantiated());

    provider.insert(lamppost_id(), lamppost(3));
    let report = level.instantiate(&provider).unwrap();
    assert!(report.is_clean());
    assert_eq!(height(&level, live(&level, address, POST)), Some(3));
}

#[test]
fn strict_mode_fails_on_missing_asset() {
    let provider = MemoryAssetProvider::new();
    let mut level = SliceComponent::with_config(SliceConfig::strict());
    level.add_slice(lamppost_id(), None, &provider).unwrap();
    let err = level.instantiate(&provider).unwrap_err();
    assert_eq!(err.kind, ErrorKind::MissingAsset(lamppost_id()));
}
