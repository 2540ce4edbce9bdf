//! Persistence integration tests
//!
//! Tests that authored state survives encoding and that live state is
//! rebuilt from it.

use slicework::foundation::{EntityId, ErrorKind, SliceAssetId, Value};
use slicework::patch::DataFlags;
use slicework::runtime::{from_bytes, to_bytes};
use slicework::slice::{AssetProvider, MemoryAssetProvider, SliceComponent, SliceConfig};
use slicework::tree::{Component, Entity};

const TRANSFORM: u64 = 1;
const POST: EntityId = EntityId::new(10);

fn lamp_id() -> SliceAssetId {
    SliceAssetId::from_u128(0x1A)
}

fn lamppost() -> SliceComponent {
    let mut component = SliceComponent::with_config(SliceConfig::deterministic(1));
    component
        .add_entity(Entity::new(POST, "Post").with_component(
            Component::new(TRANSFORM, "Transform")
                .with_field("height", 3i64)
                .with_field("color", "white"),
        ))
        .unwrap();
    component
}

fn value(component: &SliceComponent, id: EntityId, field: &str) -> Option<Value> {
    component
        .find_entity(id)?
        .component(TRANSFORM)?
        .value(field)
        .cloned()
}

fn edited_level(provider: &MemoryAssetProvider) -> (SliceComponent, EntityId) {
    let mut level = SliceComponent::with_config(SliceConfig::deterministic(2));
    level.add_entity(Entity::new(EntityId::new(1), "Ground")).unwrap();
    let address = level.add_slice(lamp_id(), None, provider).unwrap();
    level.instantiate(provider).unwrap();
    let post = level
        .instance(address)
        .and_then(|i| i.entity_id_map().get(POST))
        .unwrap();
    level
        .entity_mut(post)
        .and_then(|e| e.component_mut(TRANSFORM))
        .unwrap()
        .set_field("color", "amber");
    level
        .set_data_flags(
            post,
            Entity::field_address(TRANSFORM, "height"),
            DataFlags::PREVENT_OVERRIDE,
        )
        .unwrap();
    level.prepare_save(provider).unwrap();
    (level, post)
}

// =============================================================================
// Round Trips
// =============================================================================

#[test]
fn encoded_level_rebuilds_identically() {
    let provider = MemoryAssetProvider::new();
    provider.insert(lamp_id(), lamppost());
    let (level, post) = edited_level(&provider);

    let bytes = to_bytes(&level.to_document()).unwrap();
    let mut loaded = SliceComponent::from_document(from_bytes(&bytes).unwrap(), SliceConfig::deterministic(9));
    assert!(!loaded.is_instantiated());
    loaded.instantiate(&provider).unwrap();

    assert_eq!(loaded.entity_ids(), level.entity_ids());
    assert_eq!(loaded.metadata_entity(), level.metadata_entity());
    assert_eq!(value(&loaded, post, "color"), Some(Value::from("amber")));
    assert_eq!(loaded.to_document(), level.to_document());
}

#[test]
fn flags_survive_reload() {
    let provider = MemoryAssetProvider::new();
    provider.insert(lamp_id(), lamppost());
    let (level, post) = edited_level(&provider);

    let bytes = to_bytes(&level.to_document()).unwrap();
    let mut loaded = SliceComponent::from_document(from_bytes(&bytes).unwrap(), SliceConfig::deterministic(9));
    loaded.instantiate(&provider).unwrap();

    // The flagged height ignores local edits after the reload too.
    loaded
        .entity_mut(post)
        .and_then(|e| e.component_mut(TRANSFORM))
        .unwrap()
        .set_field("height", 12i64);
    loaded.prepare_save(&provider).unwrap();
    let address = loaded.find_slice(post).unwrap();
    assert_eq!(loaded.instance(address).unwrap().patch().len(), 1);
}

#[test]
fn upstream_edits_reach_reloaded_level() {
    let provider = MemoryAssetProvider::new();
    let asset = provider.insert(lamp_id(), lamppost());
    let (level, post) = edited_level(&provider);
    let document = level.to_document();

    asset
        .with_component(|c| {
            if let Some(transform) = c.entity_mut(POST).and_then(|e| e.component_mut(TRANSFORM)) {
                transform.set_field("height", 4i64);
                transform.set_field("color", "grey");
            }
            Ok(())
        })
        .unwrap();

    let mut loaded = SliceComponent::from_document(document, SliceConfig::deterministic(9));
    loaded.instantiate(&provider).unwrap();
    assert_eq!(value(&loaded, post, "height"), Some(Value::Int(4)));
    assert_eq!(value(&loaded, post, "color"), Some(Value::from("amber")));
}

#[test]
fn saving_without_asset_id_fails() {
    let provider = MemoryAssetProvider::new();
    let mut level = SliceComponent::new();
    let err = level.save(&provider).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Internal(_)));
}

#[test]
fn save_stores_through_provider() {
    let provider = MemoryAssetProvider::new();
    provider.insert(lamp_id(), lamppost());
    let level_id = SliceAssetId::from_u128(0x3C);
    let (level, _) = edited_level(&provider);
    let handle = provider.insert(level_id, level);

    handle.with_component(|c| c.save(&provider)).unwrap();
    let stored = provider
        .load_slice(level_id)
        .and_then(|h| h.snapshot().ok())
        .unwrap();
    assert_eq!(stored.asset_id(), Some(level_id));
    assert_eq!(stored.slices()[0].instances().next().map(|i| i.patch().len()), Some(1));
}
