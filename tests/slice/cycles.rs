//! Integration tests for cycle-safe recursive instantiation.

use slicework_foundation::{EntityId, ErrorKind, SliceAssetId};
use slicework_slice::{InstantiationCycleGuard, MemoryAssetProvider, SliceComponent, SliceConfig};
use slicework_tree::Entity;

use crate::fixtures::{lamppost, lamppost_id, root};

fn asset(n: u128) -> SliceAssetId {
    SliceAssetId::from_u128(n)
}

/// A component with one direct entity and a deferred reference to `next`.
fn linked(seed: u64, entity: u64, next: SliceAssetId, provider: &MemoryAssetProvider) -> SliceComponent {
    let mut component = SliceComponent::with_config(SliceConfig::deterministic(seed));
    component
        .add_entity(Entity::new(EntityId::new(entity), format!("E{entity}")))
        .unwrap();
    component.add_slice(next, None, provider).unwrap();
    component
}

// =============================================================================
// Guard
// =============================================================================

#[test]
fn guard_reports_chain_from_first_occurrence() {
    let mut guard = InstantiationCycleGuard::new();
    guard.push(asset(1));
    guard.push(asset(2));
    guard.push(asset(3));

    assert!(guard.contains_cycle(asset(2)));
    assert_eq!(
        guard.cycle_report(asset(2)),
        Some(vec![asset(2), asset(3), asset(2)])
    );
    assert_eq!(guard.cycle_report(asset(4)), None);
    assert_eq!(guard.depth(), 3);

    guard.pop(asset(3));
    guard.pop(asset(2));
    guard.pop(asset(1));
    assert!(guard.is_empty());
}

// =============================================================================
// Instantiation
// =============================================================================

#[test]
fn two_asset_cycle_fails_without_partial_entities() {
    let provider = MemoryAssetProvider::new();
    let (a, b) = (asset(0xA), asset(0xB));
    provider.insert(a, linked(1, 1, b, &provider));
    provider.insert(b, linked(2, 2, a, &provider));

    let mut level = root(3);
    let address = level.add_slice(a, None, &provider).unwrap();
    let err = level.instantiate(&provider).unwrap_err();

    assert_eq!(err.kind, ErrorKind::CyclicDependency(vec![a, b, a]));
    assert!(level.entity_ids().is_empty());
    assert!(!level.instance(address).unwrap().is_instantiated());
    assert!(!level.is_instantiated());
}

#[test]
fn cycle_rolls_back_references_built_earlier() {
    let provider = MemoryAssetProvider::new();
    let (a, b) = (asset(0xA), asset(0xB));
    provider.insert(lamppost_id(), lamppost(3));
    provider.insert(a, linked(1, 1, b, &provider));
    provider.insert(b, linked(2, 2, a, &provider));

    let mut level = root(3);
    let lamp = level.add_slice(lamppost_id(), None, &provider).unwrap();
    level.add_slice(a, None, &provider).unwrap();
    let err = level.instantiate(&provider).unwrap_err();

    assert_eq!(err.kind, ErrorKind::CyclicDependency(vec![a, b, a]));
    assert!(level.entity_ids().is_empty());
    assert!(!level.instance(lamp).unwrap().is_instantiated());
    assert!(!level.slice(lamppost_id()).unwrap().is_instantiated());

    provider.remove(a);
    let report = level.instantiate(&provider).unwrap();
    assert_eq!(report.instantiated_references, 1);
    assert_eq!(level.entity_ids().len(), 2);
}

#[test]
fn cycle_is_reported_in_lenient_mode_too() {
    let provider = MemoryAssetProvider::new();
    let (a, b) = (asset(0xA), asset(0xB));
    provider.insert(a, linked(1, 1, b, &provider));
    provider.insert(b, linked(2, 2, a, &provider));

    let mut level = SliceComponent::with_config(
        SliceConfig::deterministic(3).with_allow_partial_instantiation(true),
    );
    level.add_slice(a, None, &provider).unwrap();
    let err = level.instantiate(&provider).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::CyclicDependency(_)));
    assert!(!err.is_recoverable());
}

#[test]
fn asset_referencing_itself_through_root_is_a_cycle() {
    let provider = MemoryAssetProvider::new();
    let street = asset(0x5);
    provider.insert(street, linked(1, 1, street, &provider));

    let mut level = root(2);
    level.add_slice(street, None, &provider).unwrap();
    let err = level.instantiate(&provider).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CyclicDependency(vec![street, street]));
}

#[test]
fn shared_asset_is_not_a_cycle() {
    let provider = MemoryAssetProvider::new();
    provider.insert(lamppost_id(), lamppost(3));
    let street = asset(0x5);
    let mut street_component = root(4);
    street_component.add_slice(lamppost_id(), None, &provider).unwrap();
    street_component.add_slice(lamppost_id(), None, &provider).unwrap();
    provider.insert(street, street_component);

    let mut level = root(5);
    level.add_slice(street, None, &provider).unwrap();
    level.add_slice(lamppost_id(), None, &provider).unwrap();
    let report = level.instantiate(&provider).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.instantiated_references, 2);
    // Two lampposts through the street, one directly; two entities each.
    assert_eq!(level.entity_ids().len(), 6);
}
