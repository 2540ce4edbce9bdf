//! Integration tests for entity id remapping
//!
//! Tests id maps, generators, and remapping of encoded entity graphs.

use std::sync::Arc;

use slicework_foundation::{EntityId, ErrorKind, Value};
use slicework_patch::{
    CustomIdMapper, EntityIdMap, EntityIdRemapper, IdGenerator, RandomIdGenerator,
    SequentialIdGenerator,
};
use slicework_tree::{Component, Entity, FieldTree, InstantiatedContainer};

const LINK: u64 = 2;

fn e(n: u64) -> EntityId {
    EntityId::new(n)
}

/// Entity 1 links to 2, entity 2 links to external entity 99.
fn graph() -> FieldTree {
    InstantiatedContainer::new(
        vec![
            Entity::new(e(1), "A").with_component(Component::new(LINK, "Link").with_field("target", e(2))),
            Entity::new(e(2), "B").with_component(Component::new(LINK, "Link").with_field("target", e(99))),
        ],
        Vec::new(),
    )
    .to_tree()
}

fn target_of(tree: &FieldTree, id: EntityId) -> Option<EntityId> {
    tree.get_value(&InstantiatedContainer::field_address(id, LINK, "target"))
        .and_then(Value::as_entity)
}

// =============================================================================
// EntityIdMap
// =============================================================================

#[test]
fn map_lookup_both_ways() {
    let map: EntityIdMap = [(e(1), e(10)), (e(2), e(20))].into_iter().collect();
    assert_eq!(map.get(e(1)), Some(e(10)));
    assert_eq!(map.base_of(e(20)), Some(e(2)));
    assert_eq!(map.map_or_keep(e(99)), e(99));
    assert_eq!(map.reverse().get(e(10)), Some(e(1)));
}

#[test]
fn compose_chains_maps() {
    let first: EntityIdMap = [(e(1), e(10))].into_iter().collect();
    let second: EntityIdMap = [(e(10), e(100))].into_iter().collect();
    assert_eq!(first.compose(&second).get(e(1)), Some(e(100)));
}

#[test]
fn bijection_check_names_collision() {
    let map: EntityIdMap = [(e(1), e(7)), (e(2), e(7))].into_iter().collect();
    let err = map.validate_bijection().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::IdCollision { id, .. } if id == e(7)));
}

// =============================================================================
// Generators
// =============================================================================

#[test]
fn seeded_random_ids_repeat() {
    let mut a = RandomIdGenerator::seeded(7);
    let mut b = RandomIdGenerator::seeded(7);
    for _ in 0..16 {
        let id = a.next_id();
        assert_eq!(id, b.next_id());
        assert!(!id.is_null());
    }
}

#[test]
fn sequential_ids_count_up() {
    let mut ids = SequentialIdGenerator::starting_at(5);
    assert_eq!(ids.next_id(), e(5));
    assert_eq!(ids.next_id(), e(6));
}

// =============================================================================
// Remapping
// =============================================================================

#[test]
fn clone_rewrites_internal_references_only() {
    let mut ids = SequentialIdGenerator::starting_at(100);
    let (cloned, map) = EntityIdRemapper::clone_and_generate_new_ids(&graph(), &mut ids, None).unwrap();

    let a = map.get(e(1)).unwrap();
    let b = map.get(e(2)).unwrap();
    assert_eq!(target_of(&cloned, a), Some(b));
    assert_eq!(target_of(&cloned, b), Some(e(99)));

    let decoded = InstantiatedContainer::from_tree(&cloned).unwrap();
    assert_eq!(decoded.entity(a).map(Entity::name), Some("A"));
}

#[test]
fn custom_mapper_is_deterministic() {
    let mapper: CustomIdMapper =
        Arc::new(|base: EntityId, _: &mut dyn IdGenerator| EntityId::new(base.raw() * 1000));
    let first = EntityIdRemapper::generate_new_ids(&graph(), &mut SequentialIdGenerator::default(), Some(&mapper));
    let second = EntityIdRemapper::generate_new_ids(&graph(), &mut RandomIdGenerator::seeded(3), Some(&mapper));
    assert_eq!(first, second);
    assert_eq!(first.get(e(2)), Some(e(2000)));
}

#[test]
fn collision_leaves_tree_untouched() {
    let map: EntityIdMap = [(e(1), e(5)), (e(2), e(5))].into_iter().collect();
    assert!(EntityIdRemapper::remap(&graph(), &map).is_err());

    let mut partial: EntityIdMap = [(e(1), e(5))].into_iter().collect();
    let before = partial.clone();
    assert!(EntityIdRemapper::replace_ids(&graph(), &mut partial, |_| e(5)).is_err());
    assert_eq!(partial, before);
}
