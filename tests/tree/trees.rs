//! Integration tests for field trees
//!
//! Tests addressing, editing, walking, and entity id discovery.

use slicework_foundation::{ElementKey, EntityId, FieldAddress, Value};
use slicework_tree::{EntityIdRole, FieldNode, FieldTree, ListKeyKind};

fn addr(field: &str) -> FieldAddress {
    FieldAddress::root().with_field(field)
}

/// A record with a scalar, a positional list, and an entity list whose
/// second entity refers to the first.
fn sample() -> FieldTree {
    FieldTree::new(
        FieldNode::record("Root")
            .with_field("speed", 3i64)
            .with_field(
                "tags",
                FieldNode::list(ListKeyKind::Index)
                    .with_element(ElementKey::Index(0), "lamp")
                    .with_element(ElementKey::Index(1), "street"),
            )
            .with_field(
                "entities",
                FieldNode::list(ListKeyKind::Entity)
                    .with_element(
                        ElementKey::Entity(EntityId::new(1)),
                        FieldNode::record("E"),
                    )
                    .with_element(
                        ElementKey::Entity(EntityId::new(2)),
                        FieldNode::record("E").with_field("parent", EntityId::new(1)),
                    ),
            ),
    )
}

// =============================================================================
// Lookup
// =============================================================================

#[test]
fn get_follows_segments() {
    let tree = sample();
    assert_eq!(tree.get_value(&addr("speed")), Some(&Value::Int(3)));
    assert_eq!(
        tree.get_value(&addr("tags").with_index(1)).and_then(Value::as_str),
        Some("street")
    );
    assert!(tree.contains(&addr("entities").with_entity(EntityId::new(2))));
    assert!(!tree.contains(&addr("missing")));
    assert!(tree.get(&addr("speed").with_field("deeper")).is_none());
}

#[test]
fn root_address_is_whole_tree() {
    let tree = sample();
    assert_eq!(tree.get(&FieldAddress::root()), Some(tree.root()));
}

// =============================================================================
// Editing
// =============================================================================

#[test]
fn set_replaces_and_creates_leaves() {
    let mut tree = sample();
    tree.set(&addr("speed"), Value::Int(5)).unwrap();
    tree.set(&addr("color"), Value::from("red")).unwrap();
    assert_eq!(tree.get_value(&addr("speed")), Some(&Value::Int(5)));
    assert_eq!(tree.get_value(&addr("color")).and_then(Value::as_str), Some("red"));
}

#[test]
fn set_requires_a_parent() {
    let mut tree = sample();
    assert!(tree.set(&addr("missing").with_field("x"), Value::Int(1)).is_err());
}

#[test]
fn list_rejects_keys_of_the_wrong_kind() {
    let mut tree = sample();
    let err = tree.set_node(&addr("tags").with_id(4), FieldNode::value("x"));
    assert!(err.is_err());
    assert!(!tree.contains(&addr("tags").with_id(4)));
}

#[test]
fn add_node_refuses_existing() {
    let mut tree = sample();
    assert!(tree.add_node(&addr("speed"), FieldNode::value(1i64)).is_err());
    tree.add_node(&addr("mass"), FieldNode::value(2i64)).unwrap();
    assert_eq!(tree.get_value(&addr("mass")), Some(&Value::Int(2)));
}

#[test]
fn remove_node_returns_subtree() {
    let mut tree = sample();
    let removed = tree.remove_node(&addr("tags")).unwrap();
    assert_eq!(removed.child_count(), 2);
    assert!(!tree.contains(&addr("tags")));
    assert!(tree.remove_node(&addr("tags")).is_err());
    assert!(tree.remove_node(&FieldAddress::root()).is_err());
}

// =============================================================================
// Walking and Entity Ids
// =============================================================================

#[test]
fn walk_visits_parents_first() {
    let tree = sample();
    let mut seen = Vec::new();
    tree.walk(|address, _| seen.push(address.clone()));

    assert_eq!(seen[0], FieldAddress::root());
    assert_eq!(seen.len(), tree.node_count());
    let tags = seen.iter().position(|a| *a == addr("tags")).unwrap();
    let first_tag = seen.iter().position(|a| *a == addr("tags").with_index(0)).unwrap();
    assert!(tags < first_tag);
}

#[test]
fn defined_ids_ignore_references() {
    let mut tree = sample();
    tree.set(&addr("target"), Value::EntityRef(EntityId::new(99)))
        .unwrap();
    let ids: Vec<_> = tree.defined_entity_ids().into_iter().collect();
    assert_eq!(ids, vec![EntityId::new(1), EntityId::new(2)]);
}

#[test]
fn map_entity_ids_sees_both_roles() {
    let tree = sample();
    let mut definitions = 0;
    let mut references = 0;
    let mapped = tree.map_entity_ids(|id, role| {
        match role {
            EntityIdRole::Definition => definitions += 1,
            EntityIdRole::Reference => references += 1,
        }
        EntityId::new(id.raw() + 10)
    });

    assert_eq!((definitions, references), (2, 1));
    let parent = addr("entities")
        .with_entity(EntityId::new(12))
        .with_field("parent");
    assert_eq!(
        mapped.get_value(&parent),
        Some(&Value::EntityRef(EntityId::new(11)))
    );
}
