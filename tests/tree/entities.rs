//! Integration tests for entities and components
//!
//! Tests component fields and the record encoding of entities.

use slicework_foundation::{EntityId, PathSegment, Value};
use slicework_tree::{Component, Entity, FieldNode, FieldTree};

const TRANSFORM: u64 = 1;
const LIGHT: u64 = 2;

fn lamp() -> Entity {
    Entity::new(EntityId::new(10), "Lamp")
        .with_component(Component::new(TRANSFORM, "Transform").with_field("height", 3i64))
        .with_component(
            Component::new(LIGHT, "Light")
                .with_field("lumens", 800i64)
                .with_field("target", EntityId::new(11)),
        )
}

// =============================================================================
// Components
// =============================================================================

#[test]
fn component_fields() {
    let mut component = Component::new(TRANSFORM, "Transform").with_field("height", 3i64);
    assert_eq!(component.id(), TRANSFORM);
    assert_eq!(component.type_name(), "Transform");
    assert_eq!(component.value("height"), Some(&Value::Int(3)));

    let previous = component.set_field("height", 5i64);
    assert_eq!(previous.as_ref().and_then(FieldNode::as_value), Some(&Value::Int(3)));
    assert!(component.remove_field("height").is_some());
    assert!(component.field("height").is_none());
}

#[test]
fn entity_components_by_id() {
    let mut entity = lamp();
    assert_eq!(entity.component_count(), 2);
    assert_eq!(entity.component(LIGHT).map(Component::type_name), Some("Light"));

    entity
        .component_mut(TRANSFORM)
        .unwrap()
        .set_field("height", 4i64);
    assert_eq!(
        entity.component(TRANSFORM).and_then(|c| c.value("height")),
        Some(&Value::Int(4))
    );

    assert!(entity.remove_component(LIGHT).is_some());
    assert_eq!(entity.component_count(), 1);
}

#[test]
fn rename_entity() {
    let mut entity = lamp();
    entity.set_name("Streetlight");
    assert_eq!(entity.name(), "Streetlight");
}

// =============================================================================
// Encoding
// =============================================================================

#[test]
fn node_round_trip() {
    let entity = lamp();
    let decoded = Entity::from_node(&entity.to_node()).unwrap();
    assert_eq!(decoded, entity);
}

#[test]
fn field_address_resolves_in_encoded_entity() {
    let tree = FieldTree::new(lamp().to_node());
    assert_eq!(
        tree.get_value(&Entity::field_address(TRANSFORM, "height")),
        Some(&Value::Int(3))
    );
    assert_eq!(
        tree.get_value(&Entity::field_address(LIGHT, "target")),
        Some(&Value::EntityRef(EntityId::new(11)))
    );
}

#[test]
fn decode_rejects_other_records() {
    assert!(Entity::from_node(&FieldNode::record("Transform")).is_err());
    assert!(Entity::from_node(&FieldNode::value(1i64)).is_err());
}

#[test]
fn decode_requires_an_id() {
    let mut node = lamp().to_node();
    node.remove_child(&PathSegment::Field("id".into()));
    assert!(Entity::from_node(&node).is_err());
}
