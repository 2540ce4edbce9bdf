//! Integration tests for field addresses
//!
//! Tests address construction, prefixes, display, and entity remapping.

use slicework_foundation::{ElementKey, EntityId, FieldAddress, PathSegment};

fn component_field(entity: u64) -> FieldAddress {
    FieldAddress::root()
        .with_field("entities")
        .with_entity(EntityId::new(entity))
        .with_field("components")
        .with_id(1)
        .with_field("height")
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn root_is_empty() {
    let root = FieldAddress::root();
    assert!(root.is_root());
    assert!(root.is_empty());
    assert_eq!(root.len(), 0);
    assert_eq!(root.last(), None);
}

#[test]
fn builders_append_segments() {
    let addr = component_field(3);
    assert_eq!(addr.len(), 5);
    assert_eq!(
        addr.segments()[1],
        PathSegment::Element(ElementKey::Entity(EntityId::new(3)))
    );
    assert_eq!(addr.last().and_then(PathSegment::as_field), Some("height"));
}

#[test]
fn push_and_pop() {
    let mut addr = FieldAddress::root().with_field("a");
    addr.push(PathSegment::Element(ElementKey::Index(2)));
    assert_eq!(addr.len(), 2);
    assert_eq!(
        addr.pop().and_then(|s| s.as_element()),
        Some(ElementKey::Index(2))
    );
    assert_eq!(addr, FieldAddress::root().with_field("a"));
}

// =============================================================================
// Prefixes
// =============================================================================

#[test]
fn starts_with_and_strip_prefix() {
    let addr = component_field(3);
    let prefix = FieldAddress::root()
        .with_field("entities")
        .with_entity(EntityId::new(3));

    assert!(addr.starts_with(&prefix));
    assert!(addr.starts_with(&FieldAddress::root()));
    let rest = addr.strip_prefix(&prefix).unwrap();
    assert_eq!(rest.len(), 3);
    assert_eq!(prefix.join(&rest), addr);

    assert!(!addr.starts_with(&component_field(4)));
    assert!(addr.strip_prefix(&component_field(4)).is_none());
}

#[test]
fn ancestors_end_at_root() {
    let addr = FieldAddress::root().with_field("a").with_index(0);
    let ancestors: Vec<_> = addr.ancestors().collect();
    assert_eq!(ancestors.len(), 3);
    assert_eq!(ancestors[0], addr);
    assert_eq!(ancestors[2], FieldAddress::root());
}

#[test]
fn parents_sort_before_children() {
    let parent = FieldAddress::root().with_field("a");
    let child = parent.with_field("b");
    assert!(parent < child);
}

// =============================================================================
// Display and Remapping
// =============================================================================

#[test]
fn display_uses_segment_markers() {
    assert_eq!(component_field(3).to_string(), "entities/@3/components/#1/height");
}

#[test]
fn remap_entities_rewrites_only_entity_keys() {
    let addr = component_field(3);
    let remapped = addr.remap_entities(|id| EntityId::new(id.raw() + 100));
    assert_eq!(remapped, component_field(103));
    assert_eq!(remapped.segments()[3], addr.segments()[3]);
}
