//! Nested slice integration tests
//!
//! Tests overrides layered through an asset that instances another asset.

use slicework::foundation::{EntityId, SliceAssetId, Value};
use slicework::slice::{AssetProvider, MemoryAssetProvider, SliceComponent, SliceConfig};
use slicework::tree::{Component, Entity};

const TRANSFORM: u64 = 1;
const POST: EntityId = EntityId::new(10);

fn lamp_id() -> SliceAssetId {
    SliceAssetId::from_u128(0x1A)
}

fn street_id() -> SliceAssetId {
    SliceAssetId::from_u128(0x2B)
}

fn set(component: &mut SliceComponent, id: EntityId, field: &str, value: Value) {
    component
        .entity_mut(id)
        .and_then(|e| e.component_mut(TRANSFORM))
        .unwrap()
        .set_field(field, value);
}

fn get(component: &SliceComponent, id: EntityId, field: &str) -> Option<Value> {
    component
        .find_entity(id)?
        .component(TRANSFORM)?
        .value(field)
        .cloned()
}

/// Lamp asset, and a street asset holding two lamps with the first painted
/// red.
fn assets() -> MemoryAssetProvider {
    let provider = MemoryAssetProvider::new();
    let mut lamp = SliceComponent::with_config(SliceConfig::deterministic(1));
    lamp.add_entity(Entity::new(POST, "Post").with_component(
        Component::new(TRANSFORM, "Transform")
            .with_field("height", 3i64)
            .with_field("color", "white"),
    ))
    .unwrap();
    provider.insert(lamp_id(), lamp);

    let mut street = SliceComponent::with_config(SliceConfig::deterministic(2));
    let red = street.add_slice(lamp_id(), None, &provider).unwrap();
    street.add_slice(lamp_id(), None, &provider).unwrap();
    street.instantiate(&provider).unwrap();
    let post = street
        .instance(red)
        .and_then(|i| i.entity_id_map().get(POST))
        .unwrap();
    set(&mut street, post, "color", Value::from("red"));
    street.prepare_save(&provider).unwrap();
    provider.insert(street_id(), street);
    provider
}

/// The level's lamp with the given color.
fn lamp_with_color(level: &SliceComponent, color: &str) -> EntityId {
    level
        .entity_ids()
        .into_iter()
        .find(|id| get(level, *id, "color") == Some(Value::from(color)))
        .unwrap()
}

#[test]
fn overrides_layer_across_levels() {
    let provider = assets();
    let mut level = SliceComponent::with_config(SliceConfig::deterministic(3));
    level.add_slice(street_id(), None, &provider).unwrap();
    level.instantiate(&provider).unwrap();

    let red = lamp_with_color(&level, "red");
    let white = lamp_with_color(&level, "white");
    set(&mut level, red, "height", Value::Int(7));
    level.prepare_save(&provider).unwrap();

    level.uninstantiate();
    level.instantiate(&provider).unwrap();
    assert_eq!(get(&level, red, "height"), Some(Value::Int(7)));
    assert_eq!(get(&level, red, "color"), Some(Value::from("red")));
    assert_eq!(get(&level, white, "height"), Some(Value::Int(3)));
}

#[test]
fn lamp_change_reaches_level_through_street() {
    let provider = assets();
    let mut level = SliceComponent::with_config(SliceConfig::deterministic(3));
    level.add_slice(street_id(), None, &provider).unwrap();
    level.instantiate(&provider).unwrap();
    let red = lamp_with_color(&level, "red");
    let white = lamp_with_color(&level, "white");
    set(&mut level, red, "height", Value::Int(7));
    level.prepare_save(&provider).unwrap();

    provider
        .load_slice(lamp_id())
        .unwrap()
        .with_component(|c| {
            if let Some(transform) = c.entity_mut(POST).and_then(|e| e.component_mut(TRANSFORM)) {
                transform.set_field("height", 4i64);
            }
            Ok(())
        })
        .unwrap();
    // The street keeps its live lamps until it is rebuilt.
    provider
        .load_slice(street_id())
        .unwrap()
        .with_component(|c| {
            c.uninstantiate();
            Ok(())
        })
        .unwrap();

    let mut reloaded = SliceComponent::from_document(level.to_document(), SliceConfig::deterministic(4));
    reloaded.instantiate(&provider).unwrap();
    assert_eq!(get(&reloaded, red, "height"), Some(Value::Int(7)));
    assert_eq!(get(&reloaded, red, "color"), Some(Value::from("red")));
    assert_eq!(get(&reloaded, white, "height"), Some(Value::Int(4)));
}

#[test]
fn street_override_change_reaches_level() {
    let provider = assets();
    let mut level = SliceComponent::with_config(SliceConfig::deterministic(3));
    level.add_slice(street_id(), None, &provider).unwrap();
    level.instantiate(&provider).unwrap();
    let red = lamp_with_color(&level, "red");

    let street = provider.load_slice(street_id()).unwrap();
    street
        .with_component(|c| {
            let post = c
                .entity_ids()
                .into_iter()
                .find(|id| get(c, *id, "color") == Some(Value::from("red")))
                .unwrap();
            set(c, post, "color", Value::from("blue"));
            c.prepare_save(&provider)
        })
        .unwrap();

    level.uninstantiate();
    level.instantiate(&provider).unwrap();
    assert_eq!(get(&level, red, "color"), Some(Value::from("blue")));
}
