//! Shared assets for the slice tests.

use slicework_foundation::{EntityId, SliceAssetId, Value};
use slicework_slice::{SliceComponent, SliceConfig, SliceInstanceAddress};
use slicework_tree::{Component, Entity};

pub const TRANSFORM: u64 = 1;
pub const POST: EntityId = EntityId::new(10);
pub const BULB: EntityId = EntityId::new(11);

pub fn lamppost_id() -> SliceAssetId {
    SliceAssetId::from_u128(0x1A)
}

/// A post with a height and a bulb whose `Mount` points at the post.
pub fn lamppost(height: i64) -> SliceComponent {
    let mut component = SliceComponent::with_config(SliceConfig::deterministic(1));
    component
        .add_entity(Entity::new(POST, "Post").with_component(
            Component::new(TRANSFORM, "Transform").with_field("height", height),
        ))
        .unwrap();
    component
        .add_entity(
            Entity::new(BULB, "Bulb").with_component(Component::new(2, "Mount").with_field("post", POST)),
        )
        .unwrap();
    component
}

pub fn root(seed: u64) -> SliceComponent {
    SliceComponent::with_config(SliceConfig::deterministic(seed))
}

/// Live id of `base` in the instance at `address`.
pub fn live(component: &SliceComponent, address: SliceInstanceAddress, base: EntityId) -> EntityId {
    component
        .instance(address)
        .and_then(|i| i.entity_id_map().get(base))
        .unwrap()
}

pub fn height(component: &SliceComponent, id: EntityId) -> Option<i64> {
    component
        .find_entity(id)?
        .component(TRANSFORM)?
        .value("height")
        .and_then(Value::as_int)
}

pub fn set_height(component: &mut SliceComponent, id: EntityId, height: i64) {
    component
        .entity_mut(id)
        .and_then(|e| e.component_mut(TRANSFORM))
        .unwrap()
        .set_field("height", height);
}
