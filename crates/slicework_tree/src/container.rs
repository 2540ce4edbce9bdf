//! A whole entity graph encoded as one field tree.
//!
//! Patches are addressed relative to this container, so a single patch spans
//! any number of entities:
//!
//! ```text
//! InstantiatedContainer {
//!     entities: List<Entity> { @<id>: Entity, ... },
//!     metadata: List<Entity> { @<id>: Entity, ... },
//! }
//! ```

use slicework_foundation::{ElementKey, EntityId, Error, FieldAddress, PathSegment, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::node::{FieldNode, ListKeyKind};
use crate::tree::FieldTree;

/// Record type tag for encoded containers.
pub const CONTAINER_TYPE: &str = "InstantiatedContainer";
/// Field holding the entity list.
pub const ENTITIES_FIELD: &str = "entities";
/// Field holding the metadata entity list.
pub const METADATA_FIELD: &str = "metadata";

/// A set of entities plus their metadata entities.
///
/// Decoding from a tree yields entities in id order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InstantiatedContainer {
    /// Game entities.
    pub entities: Vec<Entity>,
    /// Bookkeeping entities (not game data).
    pub metadata_entities: Vec<Entity>,
}

impl InstantiatedContainer {
    /// Creates a container.
    #[must_use]
    pub fn new(entities: Vec<Entity>, metadata_entities: Vec<Entity>) -> Self {
        Self {
            entities,
            metadata_entities,
        }
    }

    /// Address of an entity record inside an encoded container.
    #[must_use]
    pub fn entity_address(id: EntityId) -> FieldAddress {
        FieldAddress::root().with_field(ENTITIES_FIELD).with_entity(id)
    }

    /// Address of a component field of an entity inside an encoded container.
    #[must_use]
    pub fn field_address(id: EntityId, component: u64, field: &str) -> FieldAddress {
        Self::entity_address(id).join(&Entity::field_address(component, field))
    }

    /// Looks up an entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    /// Looks up an entity mutably.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id() == id)
    }

    /// Removes an entity, returning it.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let pos = self.entities.iter().position(|e| e.id() == id)?;
        Some(self.entities.remove(pos))
    }

    /// Ids of all game entities.
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().map(Entity::id)
    }

    /// Ids of all entities, metadata included.
    pub fn all_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities
            .iter()
            .chain(self.metadata_entities.iter())
            .map(Entity::id)
    }

    /// Returns true if there are no game entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Encodes the container as a field tree.
    #[must_use]
    pub fn to_tree(&self) -> FieldTree {
        let encode = |entities: &[Entity]| {
            entities
                .iter()
                .fold(FieldNode::list(ListKeyKind::Entity), |list, e| {
                    list.with_element(ElementKey::Entity(e.id()), e.to_node())
                })
        };
        FieldTree::new(
            FieldNode::record(CONTAINER_TYPE)
                .with_field(ENTITIES_FIELD, encode(&self.entities))
                .with_field(METADATA_FIELD, encode(&self.metadata_entities)),
        )
    }

    /// Decodes a container tree.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedTree`](slicework_foundation::ErrorKind::MalformedTree)
    /// if the tree does not have the container shape, or if an entity's key
    /// disagrees with its id field.
    pub fn from_tree(tree: &FieldTree) -> Result<Self> {
        let root = tree.root();
        if root.type_name() != Some(CONTAINER_TYPE) {
            return Err(Error::malformed_tree("expected an InstantiatedContainer record"));
        }
        let decode = |field: &str| -> Result<Vec<Entity>> {
            let Some(list) = root.child(&PathSegment::Field(field.into())) else {
                return Ok(Vec::new());
            };
            let FieldNode::List {
                key_kind: ListKeyKind::Entity,
                elements,
            } = list
            else {
                return Err(Error::malformed_tree(format!(
                    "container field '{field}' is not an entity list"
                )));
            };
            elements
                .iter()
                .map(|(key, node)| {
                    let entity = Entity::from_node(node)?;
                    if *key != ElementKey::Entity(entity.id()) {
                        return Err(Error::malformed_tree(format!(
                            "entity keyed {key} carries id {}",
                            entity.id()
                        )));
                    }
                    Ok(entity)
                })
                .collect()
        };
        Ok(Self {
            entities: decode(ENTITIES_FIELD)?,
            metadata_entities: decode(METADATA_FIELD)?,
        })
    }
}
