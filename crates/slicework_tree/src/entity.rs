//! Entities, components, and their field tree encoding.
//!
//! An entity encodes as a record:
//!
//! ```text
//! Entity { id: EntityRef, name: String, components: List<Id> { #<component id>: <component record> } }
//! ```
//!
//! Components are keyed by persistent id, so adding or removing a component
//! is a structural edit rather than an index shift.

use std::collections::BTreeMap;
use std::sync::Arc;

use im::OrdMap;
use slicework_foundation::{ElementKey, EntityId, Error, FieldAddress, PathSegment, Result, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::node::{FieldNode, ListKeyKind};

/// Record type tag for encoded entities.
pub const ENTITY_TYPE: &str = "Entity";
/// Field holding the entity id.
pub const ID_FIELD: &str = "id";
/// Field holding the entity name.
pub const NAME_FIELD: &str = "name";
/// Field holding the component list.
pub const COMPONENTS_FIELD: &str = "components";

/// An opaque component payload with a persistent id.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Component {
    id: u64,
    type_name: Arc<str>,
    fields: OrdMap<Arc<str>, FieldNode>,
}

impl Component {
    /// Creates an empty component.
    #[must_use]
    pub fn new(id: u64, type_name: &str) -> Self {
        Self {
            id,
            type_name: Arc::from(type_name),
            fields: OrdMap::new(),
        }
    }

    /// Builder: sets a field.
    #[must_use]
    pub fn with_field(mut self, name: &str, node: impl Into<FieldNode>) -> Self {
        self.fields.insert(Arc::from(name), node.into());
        self
    }

    /// Persistent component id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Component type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns a field node.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldNode> {
        self.fields.get(name)
    }

    /// Returns a leaf field value.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.field(name).and_then(FieldNode::as_value)
    }

    /// Sets a field, returning the previous node.
    pub fn set_field(&mut self, name: &str, node: impl Into<FieldNode>) -> Option<FieldNode> {
        self.fields.insert(Arc::from(name), node.into())
    }

    /// Removes a field.
    pub fn remove_field(&mut self, name: &str) -> Option<FieldNode> {
        self.fields.remove(name)
    }

    /// Encodes the component as a record node.
    #[must_use]
    pub fn to_node(&self) -> FieldNode {
        FieldNode::Record {
            type_name: self.type_name.clone(),
            fields: self.fields.clone(),
        }
    }

    /// Decodes a component record.
    ///
    /// # Errors
    ///
    /// Returns an error if `node` is not a record.
    pub fn from_node(id: u64, node: &FieldNode) -> Result<Self> {
        match node {
            FieldNode::Record { type_name, fields } => Ok(Self {
                id,
                type_name: type_name.clone(),
                fields: fields.clone(),
            }),
            _ => Err(Error::malformed_tree(format!(
                "component #{id} is not a record"
            ))),
        }
    }
}

/// A unit of the entity graph: an identity plus ordered components.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entity {
    id: EntityId,
    name: String,
    components: BTreeMap<u64, Component>,
}

impl Entity {
    /// Creates an entity without components.
    #[must_use]
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            components: BTreeMap::new(),
        }
    }

    /// Builder: adds a component.
    #[must_use]
    pub fn with_component(mut self, component: Component) -> Self {
        self.add_component(component);
        self
    }

    /// The entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The entity name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the entity.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Components ordered by persistent id.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    /// Number of components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Looks up a component by persistent id.
    #[must_use]
    pub fn component(&self, id: u64) -> Option<&Component> {
        self.components.get(&id)
    }

    /// Looks up a component mutably.
    pub fn component_mut(&mut self, id: u64) -> Option<&mut Component> {
        self.components.get_mut(&id)
    }

    /// Adds or replaces a component, returning the previous one.
    pub fn add_component(&mut self, component: Component) -> Option<Component> {
        self.components.insert(component.id, component)
    }

    /// Removes a component.
    pub fn remove_component(&mut self, id: u64) -> Option<Component> {
        self.components.remove(&id)
    }

    /// Address of a component field relative to the entity record.
    #[must_use]
    pub fn field_address(component: u64, field: &str) -> FieldAddress {
        FieldAddress::root()
            .with_field(COMPONENTS_FIELD)
            .with_id(component)
            .with_field(field)
    }

    /// Encodes the entity as a record node.
    #[must_use]
    pub fn to_node(&self) -> FieldNode {
        let components = self
            .components
            .values()
            .fold(FieldNode::list(ListKeyKind::Id), |list, c| {
                list.with_element(ElementKey::Id(c.id), c.to_node())
            });
        FieldNode::record(ENTITY_TYPE)
            .with_field(ID_FIELD, self.id)
            .with_field(NAME_FIELD, self.name.as_str())
            .with_field(COMPONENTS_FIELD, components)
    }

    /// Decodes an entity record.
    ///
    /// # Errors
    ///
    /// Returns an error if `node` does not have the entity shape.
    pub fn from_node(node: &FieldNode) -> Result<Self> {
        if node.type_name() != Some(ENTITY_TYPE) {
            return Err(Error::malformed_tree("expected an Entity record"));
        }
        let field = |name: &str| node.child(&PathSegment::Field(Arc::from(name)));

        let id = field(ID_FIELD)
            .and_then(FieldNode::as_value)
            .and_then(Value::as_entity)
            .ok_or_else(|| Error::malformed_tree("entity record has no id"))?;
        let name = field(NAME_FIELD)
            .and_then(FieldNode::as_value)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut components = BTreeMap::new();
        if let Some(list) = field(COMPONENTS_FIELD) {
            let FieldNode::List {
                key_kind: ListKeyKind::Id,
                elements,
            } = list
            else {
                return Err(Error::malformed_tree(format!(
                    "components of {id} are not an id-keyed list"
                )));
            };
            for (key, child) in elements {
                if let ElementKey::Id(cid) = key {
                    components.insert(*cid, Component::from_node(*cid, child)?);
                }
            }
        }

        Ok(Self {
            id,
            name,
            components,
        })
    }
}
