//! Field tree nodes.
//!
//! A node is a leaf [`Value`], a record of named fields, or a list of keyed
//! elements. Children live in persistent ordered maps so cloning a whole
//! entity graph before patching it is O(1) and iteration order is stable.

use std::sync::Arc;

use im::OrdMap;
use slicework_foundation::{ElementKey, EntityId, Error, PathSegment, Result, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the elements of a list are keyed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ListKeyKind {
    /// Positional indices.
    Index,
    /// Persistent ids that survive reordering.
    Id,
    /// Entity identities.
    Entity,
}

impl ListKeyKind {
    /// Returns true if `key` is of this kind.
    #[must_use]
    pub const fn accepts(self, key: ElementKey) -> bool {
        matches!(
            (self, key),
            (Self::Index, ElementKey::Index(_))
                | (Self::Id, ElementKey::Id(_))
                | (Self::Entity, ElementKey::Entity(_))
        )
    }
}

/// Whether an entity id occurrence defines an entity or refers to one.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EntityIdRole {
    /// The key of an element in an entity-keyed list.
    Definition,
    /// An `EntityRef` leaf value.
    Reference,
}

/// One node of a field tree.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FieldNode {
    /// Scalar leaf.
    Value(Value),
    /// Record with named fields.
    Record {
        /// Type tag of the record. Records of different types never diff
        /// field by field.
        type_name: Arc<str>,
        /// Named children.
        fields: OrdMap<Arc<str>, FieldNode>,
    },
    /// List of keyed elements.
    List {
        /// Key kind accepted by this list.
        key_kind: ListKeyKind,
        /// Keyed children.
        elements: OrdMap<ElementKey, FieldNode>,
    },
}

impl FieldNode {
    /// Creates an empty record.
    #[must_use]
    pub fn record(type_name: &str) -> Self {
        Self::Record {
            type_name: Arc::from(type_name),
            fields: OrdMap::new(),
        }
    }

    /// Creates an empty list.
    #[must_use]
    pub fn list(key_kind: ListKeyKind) -> Self {
        Self::List {
            key_kind,
            elements: OrdMap::new(),
        }
    }

    /// Creates a leaf.
    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// Builder: sets a record field. Ignored on non-record nodes.
    #[must_use]
    pub fn with_field(mut self, name: &str, node: impl Into<FieldNode>) -> Self {
        if let Self::Record { fields, .. } = &mut self {
            fields.insert(Arc::from(name), node.into());
        }
        self
    }

    /// Builder: sets a list element. Ignored on non-list nodes or keys of
    /// the wrong kind.
    #[must_use]
    pub fn with_element(mut self, key: ElementKey, node: impl Into<FieldNode>) -> Self {
        if let Self::List { key_kind, elements } = &mut self {
            if key_kind.accepts(key) {
                elements.insert(key, node.into());
            }
        }
        self
    }

    /// Returns the leaf value, if this is a leaf.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the record type name, if this is a record.
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Self::Record { type_name, .. } => Some(type_name),
            _ => None,
        }
    }

    /// Returns true if this node has no children (leaves always do).
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Returns true if both nodes can be compared child by child.
    ///
    /// Leaves always share a shape with leaves. Records must share a type
    /// name and lists a key kind.
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(_), Self::Value(_)) => true,
            (Self::Record { type_name: a, .. }, Self::Record { type_name: b, .. }) => a == b,
            (Self::List { key_kind: a, .. }, Self::List { key_kind: b, .. }) => a == b,
            _ => false,
        }
    }

    /// Looks up a direct child.
    #[must_use]
    pub fn child(&self, segment: &PathSegment) -> Option<&FieldNode> {
        match (self, segment) {
            (Self::Record { fields, .. }, PathSegment::Field(name)) => fields.get(name),
            (Self::List { elements, .. }, PathSegment::Element(key)) => elements.get(key),
            _ => None,
        }
    }

    /// Looks up a direct child mutably.
    pub fn child_mut(&mut self, segment: &PathSegment) -> Option<&mut FieldNode> {
        match (self, segment) {
            (Self::Record { fields, .. }, PathSegment::Field(name)) => fields.get_mut(name),
            (Self::List { elements, .. }, PathSegment::Element(key)) => elements.get_mut(key),
            _ => None,
        }
    }

    /// Inserts or replaces a direct child, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if this node cannot hold a child under `segment`
    /// (a leaf, a field segment on a list, or a key of the wrong kind).
    pub fn insert_child(&mut self, segment: PathSegment, node: FieldNode) -> Result<Option<FieldNode>> {
        match (self, segment) {
            (Self::Record { fields, .. }, PathSegment::Field(name)) => Ok(fields.insert(name, node)),
            (Self::List { key_kind, elements }, PathSegment::Element(key)) if key_kind.accepts(key) => {
                Ok(elements.insert(key, node))
            }
            (_, segment) => Err(Error::malformed_tree(format!(
                "node cannot hold a child at '{segment}'"
            ))),
        }
    }

    /// Removes a direct child.
    pub fn remove_child(&mut self, segment: &PathSegment) -> Option<FieldNode> {
        match (self, segment) {
            (Self::Record { fields, .. }, PathSegment::Field(name)) => fields.remove(name),
            (Self::List { elements, .. }, PathSegment::Element(key)) => elements.remove(key),
            _ => None,
        }
    }

    /// Returns the direct children in key order.
    #[must_use]
    pub fn children(&self) -> Vec<(PathSegment, &FieldNode)> {
        match self {
            Self::Value(_) => Vec::new(),
            Self::Record { fields, .. } => fields
                .iter()
                .map(|(name, node)| (PathSegment::Field(name.clone()), node))
                .collect(),
            Self::List { elements, .. } => elements
                .iter()
                .map(|(key, node)| (PathSegment::Element(*key), node))
                .collect(),
        }
    }

    /// Number of direct children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        match self {
            Self::Value(_) => 0,
            Self::Record { fields, .. } => fields.len(),
            Self::List { elements, .. } => elements.len(),
        }
    }

    /// Visits every entity id in this subtree, keys before values.
    pub fn visit_entity_ids(&self, f: &mut dyn FnMut(EntityId, EntityIdRole)) {
        match self {
            Self::Value(Value::EntityRef(id)) => f(*id, EntityIdRole::Reference),
            Self::Value(_) => {}
            Self::Record { fields, .. } => {
                for node in fields.values() {
                    node.visit_entity_ids(f);
                }
            }
            Self::List { elements, .. } => {
                for (key, node) in elements {
                    if let ElementKey::Entity(id) = key {
                        f(*id, EntityIdRole::Definition);
                    }
                    node.visit_entity_ids(f);
                }
            }
        }
    }

    /// Returns a copy with every entity id (keys and references) rewritten.
    #[must_use]
    pub fn map_entity_ids(&self, f: &mut dyn FnMut(EntityId, EntityIdRole) -> EntityId) -> FieldNode {
        match self {
            Self::Value(Value::EntityRef(id)) => {
                Self::Value(Value::EntityRef(f(*id, EntityIdRole::Reference)))
            }
            Self::Value(_) => self.clone(),
            Self::Record { type_name, fields } => Self::Record {
                type_name: type_name.clone(),
                fields: fields
                    .iter()
                    .map(|(name, node)| (name.clone(), node.map_entity_ids(f)))
                    .collect(),
            },
            Self::List { key_kind, elements } => Self::List {
                key_kind: *key_kind,
                elements: elements
                    .iter()
                    .map(|(key, node)| {
                        let key = match key {
                            ElementKey::Entity(id) => {
                                ElementKey::Entity(f(*id, EntityIdRole::Definition))
                            }
                            other => *other,
                        };
                        (key, node.map_entity_ids(f))
                    })
                    .collect(),
            },
        }
    }
}

impl From<Value> for FieldNode {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<i64> for FieldNode {
    fn from(n: i64) -> Self {
        Self::Value(Value::Int(n))
    }
}

impl From<f64> for FieldNode {
    fn from(n: f64) -> Self {
        Self::Value(Value::Float(n))
    }
}

impl From<bool> for FieldNode {
    fn from(b: bool) -> Self {
        Self::Value(Value::Bool(b))
    }
}

impl From<&str> for FieldNode {
    fn from(s: &str) -> Self {
        Self::Value(Value::from(s))
    }
}

impl From<EntityId> for FieldNode {
    fn from(id: EntityId) -> Self {
        Self::Value(Value::EntityRef(id))
    }
}
