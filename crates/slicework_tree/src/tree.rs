//! Address-based access to a field tree.

use std::collections::BTreeSet;

use slicework_foundation::{EntityId, Error, FieldAddress, Result, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::node::{EntityIdRole, FieldNode};

/// A snapshot of one serialized entity graph.
///
/// Cloning is cheap: children are held in persistent maps and shared until
/// one side is modified.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldTree {
    root: FieldNode,
}

impl FieldTree {
    /// Wraps a root node.
    #[must_use]
    pub fn new(root: FieldNode) -> Self {
        Self { root }
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> &FieldNode {
        &self.root
    }

    /// Consumes the tree, returning its root node.
    #[must_use]
    pub fn into_root(self) -> FieldNode {
        self.root
    }

    /// Returns the node at `address`.
    #[must_use]
    pub fn get(&self, address: &FieldAddress) -> Option<&FieldNode> {
        let mut node = &self.root;
        for segment in address.segments() {
            node = node.child(segment)?;
        }
        Some(node)
    }

    /// Returns the leaf value at `address`.
    #[must_use]
    pub fn get_value(&self, address: &FieldAddress) -> Option<&Value> {
        self.get(address).and_then(FieldNode::as_value)
    }

    /// Returns true if a node exists at `address`.
    #[must_use]
    pub fn contains(&self, address: &FieldAddress) -> bool {
        self.get(address).is_some()
    }

    fn get_mut(&mut self, address: &FieldAddress) -> Option<&mut FieldNode> {
        let mut node = &mut self.root;
        for segment in address.segments() {
            node = node.child_mut(segment)?;
        }
        Some(node)
    }

    /// Sets a leaf value at `address`, creating or replacing the node.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent of `address` does not exist or cannot
    /// hold the child.
    pub fn set(&mut self, address: &FieldAddress, value: Value) -> Result<()> {
        self.set_node(address, FieldNode::Value(value))
    }

    /// Places `node` at `address`, creating or replacing whatever is there.
    ///
    /// Setting the root address replaces the whole tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent of `address` does not exist or cannot
    /// hold the child.
    pub fn set_node(&mut self, address: &FieldAddress, node: FieldNode) -> Result<()> {
        let Some(parent) = address.parent() else {
            self.root = node;
            return Ok(());
        };
        let Some(segment) = address.last().cloned() else {
            return Err(Error::invalid_address(address.clone(), "missing final segment"));
        };
        let parent_node = self
            .get_mut(&parent)
            .ok_or_else(|| Error::invalid_address(address.clone(), "parent does not exist"))?;
        parent_node.insert_child(segment, node)?;
        Ok(())
    }

    /// Adds a new node at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if a node already exists there or the parent is
    /// missing.
    pub fn add_node(&mut self, address: &FieldAddress, node: FieldNode) -> Result<()> {
        if address.is_root() || self.contains(address) {
            return Err(Error::invalid_address(address.clone(), "node already exists"));
        }
        self.set_node(address, node)
    }

    /// Removes and returns the node at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error for the root address or if nothing is there.
    pub fn remove_node(&mut self, address: &FieldAddress) -> Result<FieldNode> {
        let (Some(parent), Some(segment)) = (address.parent(), address.last()) else {
            return Err(Error::invalid_address(address.clone(), "cannot remove the root"));
        };
        self.get_mut(&parent)
            .and_then(|p| p.remove_child(segment))
            .ok_or_else(|| Error::invalid_address(address.clone(), "no node to remove"))
    }

    /// Visits every node in pre-order, parents before children.
    pub fn walk(&self, mut callback: impl FnMut(&FieldAddress, &FieldNode)) {
        fn visit(
            address: &mut FieldAddress,
            node: &FieldNode,
            callback: &mut dyn FnMut(&FieldAddress, &FieldNode),
        ) {
            callback(address, node);
            for (segment, child) in node.children() {
                address.push(segment);
                visit(address, child, callback);
                address.pop();
            }
        }
        let mut address = FieldAddress::root();
        visit(&mut address, &self.root, &mut callback);
    }

    /// Total number of nodes, the root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(|_, _| count += 1);
        count
    }

    /// Ids of every entity defined (as an entity-list key) in this tree.
    #[must_use]
    pub fn defined_entity_ids(&self) -> BTreeSet<EntityId> {
        let mut ids = BTreeSet::new();
        self.root.visit_entity_ids(&mut |id, role| {
            if role == EntityIdRole::Definition {
                ids.insert(id);
            }
        });
        ids
    }

    /// Returns a copy with every entity id rewritten by `f`.
    #[must_use]
    pub fn map_entity_ids(&self, mut f: impl FnMut(EntityId, EntityIdRole) -> EntityId) -> Self {
        Self {
            root: self.root.map_entity_ids(&mut f),
        }
    }
}

impl From<FieldNode> for FieldTree {
    fn from(root: FieldNode) -> Self {
        Self::new(root)
    }
}
