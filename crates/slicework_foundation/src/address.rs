//! Stable addresses into a field tree.
//!
//! An address is a path of segments from the tree root. Record children are
//! addressed by field name, list children by an [`ElementKey`]. Addresses
//! order lexicographically by segment, so a parent always sorts before any
//! of its descendants. Patch application relies on that ordering.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Key of an element inside a list node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ElementKey {
    /// Positional index.
    Index(u64),
    /// Persistent id that survives reordering (components use this).
    Id(u64),
    /// Entity identity (entity lists use this).
    Entity(EntityId),
}

impl ElementKey {
    /// Returns the entity id if this key addresses an entity.
    #[must_use]
    pub const fn as_entity(self) -> Option<EntityId> {
        match self {
            Self::Entity(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "[{i}]"),
            Self::Id(id) => write!(f, "#{id}"),
            Self::Entity(id) => write!(f, "@{}", id.raw()),
        }
    }
}

/// One step of a [`FieldAddress`].
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PathSegment {
    /// Named field of a record.
    Field(Arc<str>),
    /// Keyed element of a list.
    Element(ElementKey),
}

impl PathSegment {
    /// Returns the field name if this is a field segment.
    #[must_use]
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Self::Field(name) => Some(name),
            Self::Element(_) => None,
        }
    }

    /// Returns the element key if this is an element segment.
    #[must_use]
    pub const fn as_element(&self) -> Option<ElementKey> {
        match self {
            Self::Field(_) => None,
            Self::Element(key) => Some(*key),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, "{name}"),
            Self::Element(key) => write!(f, "{key}"),
        }
    }
}

/// Path from the root of a field tree to one node.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct FieldAddress(Vec<PathSegment>);

impl FieldAddress {
    /// The empty address (the tree root).
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Builds an address from segments.
    #[must_use]
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Returns true for the root address.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the root address.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The segments of this address.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// The last segment, if any.
    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Returns a new address extended by a field segment.
    #[must_use]
    pub fn with_field(&self, name: &str) -> Self {
        self.with_segment(PathSegment::Field(Arc::from(name)))
    }

    /// Returns a new address extended by a positional element.
    #[must_use]
    pub fn with_index(&self, index: u64) -> Self {
        self.with_segment(PathSegment::Element(ElementKey::Index(index)))
    }

    /// Returns a new address extended by a persistent-id element.
    #[must_use]
    pub fn with_id(&self, id: u64) -> Self {
        self.with_segment(PathSegment::Element(ElementKey::Id(id)))
    }

    /// Returns a new address extended by an entity element.
    #[must_use]
    pub fn with_entity(&self, id: EntityId) -> Self {
        self.with_segment(PathSegment::Element(ElementKey::Entity(id)))
    }

    /// Returns a new address extended by `segment`.
    #[must_use]
    pub fn with_segment(&self, segment: PathSegment) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend(self.0.iter().cloned());
        segments.push(segment);
        Self(segments)
    }

    /// Appends a segment in place.
    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    /// Removes and returns the last segment.
    pub fn pop(&mut self) -> Option<PathSegment> {
        self.0.pop()
    }

    /// The parent address, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Iterates this address and all its ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = FieldAddress> + '_ {
        (0..=self.0.len()).rev().map(|n| Self(self.0[..n].to_vec()))
    }

    /// Returns true if `prefix` is this address or one of its ancestors.
    #[must_use]
    pub fn starts_with(&self, prefix: &FieldAddress) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Strips `prefix`, returning the relative remainder.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &FieldAddress) -> Option<Self> {
        self.0.strip_prefix(prefix.0.as_slice()).map(|rest| Self(rest.to_vec()))
    }

    /// Concatenates two addresses.
    #[must_use]
    pub fn join(&self, other: &FieldAddress) -> Self {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Self(segments)
    }

    /// Rewrites every entity element key with `f`.
    #[must_use]
    pub fn remap_entities(&self, mut f: impl FnMut(EntityId) -> EntityId) -> Self {
        Self(
            self.0
                .iter()
                .map(|segment| match segment {
                    PathSegment::Element(ElementKey::Entity(id)) => {
                        PathSegment::Element(ElementKey::Entity(f(*id)))
                    }
                    other => other.clone(),
                })
                .collect(),
        )
    }
}

impl fmt::Display for FieldAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<Vec<PathSegment>> for FieldAddress {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}
