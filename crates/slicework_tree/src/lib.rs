//! The serialization substrate slicework patches operate on.
//!
//! This crate provides:
//! - [`FieldNode`] - Typed nodes: leaf values, records, and keyed lists
//! - [`FieldTree`] - Address-based get/set/add/remove/walk over a node tree
//! - [`Entity`] / [`Component`] - The entity model and its tree encoding
//! - [`InstantiatedContainer`] - A whole entity graph as a single tree

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod container;
pub mod entity;
pub mod node;
pub mod tree;

pub use container::InstantiatedContainer;
pub use entity::{Component, Entity};
pub use node::{EntityIdRole, FieldNode, ListKeyKind};
pub use tree::FieldTree;
