//! Data patches and entity identity remapping.
//!
//! This crate provides:
//! - [`DataFlags`] / [`FlagsMap`] - Per-address override policy
//! - [`DataPatch`] - Minimal edit sets between two field trees (create/apply)
//! - [`EntityIdMap`] - Base id to instance id tables
//! - [`EntityIdRemapper`] - Consistent id rewriting across an entity graph
//! - [`IdGenerator`] - Pluggable identity sources

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod flags;
pub mod generator;
pub mod id_map;
pub mod patch;
pub mod remapper;

pub use flags::{DataFlags, FlagsMap};
pub use generator::{CustomIdMapper, IdGenerator, RandomIdGenerator, SequentialIdGenerator};
pub use id_map::EntityIdMap;
pub use patch::{ApplyOutcome, DataPatch, PatchOp, StaleEdit};
pub use remapper::EntityIdRemapper;
