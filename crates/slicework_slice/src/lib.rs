//! Slice composition: reusable entity templates instantiated by delta.
//!
//! This crate provides:
//! - [`SliceComponent`] - The composition root: direct entities plus slice references
//! - [`SliceReference`] - All instances of one source asset
//! - [`SliceInstance`] - One instantiated copy: id map, data patch, override flags
//! - [`InstantiationCycleGuard`] - Per-call stack detecting cyclic asset dependencies
//! - [`AssetProvider`] - Where source assets come from
//! - [`SliceDocument`] - The persisted form of a component

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod asset;
pub mod component;
pub mod config;
pub mod document;
pub mod flags;
pub mod guard;
pub mod instance;
pub mod reference;

pub use asset::{AssetProvider, MemoryAssetProvider, SliceAsset};
pub use component::{InstantiateReport, RestoreInfo, SliceComponent};
pub use config::SliceConfig;
pub use document::{SliceDocument, SliceInstanceRecord, SliceReferenceRecord};
pub use flags::DataFlagsPerEntity;
pub use guard::InstantiationCycleGuard;
pub use instance::{SliceInstance, SliceInstanceAddress, SourceGraph};
pub use reference::{EntityAncestor, EntityRemoval, RemovedInstance, SliceReference};
