//! Core identifiers, values, field addresses, and errors for slicework.
//!
//! This crate provides:
//! - [`EntityId`] - Opaque 64-bit entity identity
//! - [`SliceAssetId`] / [`SliceInstanceId`] - Asset and instance identities
//! - [`Value`] - Scalar leaf values stored in field trees
//! - [`FieldAddress`] - Stable paths into a field tree
//! - [`Error`] - Rich error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod address;
pub mod entity;
pub mod error;
pub mod ids;
pub mod value;

pub use address::{ElementKey, FieldAddress, PathSegment};
pub use entity::EntityId;
pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use ids::{SliceAssetId, SliceInstanceId};
pub use value::Value;
