//! Persistence, file-backed assets, logging, and CLI for slicework.
//!
//! This crate provides:
//! - `MessagePack` serialization of [`SliceDocument`](slicework_slice::SliceDocument)s
//! - [`FileAssetProvider`] - Slice assets stored as files under one directory
//! - [`logging::init`] - `tracing` subscriber setup driven by `RUST_LOG`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod logging;
pub mod provider;
pub mod serialize;

pub use provider::{FileAssetProvider, SLICE_EXTENSION};
pub use serialize::{from_bytes, load_from_file, save_to_file, to_bytes};
