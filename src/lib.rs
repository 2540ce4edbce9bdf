//! Slicework - Slice composition and data-patch engine
//!
//! This crate re-exports all layers of the Slicework system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 4: slicework_runtime    - Document files, file asset provider, CLI
//! Layer 3: slicework_slice      - Slice components, references, instances
//! Layer 2: slicework_patch      - Data patches, override flags, id remapping
//! Layer 1: slicework_tree       - Field trees, entities, instantiated containers
//! Layer 0: slicework_foundation - Core types (Value, EntityId, FieldAddress, Error)
//! ```

pub use slicework_foundation as foundation;
pub use slicework_patch as patch;
pub use slicework_runtime as runtime;
pub use slicework_slice as slice;
pub use slicework_tree as tree;
