//! Integration tests for Layer 3: Slice
//!
//! Tests for slice components, references, instances, instantiation, and
//! the data-patch lifecycle of instances.

mod cycles;
mod fixtures;
mod lifecycle;
