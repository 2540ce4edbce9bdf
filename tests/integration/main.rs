//! Cross-layer integration tests for Slicework
//!
//! Tests that verify correct interaction between multiple crates.

mod nesting;
mod persistence;
