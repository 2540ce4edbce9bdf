//! Integration tests for Layer 1: Tree
//!
//! Tests for field trees, entity encoding, and instantiated containers.

mod entities;
mod trees;
