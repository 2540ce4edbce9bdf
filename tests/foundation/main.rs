//! Integration tests for Layer 0: Foundation
//!
//! Tests for core types: identifiers, field addresses, values, and errors.

mod addresses;
