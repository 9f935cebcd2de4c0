//! Shared types and utilities for prefixfs.
//!
//! This crate provides common functionality used across all prefixfs crates:
//! - Key naming conventions for directories synthesized from prefixes
//! - Shared constants
//! - Shared error types

pub mod constants;
pub mod error;
pub mod keys;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::KeyError;
pub use keys::{
    child_candidates, is_dir_name, leaf_name, normalize_prefix, relative_key, validate_leaf_name,
    ChildCandidates,
};
