//! Shared error types used across prefixfs crates.

use thiserror::Error;

/// Key-related errors shared across crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Leaf name cannot be used as a single tree component.
    #[error("Invalid leaf name: {name:?}")]
    InvalidLeafName {
        /// The rejected name.
        name: String,
    },

    /// Key is not rooted under the expected prefix.
    #[error("Key is outside root prefix: {key} not in {prefix}")]
    KeyOutsidePrefix {
        /// The key that was checked.
        key: String,
        /// The prefix it should be within.
        prefix: String,
    },
}
