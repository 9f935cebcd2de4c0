//! Storage abstraction for prefixfs object store operations.
//!
//! This crate provides a backend-agnostic interface for the two operations the
//! filesystem needs from an object store: fetching metadata for a single key
//! and listing keys under a prefix one page at a time. Backends:
//!
//! - **CRT Backend** (`prefixfs-storage-crt`) - AWS SDK for Rust, S3 and
//!   S3-compatible endpoints
//! - **Memory Backend** ([`MemoryStorageClient`]) - in-process store for tests

mod error;
mod memory;
mod traits;
mod types;

pub use error::StorageError;
pub use memory::MemoryStorageClient;
pub use traits::{ObjectInfo, StorageClient};
pub use types::{
    AwsCredentials, BucketLocation, ListPage, ListRequest, RetrySettings, StorageSettings,
};
