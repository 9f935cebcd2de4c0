//! Storage traits/interfaces for object store operations.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::{ListPage, ListRequest};

/// Information about an object from list/head operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modified timestamp (Unix epoch seconds).
    pub last_modified: Option<i64>,
    /// ETag (usually MD5 hash for non-multipart uploads).
    pub etag: Option<String>,
}

impl ObjectInfo {
    /// Create a record with only a key and size.
    ///
    /// # Arguments
    /// * `key` - Object key
    /// * `size` - Object size in bytes
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
            etag: None,
        }
    }

    /// Set the last modified timestamp.
    ///
    /// # Arguments
    /// * `secs` - Unix epoch seconds
    pub fn with_last_modified(mut self, secs: i64) -> Self {
        self.last_modified = Some(secs);
        self
    }

    /// Last modified timestamp as a `SystemTime`.
    ///
    /// Timestamps before the epoch are clamped to the epoch.
    pub fn modified_time(&self) -> Option<SystemTime> {
        self.last_modified
            .map(|secs: i64| UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64))
    }
}

/// Low-level object store operations - implemented by each backend.
///
/// Retry policy belongs to the implementation; callers issue each request
/// once and surface the result.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Fetch metadata for a single object.
    /// Returns None if the object doesn't exist.
    async fn head_object(&self, bucket: &str, key: &str)
        -> Result<Option<ObjectInfo>, StorageError>;

    /// List one page of objects under a prefix.
    ///
    /// With a delimiter set, keys containing the delimiter after the prefix
    /// are rolled up into common prefixes. Objects and common prefixes both
    /// count against `max_keys`.
    async fn list_objects_page(
        &self,
        bucket: &str,
        request: &ListRequest,
    ) -> Result<ListPage, StorageError>;
}
