//! Shared data structures for storage operations.

use prefixfs_common::{
    normalize_prefix, relative_key, KeyError, DEFAULT_LIST_PAGE_SIZE, PATH_SEPARATOR,
};

use crate::traits::ObjectInfo;

/// Configuration settings for the storage backend.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// AWS region.
    pub region: String,
    /// AWS credentials (access key, secret key, session token).
    pub credentials: Option<AwsCredentials>,
    /// Custom endpoint for S3-compatible stores.
    pub endpoint_url: Option<String>,
    /// Use path-style addressing (required by most S3-compatible stores).
    pub force_path_style: bool,
    /// Expected bucket owner account ID, checked on every request.
    pub expected_bucket_owner: Option<String>,
    /// Retry settings applied by the client.
    pub retry: RetrySettings,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            region: "us-west-2".into(),
            credentials: None,
            endpoint_url: None,
            force_path_style: false,
            expected_bucket_owner: None,
            retry: RetrySettings::default(),
        }
    }
}

/// AWS credentials.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Retry settings for backend requests.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial backoff delay in milliseconds.
    pub initial_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 20_000,
        }
    }
}

/// Bucket and root prefix of a mount.
///
/// All keys handed to the filesystem are relative to `root_prefix`; this type
/// converts between relative names and full object keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketLocation {
    /// Bucket name.
    pub bucket: String,
    /// Normalized root prefix ("" or ending with '/').
    pub root_prefix: String,
}

impl BucketLocation {
    /// Create a new bucket location.
    ///
    /// # Arguments
    /// * `bucket` - Bucket name
    /// * `root_prefix` - Prefix to mount as the root; normalized on construction
    pub fn new(bucket: impl Into<String>, root_prefix: &str) -> Self {
        Self {
            bucket: bucket.into(),
            root_prefix: normalize_prefix(root_prefix),
        }
    }

    /// Generate the full object key for a name relative to the root.
    /// Returns: "{root_prefix}{name}"
    pub fn full_key(&self, name: &str) -> String {
        format!("{}{}", self.root_prefix, name)
    }

    /// Strip the root prefix from a full object key.
    ///
    /// # Errors
    /// Returns `KeyOutsidePrefix` if the key is not under the root.
    pub fn relative_key<'a>(&self, key: &'a str) -> Result<&'a str, KeyError> {
        relative_key(&self.root_prefix, key)
    }
}

/// Request for one page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    /// Only keys starting with this prefix are returned.
    pub prefix: String,
    /// Roll up keys at this delimiter into common prefixes.
    pub delimiter: Option<char>,
    /// Token from the previous page, if any.
    pub continuation_token: Option<String>,
    /// Maximum number of objects plus common prefixes in the page.
    pub max_keys: usize,
}

impl ListRequest {
    /// Create a delimited listing request for the first page under `prefix`.
    ///
    /// # Arguments
    /// * `prefix` - Key prefix to list
    pub fn delimited(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: Some(PATH_SEPARATOR),
            continuation_token: None,
            max_keys: DEFAULT_LIST_PAGE_SIZE,
        }
    }

    /// Continue from a previous page.
    pub fn with_continuation_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }

    /// Set the page size.
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys;
        self
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Objects directly under the prefix (or all objects without a delimiter).
    pub objects: Vec<ObjectInfo>,
    /// Rolled-up prefixes, each ending with the delimiter.
    pub common_prefixes: Vec<String>,
    /// Token for the next page; None on the last page.
    pub next_continuation_token: Option<String>,
}

impl ListPage {
    /// Check if this is the final page.
    pub fn is_last(&self) -> bool {
        self.next_continuation_token.is_none()
    }
}
