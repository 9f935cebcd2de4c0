//! Error types for storage operations.

use prefixfs_common::KeyError;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// Object not found in the bucket.
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Access denied.
    #[error("Access denied to s3://{bucket}/{key}: {message}")]
    AccessDenied {
        bucket: String,
        key: String,
        message: String,
    },

    /// Network error.
    #[error("Network error: {message}")]
    NetworkError { message: String, retryable: bool },

    /// Operation cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The store returned a key outside the expected namespace.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl StorageError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::NetworkError { retryable, .. } => *retryable,
            StorageError::NotFound { .. } => false,
            StorageError::AccessDenied { .. } => false,
            StorageError::Cancelled => false,
            StorageError::InvalidConfig { .. } => false,
            StorageError::Key(_) => false,
            StorageError::Other { .. } => false,
        }
    }
}
