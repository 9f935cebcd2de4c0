//! Error types for CRT storage operations.

use prefixfs_storage::StorageError;
use thiserror::Error;

/// Errors specific to the CRT storage client.
#[derive(Error, Debug)]
pub enum CrtError {
    /// AWS SDK error.
    #[error("AWS SDK error: {message}")]
    SdkError { message: String, retryable: bool },

    /// Bucket does not exist or is not visible to the caller.
    #[error("No such bucket: {0}")]
    NoSuchBucket(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<CrtError> for StorageError {
    fn from(err: CrtError) -> Self {
        match err {
            CrtError::SdkError { message, retryable } => {
                StorageError::NetworkError { message, retryable }
            }
            CrtError::NoSuchBucket(bucket) => StorageError::InvalidConfig {
                message: format!("bucket {} does not exist", bucket),
            },
            CrtError::ConfigError(message) => StorageError::InvalidConfig { message },
        }
    }
}
