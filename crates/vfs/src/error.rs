//! Error types for the VFS crate.
//!
//! Only expected operational failures are represented here. Requests that
//! reference state a correct kernel could never ask for (an unknown inode or
//! handle ID, a lookup under a file) panic instead.

use std::time::Duration;

use prefixfs_common::KeyError;
use prefixfs_storage::StorageError;
use thiserror::Error;

use crate::inode::InodeId;

/// Errors that can occur during VFS operations.
#[derive(Debug, Error)]
pub enum VfsError {
    /// No object backs the requested child.
    #[error("No entry {name:?} in directory inode {parent}")]
    NotFound { parent: InodeId, name: String },

    /// The request needs a capability this filesystem does not provide.
    #[error("{what} is not implemented (requested for {name:?})")]
    Unimplemented { what: &'static str, name: String },

    /// Name from the kernel is not a valid single path component.
    #[error("Invalid name: {0}")]
    InvalidName(#[from] KeyError),

    /// Backing store request failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Request exceeded its deadline and was abandoned.
    #[error("Operation timed out after {0:?}")]
    TimedOut(Duration),

    /// Mount operation failed.
    #[error("Mount failed: {0}")]
    MountFailed(String),
}

impl VfsError {
    /// Map this error to the errno reported to the kernel.
    pub fn to_errno(&self) -> i32 {
        match self {
            VfsError::NotFound { .. } => libc::ENOENT,
            VfsError::Unimplemented { .. } => libc::ENOSYS,
            VfsError::InvalidName(_) => libc::EINVAL,
            VfsError::Storage(err) => match err {
                StorageError::NotFound { .. } => libc::ENOENT,
                StorageError::AccessDenied { .. } => libc::EACCES,
                StorageError::Cancelled => libc::EINTR,
                err if err.is_retryable() => libc::EAGAIN,
                _ => libc::EIO,
            },
            VfsError::TimedOut(_) => libc::ETIMEDOUT,
            VfsError::MountFailed(_) => libc::EIO,
        }
    }
}
