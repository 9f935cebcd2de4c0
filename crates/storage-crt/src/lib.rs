//! AWS SDK S3 backend for prefixfs storage.
//!
//! This crate provides a `StorageClient` implementation using the AWS SDK for Rust.
//! It works against S3 and S3-compatible endpoints (MinIO, Ceph RGW, ...).
//!
//! # Example
//!
//! ```ignore
//! use prefixfs_storage::{BucketLocation, StorageSettings};
//! use prefixfs_storage_crt::CrtStorageClient;
//!
//! let settings = StorageSettings::default();
//! let client = CrtStorageClient::new(settings).await?;
//! let location = BucketLocation::new("my-bucket", "datasets/");
//! ```

mod client;
mod error;

pub use client::CrtStorageClient;
pub use error::CrtError;
