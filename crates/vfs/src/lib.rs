//! Read-only FUSE filesystem presenting an object storage bucket as a
//! directory tree.
//!
//! Object stores have no directories and no inode numbers. This crate
//! synthesizes both: keys ending in `/` (and common prefixes of a delimited
//! listing) become directories, and [`BucketFs`] hands out stable inode and
//! directory handle IDs for the lifetime of a mount.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: FUSE Interface (FuseAdapter, fuser::Filesystem impl)
//! Layer 2: Coordinator (BucketFs: inode table, name index, handle table)
//! Layer 1: Primitives (DirInode, DirHandle, Bucket, InvariantRwLock)
//! ```

pub mod bucket;
pub mod clock;
pub mod error;
pub mod fs;
pub mod fuse;
pub mod handle;
pub mod inode;
pub mod invariants;
pub mod lock;
pub mod options;
pub mod state;

pub use bucket::Bucket;
pub use clock::{Clock, RealClock, SimulatedClock};
pub use error::VfsError;
pub use fs::{BucketFs, LookUpEntry};
#[cfg(feature = "fuse")]
pub use fuse::{mount, spawn_mount, FuseAdapter, MountOptions};
pub use handle::{DirCursor, DirEntry, DirHandle, HandleId, ReadDirResponse};
pub use inode::{DirInode, FileInode, Inode, InodeAttributes, InodeId, InodeKind};
pub use invariants::{verify_invariants, InvariantViolation};
pub use lock::InvariantRwLock;
pub use options::{KernelCacheOptions, ListingOptions, TimeoutOptions, VfsOptions};
pub use state::{FsState, FsStats};
