//! Inodes: the addressable nodes of the mounted tree.
//!
//! Every inode is either a directory, named by a key ending in the path
//! separator (or the empty root name), or a file, named by any other key.
//! Each inode guards its own mutable state with its own lock.

mod dir;
mod file;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::bucket::Bucket;
use crate::clock::Clock;

pub use dir::{DirInode, DirState};
pub use file::FileInode;

/// Inode number. Never reused within one mount.
pub type InodeId = u64;

/// Permission bits reported for directories.
pub const DIR_PERM: u16 = 0o700;

/// Permission bits reported for files.
pub const FILE_PERM: u16 = 0o600;

/// Kind of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InodeKind {
    Directory,
    File,
}

/// Attributes reported for an inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeAttributes {
    pub kind: InodeKind,
    pub size: u64,
    pub nlink: u32,
    /// Permission bits, without the file type.
    pub perm: u16,
    pub mtime: SystemTime,
    pub uid: u32,
    pub gid: u32,
}

impl InodeAttributes {
    /// Attributes of a directory last modified at `mtime`.
    pub fn directory(mtime: SystemTime) -> Self {
        Self {
            kind: InodeKind::Directory,
            size: 0,
            nlink: 1,
            perm: DIR_PERM,
            mtime,
            uid: 0,
            gid: 0,
        }
    }

    /// Attributes of a file of `size` bytes last modified at `mtime`.
    pub fn file(size: u64, mtime: SystemTime) -> Self {
        Self {
            kind: InodeKind::File,
            size,
            nlink: 1,
            perm: FILE_PERM,
            mtime,
            uid: 0,
            gid: 0,
        }
    }

    /// Replace the owner.
    pub fn with_owner(mut self, uid: u32, gid: u32) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    /// Full `st_mode`, file type included.
    pub fn mode(&self) -> u32 {
        let file_type: u32 = match self.kind {
            InodeKind::Directory => libc::S_IFDIR as u32,
            InodeKind::File => libc::S_IFREG as u32,
        };
        file_type | u32::from(self.perm)
    }
}

/// Collaborators and settings shared by every inode of a mount.
#[derive(Clone)]
pub struct InodeContext {
    pub bucket: Bucket,
    pub clock: Arc<dyn Clock>,
    /// Freshness window for cached directory attributes.
    pub attr_cache_ttl: Duration,
    /// Resolve prefixes without a placeholder object as directories.
    pub implicit_dirs: bool,
}

impl std::fmt::Debug for InodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InodeContext")
            .field("bucket", &self.bucket)
            .field("attr_cache_ttl", &self.attr_cache_ttl)
            .field("implicit_dirs", &self.implicit_dirs)
            .finish_non_exhaustive()
    }
}

/// A live node of the tree.
#[derive(Debug, Clone)]
pub enum Inode {
    Dir(Arc<DirInode>),
    File(Arc<FileInode>),
}

impl Inode {
    /// Inode number.
    pub fn id(&self) -> InodeId {
        match self {
            Inode::Dir(dir) => dir.id(),
            Inode::File(file) => file.id(),
        }
    }

    /// Root-relative name.
    pub fn name(&self) -> &str {
        match self {
            Inode::Dir(dir) => dir.name(),
            Inode::File(file) => file.name(),
        }
    }
}
