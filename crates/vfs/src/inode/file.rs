use std::time::{SystemTime, UNIX_EPOCH};

use prefixfs_storage::ObjectInfo;

use super::{InodeAttributes, InodeId};

/// A file backed by a single object.
///
/// Attributes are taken from the object record the inode was created from.
#[derive(Debug)]
pub struct FileInode {
    id: InodeId,
    record: ObjectInfo,
}

impl FileInode {
    /// Create a file inode from a root-relative object record.
    pub fn new(id: InodeId, record: ObjectInfo) -> Self {
        debug_assert!(
            !prefixfs_common::is_dir_name(&record.key),
            "file inode needs a file name"
        );
        Self { id, record }
    }

    pub fn id(&self) -> InodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.record.key
    }

    /// Attributes from the backing object record.
    pub fn attributes(&self) -> InodeAttributes {
        let mtime: SystemTime = self.record.modified_time().unwrap_or(UNIX_EPOCH);
        InodeAttributes::file(self.record.size, mtime)
    }
}
