//! Collections owned by the filesystem, guarded by its collection-wide lock.

use std::collections::HashMap;
use std::sync::Arc;

use prefixfs_common::ROOT_INODE_ID;

use crate::handle::{DirHandle, HandleId};
use crate::inode::{DirInode, Inode, InodeId};

/// Counts of live objects, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsStats {
    /// Live inodes, root included.
    pub inodes: usize,
    /// Live directory inodes, root included.
    pub directories: usize,
    /// Open directory handles.
    pub open_handles: usize,
}

/// Inode table, directory name index and handle table of one mount.
///
/// Every mutation happens through methods that complete without
/// suspending, so a dropped request future can never leave the tables
/// half-updated.
#[derive(Debug)]
pub struct FsState {
    pub(crate) uid: u32,
    pub(crate) gid: u32,
    pub(crate) inodes: HashMap<InodeId, Inode>,
    pub(crate) next_inode_id: InodeId,
    pub(crate) dir_index: HashMap<String, Arc<DirInode>>,
    pub(crate) handles: HashMap<HandleId, Arc<DirHandle>>,
    pub(crate) next_handle_id: HandleId,
}

impl FsState {
    /// Create the tables holding only `root`.
    pub(crate) fn new(root: Arc<DirInode>) -> Self {
        debug_assert_eq!(root.id(), ROOT_INODE_ID);
        debug_assert_eq!(root.name(), "");

        let mut inodes: HashMap<InodeId, Inode> = HashMap::new();
        inodes.insert(ROOT_INODE_ID, Inode::Dir(root.clone()));
        let mut dir_index: HashMap<String, Arc<DirInode>> = HashMap::new();
        dir_index.insert(String::new(), root);

        Self {
            uid: 0,
            gid: 0,
            inodes,
            next_inode_id: ROOT_INODE_ID + 1,
            dir_index,
            handles: HashMap::new(),
            next_handle_id: ROOT_INODE_ID + 1,
        }
    }

    /// Look up a live inode.
    ///
    /// # Panics
    /// If no inode has this ID. The kernel only uses IDs it was given.
    pub(crate) fn inode(&self, id: InodeId) -> &Inode {
        match self.inodes.get(&id) {
            Some(inode) => inode,
            None => panic!("unknown inode ID {}", id),
        }
    }

    /// Look up a live directory inode.
    ///
    /// # Panics
    /// If no inode has this ID or it is not a directory.
    pub(crate) fn dir(&self, id: InodeId) -> &Arc<DirInode> {
        match self.inode(id) {
            Inode::Dir(dir) => dir,
            Inode::File(file) => panic!(
                "inode {} ({:?}) is a file, expected a directory",
                id,
                file.name()
            ),
        }
    }

    /// Look up an open directory handle.
    ///
    /// # Panics
    /// If no open handle has this ID.
    pub(crate) fn handle(&self, id: HandleId) -> &Arc<DirHandle> {
        match self.handles.get(&id) {
            Some(handle) => handle,
            None => panic!("unknown directory handle {}", id),
        }
    }

    /// Return the directory registered under `name`, creating and
    /// registering one with a fresh ID if there is none.
    ///
    /// # Arguments
    /// * `name` - Root-relative directory name
    /// * `make` - Builds the inode for a freshly minted ID
    ///
    /// # Returns
    /// The directory and whether it was created by this call.
    pub(crate) fn look_up_or_create_dir(
        &mut self,
        name: &str,
        make: impl FnOnce(InodeId) -> DirInode,
    ) -> (Arc<DirInode>, bool) {
        if let Some(existing) = self.dir_index.get(name) {
            return (existing.clone(), false);
        }

        let id: InodeId = self.next_inode_id;
        self.next_inode_id += 1;

        let dir: Arc<DirInode> = Arc::new(make(id));
        debug_assert_eq!(dir.id(), id);
        debug_assert_eq!(dir.name(), name);

        self.inodes.insert(id, Inode::Dir(dir.clone()));
        self.dir_index.insert(name.to_string(), dir.clone());
        (dir, true)
    }

    /// Register an open handle under a fresh ID.
    pub(crate) fn register_handle(&mut self, handle: DirHandle) -> HandleId {
        let id: HandleId = self.next_handle_id;
        self.next_handle_id += 1;
        self.handles.insert(id, Arc::new(handle));
        id
    }

    /// Remove an open handle.
    ///
    /// # Panics
    /// If no open handle has this ID.
    pub(crate) fn remove_handle(&mut self, id: HandleId) -> Arc<DirHandle> {
        match self.handles.remove(&id) {
            Some(handle) => handle,
            None => panic!("release of unknown directory handle {}", id),
        }
    }

    pub(crate) fn stats(&self) -> FsStats {
        FsStats {
            inodes: self.inodes.len(),
            directories: self.dir_index.len(),
            open_handles: self.handles.len(),
        }
    }
}
