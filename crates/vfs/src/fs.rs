//! The filesystem coordinator.
//!
//! [`BucketFs`] owns the inode table, the directory name index and the
//! directory handle table behind one collection-wide lock. That lock is
//! always taken before any inode or handle lock, never after. Operations
//! that mint or remove entries hold it exclusively; pure lookups share it.
//!
//! Requests referring to inode or handle IDs the filesystem never issued (or
//! already released) are contract violations by the kernel layer and panic.

use std::sync::Arc;

use prefixfs_common::{is_dir_name, ROOT_INODE_ID};
use prefixfs_storage::{BucketLocation, ObjectInfo, StorageClient};
use tracing::{debug, warn};

use crate::bucket::Bucket;
use crate::clock::Clock;
use crate::error::VfsError;
use crate::handle::{DirCursor, DirHandle, HandleId, ReadDirResponse};
use crate::inode::{DirInode, Inode, InodeAttributes, InodeContext, InodeId};
use crate::invariants::{check_invariants, verify_invariants, InvariantViolation};
use crate::lock::InvariantRwLock;
use crate::options::VfsOptions;
use crate::state::{FsState, FsStats};

/// Result of resolving a child name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookUpEntry {
    pub child: InodeId,
    pub attributes: InodeAttributes,
}

/// A bucket sub-tree presented as a read-only directory tree.
pub struct BucketFs {
    ctx: Arc<InodeContext>,
    options: VfsOptions,
    state: InvariantRwLock<FsState>,
}

impl std::fmt::Debug for BucketFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketFs")
            .field("ctx", &self.ctx)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl BucketFs {
    /// Create a filesystem whose root is `location`.
    ///
    /// # Arguments
    /// * `client` - Backing object store
    /// * `location` - Bucket and root prefix to mount
    /// * `clock` - Time source for attributes
    /// * `options` - VFS configuration
    pub fn new(
        client: Arc<dyn StorageClient>,
        location: BucketLocation,
        clock: Arc<dyn Clock>,
        mut options: VfsOptions,
    ) -> Self {
        if options.listing.page_size == 0 {
            warn!("Listing page size 0 is not usable, using 1");
            options.listing.page_size = 1;
        }

        let ctx = Arc::new(InodeContext {
            bucket: Bucket::new(client, location),
            clock,
            attr_cache_ttl: options.attr_cache_ttl,
            implicit_dirs: options.listing.implicit_dirs,
        });

        let root = Arc::new(DirInode::new(ROOT_INODE_ID, "", ctx.clone()));
        let state: FsState = FsState::new(root);
        let state: InvariantRwLock<FsState> = if options.check_invariants {
            InvariantRwLock::with_check(state, check_invariants)
        } else {
            InvariantRwLock::new(state)
        };

        debug!(
            bucket = %ctx.bucket.location().bucket,
            prefix = %ctx.bucket.location().root_prefix,
            "Created filesystem"
        );
        Self {
            ctx,
            options,
            state,
        }
    }

    pub fn options(&self) -> &VfsOptions {
        &self.options
    }

    /// Record the owner reported for every inode.
    ///
    /// # Arguments
    /// * `uid` - Owning user
    /// * `gid` - Owning group
    pub async fn init(&self, uid: u32, gid: u32) {
        let mut state = self.state.write().await;
        state.uid = uid;
        state.gid = gid;
        debug!(uid, gid, "Initialized filesystem");
    }

    /// Resolve `name` within directory `parent`.
    ///
    /// A directory child reuses the inode already registered under its name,
    /// or gets a fresh one. Concurrent lookups of one name converge on a
    /// single inode.
    ///
    /// # Arguments
    /// * `parent` - Directory inode
    /// * `name` - Child name within `parent`
    ///
    /// # Errors
    /// `NotFound` if nothing backs the child, `Unimplemented` if the child
    /// is a file, or the backing-store error.
    ///
    /// # Panics
    /// If `parent` is unknown or not a directory.
    pub async fn look_up_inode(&self, parent: InodeId, name: &str) -> Result<LookUpEntry, VfsError> {
        let mut state = self.state.write().await;
        let parent_dir: Arc<DirInode> = state.dir(parent).clone();

        let record: ObjectInfo = match parent_dir.look_up_child(name).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Err(VfsError::NotFound {
                    parent,
                    name: name.to_string(),
                })
            }
            Err(err) => {
                warn!(parent, name, "Child lookup failed: {}", err);
                return Err(err);
            }
        };

        if !is_dir_name(&record.key) {
            return Err(VfsError::Unimplemented {
                what: "file inodes",
                name: record.key,
            });
        }

        let (dir, created) = state.look_up_or_create_dir(&record.key, |id| {
            DirInode::new(id, record.key.as_str(), self.ctx.clone())
        });
        if created {
            debug!(id = dir.id(), name = %dir.name(), "Minted directory inode");
        }

        let attributes: InodeAttributes = dir.attributes().await.map_err(|err| {
            warn!(id = dir.id(), "Fetching attributes failed: {}", err);
            err
        })?;

        Ok(LookUpEntry {
            child: dir.id(),
            attributes: attributes.with_owner(state.uid, state.gid),
        })
    }

    /// Fetch the attributes of an inode.
    ///
    /// # Panics
    /// If `id` is unknown or names a file inode.
    pub async fn get_inode_attributes(&self, id: InodeId) -> Result<InodeAttributes, VfsError> {
        let state = self.state.read().await;
        let dir: &Arc<DirInode> = match state.inode(id) {
            Inode::Dir(dir) => dir,
            Inode::File(file) => panic!(
                "attributes requested for file inode {} ({:?}), which is not supported",
                id,
                file.name()
            ),
        };

        let attributes: InodeAttributes = dir.attributes().await.map_err(|err| {
            warn!(id, "Fetching attributes failed: {}", err);
            err
        })?;
        Ok(attributes.with_owner(state.uid, state.gid))
    }

    /// Open a directory for iteration.
    ///
    /// # Returns
    /// ID of a fresh handle positioned at the start of the directory.
    ///
    /// # Panics
    /// If `id` is unknown or not a directory.
    pub async fn open_dir(&self, id: InodeId) -> HandleId {
        let mut state = self.state.write().await;
        let dir: Arc<DirInode> = state.dir(id).clone();

        // Holding the directory's lock for a moment proves it is usable.
        drop(dir.lock_shared().await);

        let handle: DirHandle = DirHandle::new(dir, self.options.listing.page_size);
        let handle_id: HandleId = state.register_handle(handle);
        debug!(inode = id, handle = handle_id, "Opened directory");
        handle_id
    }

    /// Read entries from an open directory handle.
    ///
    /// # Arguments
    /// * `handle` - Handle returned by [`BucketFs::open_dir`]
    /// * `cursor` - Position to read from
    /// * `max_entries` - Upper bound on returned entries
    ///
    /// # Panics
    /// If `handle` is not open.
    pub async fn read_dir(
        &self,
        handle: HandleId,
        cursor: DirCursor,
        max_entries: usize,
    ) -> Result<ReadDirResponse, VfsError> {
        let state = self.state.read().await;
        let dir_handle: &Arc<DirHandle> = state.handle(handle);

        dir_handle.read_dir(cursor, max_entries).await.map_err(|err| {
            warn!(handle, cursor = cursor.value(), "Reading directory failed: {}", err);
            err
        })
    }

    /// Close a directory handle.
    ///
    /// # Panics
    /// If `handle` is not open.
    pub async fn release_dir_handle(&self, handle: HandleId) {
        let mut state = self.state.write().await;
        let released: Arc<DirHandle> = state.remove_handle(handle);
        debug!(handle, inode = released.dir().id(), "Released directory handle");
    }

    /// Counts of live inodes and open handles.
    pub async fn stats(&self) -> FsStats {
        self.state.read().await.stats()
    }

    /// Verify every structural invariant now, whether or not checks are
    /// enabled on the lock.
    pub async fn verify_invariants(&self) -> Result<(), InvariantViolation> {
        verify_invariants(&*self.state.read().await)
    }
}
