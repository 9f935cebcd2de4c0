use std::sync::Arc;
use std::time::SystemTime;

use prefixfs_common::{child_candidates, is_dir_name, ChildCandidates};
use prefixfs_storage::{ListPage, ObjectInfo};
use tokio::sync::{RwLock, RwLockReadGuard};

use super::{InodeAttributes, InodeContext, InodeId};
use crate::error::VfsError;

/// A directory synthesized from a key prefix.
///
/// The backing store may or may not hold a placeholder object under the
/// directory's own name. When it does, the placeholder supplies the mtime.
pub struct DirInode {
    id: InodeId,
    name: String,
    created_at: SystemTime,
    ctx: Arc<InodeContext>,
    state: RwLock<DirState>,
}

/// Mutable state of a directory, guarded by the directory's own lock.
#[derive(Debug, Default)]
pub struct DirState {
    cached: Option<CachedAttributes>,
}

#[derive(Debug, Clone, Copy)]
struct CachedAttributes {
    attributes: InodeAttributes,
    fetched_at: SystemTime,
}

impl DirState {
    fn fresh(&self, now: SystemTime, ctx: &InodeContext) -> Option<InodeAttributes> {
        let cached: CachedAttributes = self.cached?;
        // A clock that moved backwards invalidates the entry.
        let age = now.duration_since(cached.fetched_at).ok()?;
        (age < ctx.attr_cache_ttl).then_some(cached.attributes)
    }
}

impl std::fmt::Debug for DirInode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirInode")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl DirInode {
    /// Create a directory inode.
    ///
    /// # Arguments
    /// * `id` - Inode number
    /// * `name` - Root-relative directory name ("" for the root)
    /// * `ctx` - Shared mount context
    pub fn new(id: InodeId, name: impl Into<String>, ctx: Arc<InodeContext>) -> Self {
        let name: String = name.into();
        debug_assert!(is_dir_name(&name), "directory inode needs a directory name");

        Self {
            id,
            name,
            created_at: ctx.clock.now(),
            ctx,
            state: RwLock::new(DirState::default()),
        }
    }

    pub fn id(&self) -> InodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquire the directory's lock for shared access.
    pub async fn lock_shared(&self) -> RwLockReadGuard<'_, DirState> {
        self.state.read().await
    }

    /// Resolve a child name against the backing store.
    ///
    /// The directory key is probed before the file key, so a placeholder
    /// wins over a file of the same leaf name. With implicit directories
    /// enabled, a prefix that only has descendants resolves as a directory
    /// record of size zero.
    ///
    /// # Arguments
    /// * `leaf` - Child name within this directory
    ///
    /// # Returns
    /// The root-relative record, or `None` if nothing backs the child.
    pub async fn look_up_child(&self, leaf: &str) -> Result<Option<ObjectInfo>, VfsError> {
        let candidates: ChildCandidates = child_candidates(&self.name, leaf)?;

        if let Some(record) = self.ctx.bucket.stat(&candidates.dir).await? {
            return Ok(Some(record));
        }

        if let Some(file_key) = candidates.file.as_deref() {
            if let Some(record) = self.ctx.bucket.stat(file_key).await? {
                return Ok(Some(record));
            }
        }

        if self.ctx.implicit_dirs && self.ctx.bucket.has_descendants(&candidates.dir).await? {
            return Ok(Some(ObjectInfo::new(candidates.dir, 0)));
        }

        Ok(None)
    }

    /// Current attributes, refreshed from the placeholder object when the
    /// cached copy is older than the attribute TTL.
    pub async fn attributes(&self) -> Result<InodeAttributes, VfsError> {
        let now: SystemTime = self.ctx.clock.now();
        if let Some(attributes) = self.state.read().await.fresh(now, &self.ctx) {
            return Ok(attributes);
        }

        let placeholder: Option<ObjectInfo> = self.ctx.bucket.stat(&self.name).await?;
        let mtime: SystemTime = placeholder
            .and_then(|record| record.modified_time())
            .unwrap_or(self.created_at);
        let attributes: InodeAttributes = InodeAttributes::directory(mtime);

        self.state.write().await.cached = Some(CachedAttributes {
            attributes,
            fetched_at: now,
        });
        Ok(attributes)
    }

    /// List one page of this directory's direct children.
    ///
    /// # Arguments
    /// * `continuation_token` - Token from the previous page, if any
    /// * `page_size` - Maximum keys in the page
    pub async fn list_children(
        &self,
        continuation_token: Option<String>,
        page_size: usize,
    ) -> Result<ListPage, VfsError> {
        Ok(self
            .ctx
            .bucket
            .list(&self.name, continuation_token, page_size)
            .await?)
    }
}
