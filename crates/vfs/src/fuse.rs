//! FUSE adapter exposing a [`BucketFs`](crate::BucketFs) to the kernel.
//!
//! Each kernel request is run to completion on the tokio runtime under the
//! configured request deadline. A request that misses its deadline is
//! dropped, which cancels any backing-store call in flight, and the kernel
//! gets `ETIMEDOUT`.

#[cfg(feature = "fuse")]
mod impl_fuse {
    use std::ffi::OsStr;
    use std::future::Future;
    use std::os::raw::c_int;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::{Duration, UNIX_EPOCH};

    use fuser::{
        FileAttr, FileType, Filesystem, KernelConfig, MountOption, ReplyAttr, ReplyDirectory,
        ReplyEmpty, ReplyEntry, ReplyOpen, Request,
    };
    use tokio::runtime::Handle;
    use tracing::error;

    use crate::fs::{BucketFs, LookUpEntry};
    use crate::handle::{DirCursor, ReadDirResponse};
    use crate::inode::{InodeAttributes, InodeKind};
    use crate::VfsError;

    /// Entries requested from a handle per readdir call.
    const READDIR_BATCH: usize = 256;

    /// Inode number reported in readdir replies. The kernel resolves names
    /// through lookup and does not rely on it.
    const UNKNOWN_INO: u64 = u32::MAX as u64;

    /// Kernel offsets 1 and 2 belong to "." and "..".
    const DOT_ENTRIES: u64 = 2;

    /// Handle cursor to resume from after the entry at kernel offset `offset`.
    fn handle_cursor(offset: i64) -> DirCursor {
        let offset: u64 = u64::try_from(offset).unwrap_or(0);
        DirCursor::new(offset.saturating_sub(DOT_ENTRIES))
    }

    /// Kernel offset for a handle entry whose successor is at `next`.
    fn kernel_offset(next: DirCursor) -> i64 {
        i64::try_from(next.value().saturating_add(DOT_ENTRIES)).unwrap_or(i64::MAX)
    }

    /// Options passed to the FUSE mount.
    #[derive(Debug, Clone)]
    pub struct MountOptions {
        /// Filesystem name shown in the mount table.
        pub fs_name: String,
        /// Let users other than the mounting user access the tree.
        /// Also enables unmounting when the process exits.
        pub allow_other: bool,
    }

    impl Default for MountOptions {
        fn default() -> Self {
            Self {
                fs_name: "prefixfs".into(),
                allow_other: false,
            }
        }
    }

    impl MountOptions {
        fn to_fuser(&self) -> Vec<MountOption> {
            let mut options: Vec<MountOption> = vec![
                MountOption::FSName(self.fs_name.clone()),
                MountOption::RO,
                MountOption::DefaultPermissions,
            ];
            if self.allow_other {
                options.push(MountOption::AllowOther);
                options.push(MountOption::AutoUnmount);
            }
            options
        }
    }

    /// Bridges synchronous FUSE callbacks to the async filesystem.
    pub struct FuseAdapter {
        fs: Arc<BucketFs>,
        runtime: Handle,
    }

    impl FuseAdapter {
        /// Create an adapter running requests on the current tokio runtime.
        ///
        /// # Errors
        /// `MountFailed` when called outside a tokio runtime.
        pub fn new(fs: Arc<BucketFs>) -> Result<Self, VfsError> {
            let runtime: Handle = Handle::try_current()
                .map_err(|e| VfsError::MountFailed(format!("no tokio runtime: {}", e)))?;
            Ok(Self::with_runtime(fs, runtime))
        }

        /// Create an adapter running requests on `runtime`.
        pub fn with_runtime(fs: Arc<BucketFs>, runtime: Handle) -> Self {
            Self { fs, runtime }
        }

        /// Run one request on the runtime under the request deadline.
        fn run<T, F>(&self, fut: F) -> Result<T, VfsError>
        where
            F: Future<Output = Result<T, VfsError>>,
        {
            let deadline: Option<Duration> = self.fs.options().timeouts.request_timeout();
            self.runtime.block_on(async move {
                match deadline {
                    Some(limit) => tokio::time::timeout(limit, fut)
                        .await
                        .unwrap_or_else(|_| Err(VfsError::TimedOut(limit))),
                    None => fut.await,
                }
            })
        }

        fn attr_ttl(&self) -> Duration {
            self.fs.options().kernel_cache.attr_ttl()
        }

        fn entry_ttl(&self) -> Duration {
            self.fs.options().kernel_cache.entry_ttl()
        }
    }

    fn file_type(kind: InodeKind) -> FileType {
        match kind {
            InodeKind::Directory => FileType::Directory,
            InodeKind::File => FileType::RegularFile,
        }
    }

    /// Convert inode attributes to FUSE attributes.
    ///
    /// # Arguments
    /// * `ino` - Inode number
    /// * `attrs` - Attributes to convert
    fn to_file_attr(ino: u64, attrs: &InodeAttributes) -> FileAttr {
        FileAttr {
            ino,
            size: attrs.size,
            blocks: (attrs.size + 511) / 512,
            atime: attrs.mtime,
            mtime: attrs.mtime,
            ctime: attrs.mtime,
            crtime: UNIX_EPOCH,
            kind: file_type(attrs.kind),
            perm: attrs.perm,
            nlink: attrs.nlink,
            uid: attrs.uid,
            gid: attrs.gid,
            rdev: 0,
            blksize: 512,
            flags: 0,
        }
    }

    impl Filesystem for FuseAdapter {
        fn init(&mut self, req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
            self.runtime.block_on(self.fs.init(req.uid(), req.gid()));
            Ok(())
        }

        fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
            let name_str: &str = match name.to_str() {
                Some(n) => n,
                None => {
                    reply.error(libc::ENOENT);
                    return;
                }
            };

            match self.run(self.fs.look_up_inode(parent, name_str)) {
                Ok(LookUpEntry { child, attributes }) => {
                    reply.entry(&self.entry_ttl(), &to_file_attr(child, &attributes), 0);
                }
                // Misses and file children are routine.
                Err(err @ (VfsError::NotFound { .. } | VfsError::Unimplemented { .. })) => {
                    reply.error(err.to_errno())
                }
                Err(err) => {
                    error!(parent, name = name_str, "lookup failed: {}", err);
                    reply.error(err.to_errno());
                }
            }
        }

        fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
            match self.run(self.fs.get_inode_attributes(ino)) {
                Ok(attributes) => reply.attr(&self.attr_ttl(), &to_file_attr(ino, &attributes)),
                Err(err) => {
                    error!(ino, "getattr failed: {}", err);
                    reply.error(err.to_errno());
                }
            }
        }

        fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
            let fs: &BucketFs = &self.fs;
            match self.run(async move { Ok(fs.open_dir(ino).await) }) {
                Ok(fh) => reply.opened(fh, 0),
                Err(err) => {
                    error!(ino, "opendir failed: {}", err);
                    reply.error(err.to_errno());
                }
            }
        }

        fn readdir(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            fh: u64,
            offset: i64,
            mut reply: ReplyDirectory,
        ) {
            let dots: [(u64, &str); 2] = [(ino, "."), (UNKNOWN_INO, "..")];
            let skip: usize = usize::try_from(offset).unwrap_or(0);
            for (index, (dot_ino, name)) in dots.into_iter().enumerate().skip(skip) {
                if reply.add(dot_ino, index as i64 + 1, FileType::Directory, name) {
                    reply.ok();
                    return;
                }
            }

            let cursor: DirCursor = handle_cursor(offset);
            let response: ReadDirResponse =
                match self.run(self.fs.read_dir(fh, cursor, READDIR_BATCH)) {
                    Ok(response) => response,
                    Err(err) => {
                        error!(ino, fh, offset, "readdir failed: {}", err);
                        reply.error(err.to_errno());
                        return;
                    }
                };

            for entry in &response.entries {
                let next: i64 = kernel_offset(entry.next);
                if reply.add(UNKNOWN_INO, next, file_type(entry.kind), &entry.name) {
                    break;
                }
            }
            reply.ok();
        }

        fn releasedir(
            &mut self,
            _req: &Request<'_>,
            _ino: u64,
            fh: u64,
            _flags: i32,
            reply: ReplyEmpty,
        ) {
            // Release must not be abandoned halfway, so it runs without a deadline.
            self.runtime.block_on(self.fs.release_dir_handle(fh));
            reply.ok();
        }
    }

    /// Mount a filesystem and serve it on the current thread until unmounted.
    ///
    /// # Arguments
    /// * `adapter` - The adapter to mount
    /// * `mountpoint` - Path to mount at
    /// * `options` - Mount options
    pub fn mount(
        adapter: FuseAdapter,
        mountpoint: &Path,
        options: &MountOptions,
    ) -> Result<(), VfsError> {
        fuser::mount2(adapter, mountpoint, &options.to_fuser())
            .map_err(|e| VfsError::MountFailed(e.to_string()))
    }

    /// Spawn a mount served by a background thread.
    ///
    /// # Arguments
    /// * `adapter` - The adapter to mount
    /// * `mountpoint` - Path to mount at
    /// * `options` - Mount options
    ///
    /// # Returns
    /// Background session handle. Dropping it unmounts the filesystem.
    pub fn spawn_mount(
        adapter: FuseAdapter,
        mountpoint: &Path,
        options: &MountOptions,
    ) -> Result<fuser::BackgroundSession, VfsError> {
        fuser::spawn_mount2(adapter, mountpoint, &options.to_fuser())
            .map_err(|e| VfsError::MountFailed(e.to_string()))
    }

}

#[cfg(feature = "fuse")]
pub use impl_fuse::{mount, spawn_mount, FuseAdapter, MountOptions};
