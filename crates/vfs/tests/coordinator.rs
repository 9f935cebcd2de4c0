//! Integration tests for the filesystem coordinator.
//!
//! Covers the operation surface end to end against an in-memory bucket:
//! - init: owner overlay
//! - lookup: directory minting and dedup, misses, file children
//! - getattr: root and minted directories, unknown IDs
//! - opendir / readdir / releasedir: handle lifecycle and pagination
//! - cancellation: dropped requests leave the tables consistent

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use prefixfs_common::ROOT_INODE_ID;
use prefixfs_storage::{
    BucketLocation, ListPage, ListRequest, MemoryStorageClient, ObjectInfo, StorageClient,
    StorageError,
};
use prefixfs_vfs::{
    BucketFs, DirCursor, FsStats, HandleId, InodeKind, ListingOptions, LookUpEntry,
    ReadDirResponse, SimulatedClock, VfsError, VfsOptions,
};

const BUCKET: &str = "bucket";

fn start_time() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn options(page_size: usize) -> VfsOptions {
    VfsOptions::default()
        .with_listing(ListingOptions::default().with_page_size(page_size))
        .with_invariant_checks(true)
}

/// Helper to create a filesystem over an in-memory bucket holding `keys`.
fn create_test_fs(keys: &[&str], page_size: usize) -> (Arc<MemoryStorageClient>, Arc<BucketFs>) {
    let store = Arc::new(MemoryStorageClient::new());
    for key in keys {
        store.put_object(BUCKET, key, 1);
    }
    let fs = BucketFs::new(
        store.clone(),
        BucketLocation::new(BUCKET, ""),
        Arc::new(SimulatedClock::new(start_time())),
        options(page_size),
    );
    (store, Arc::new(fs))
}

fn names(response: &ReadDirResponse) -> Vec<&str> {
    response.entries.iter().map(|e| e.name.as_str()).collect()
}

/// Store that can be told to stall or fail, wrapping a memory store.
#[derive(Debug, Default)]
struct ControlledStore {
    inner: MemoryStorageClient,
    stall_heads: AtomicBool,
    stall_lists: AtomicBool,
    fail: AtomicBool,
}

impl ControlledStore {
    async fn gate(&self, stall: &AtomicBool) -> Result<(), StorageError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::NetworkError {
                message: "connection reset".into(),
                retryable: true,
            });
        }
        if stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageClient for ControlledStore {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectInfo>, StorageError> {
        self.gate(&self.stall_heads).await?;
        self.inner.head_object(bucket, key).await
    }

    async fn list_objects_page(
        &self,
        bucket: &str,
        request: &ListRequest,
    ) -> Result<ListPage, StorageError> {
        self.gate(&self.stall_lists).await?;
        self.inner.list_objects_page(bucket, request).await
    }
}

fn create_controlled_fs(keys: &[&str], page_size: usize) -> (Arc<ControlledStore>, Arc<BucketFs>) {
    let store = Arc::new(ControlledStore::default());
    for key in keys {
        store.inner.put_object(BUCKET, key, 1);
    }
    let fs = BucketFs::new(
        store.clone(),
        BucketLocation::new(BUCKET, ""),
        Arc::new(SimulatedClock::new(start_time())),
        options(page_size),
    );
    (store, Arc::new(fs))
}

// ============================================================================
// init
// ============================================================================

mod init {
    use super::*;

    #[tokio::test]
    async fn test_owner_overlaid_on_every_response() {
        let (_, fs) = create_test_fs(&["logs/"], 10);
        fs.init(500, 500).await;

        let root = fs.get_inode_attributes(ROOT_INODE_ID).await.unwrap();
        assert_eq!((root.uid, root.gid), (500, 500));

        let logs: LookUpEntry = fs.look_up_inode(ROOT_INODE_ID, "logs").await.unwrap();
        assert_eq!((logs.attributes.uid, logs.attributes.gid), (500, 500));

        let child = fs.get_inode_attributes(logs.child).await.unwrap();
        assert_eq!((child.uid, child.gid), (500, 500));
    }

    #[tokio::test]
    async fn test_reinit_changes_owner() {
        let (_, fs) = create_test_fs(&[], 10);
        fs.init(1, 2).await;
        fs.init(3, 4).await;

        let root = fs.get_inode_attributes(ROOT_INODE_ID).await.unwrap();
        assert_eq!((root.uid, root.gid), (3, 4));
    }
}

// ============================================================================
// lookup
// ============================================================================

mod lookup {
    use super::*;
    use futures::future::join_all;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lookups_converge() {
        let (_, fs) = create_test_fs(&["logs/", "logs/app.log"], 10);
        fs.init(500, 500).await;

        let lookups = (0..2).map(|_| {
            let fs = fs.clone();
            tokio::spawn(async move { fs.look_up_inode(ROOT_INODE_ID, "logs/").await })
        });
        let results: Vec<LookUpEntry> = join_all(lookups)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(results[0].child, results[1].child);
        assert_eq!(results[0].child, ROOT_INODE_ID + 1);

        let stats: FsStats = fs.stats().await;
        assert_eq!(stats.directories, 2);
        assert_eq!(stats.inodes, 2);
        assert_eq!(fs.verify_invariants().await, Ok(()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_concurrent_lookups() {
        let keys: Vec<String> = (0..8).map(|i| format!("dir{}/", i)).collect();
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let (_, fs) = create_test_fs(&key_refs, 10);

        let lookups = (0..64).map(|i| {
            let fs = fs.clone();
            let name: String = format!("dir{}", i % 8);
            tokio::spawn(async move { (name.clone(), fs.look_up_inode(ROOT_INODE_ID, &name).await) })
        });

        let mut by_name: std::collections::HashMap<String, u64> = std::collections::HashMap::new();
        for joined in join_all(lookups).await {
            let (name, result) = joined.unwrap();
            let child: u64 = result.unwrap().child;
            assert_eq!(*by_name.entry(name).or_insert(child), child);
        }

        let mut ids: Vec<u64> = by_name.values().copied().collect();
        ids.sort_unstable();
        assert_eq!(ids, (ROOT_INODE_ID + 1..ROOT_INODE_ID + 9).collect::<Vec<_>>());
        assert_eq!(fs.verify_invariants().await, Ok(()));
    }

    #[tokio::test]
    async fn test_nested_directories() {
        let (_, fs) = create_test_fs(&["a/", "a/b/", "a/b/c/"], 10);

        let a: LookUpEntry = fs.look_up_inode(ROOT_INODE_ID, "a").await.unwrap();
        let b: LookUpEntry = fs.look_up_inode(a.child, "b").await.unwrap();
        let c: LookUpEntry = fs.look_up_inode(b.child, "c").await.unwrap();

        assert_eq!(c.attributes.kind, InodeKind::Directory);
        assert!(ROOT_INODE_ID < a.child && a.child < b.child && b.child < c.child);
    }

    #[tokio::test]
    async fn test_file_child_is_unimplemented() {
        let (_, fs) = create_test_fs(&["file.txt"], 10);

        let result = fs.look_up_inode(ROOT_INODE_ID, "file.txt").await;
        let err: VfsError = result.unwrap_err();
        assert!(matches!(err, VfsError::Unimplemented { .. }));
        assert_eq!(err.to_errno(), libc::ENOSYS);

        assert_eq!(fs.stats().await.inodes, 1);
        assert_eq!(fs.verify_invariants().await, Ok(()));
    }

    #[tokio::test]
    async fn test_failed_file_lookup_mints_nothing() {
        let (_, fs) = create_test_fs(&["file.txt", "dir/"], 10);

        fs.look_up_inode(ROOT_INODE_ID, "file.txt").await.unwrap_err();
        let dir: LookUpEntry = fs.look_up_inode(ROOT_INODE_ID, "dir").await.unwrap();
        assert_eq!(dir.child, ROOT_INODE_ID + 1);
    }

    #[tokio::test]
    async fn test_missing_child() {
        let (_, fs) = create_test_fs(&["present/"], 10);

        let err: VfsError = fs.look_up_inode(ROOT_INODE_ID, "absent").await.unwrap_err();
        assert!(matches!(
            &err,
            VfsError::NotFound { parent, name } if *parent == ROOT_INODE_ID && name == "absent"
        ));
        assert_eq!(err.to_errno(), libc::ENOENT);
    }

    #[tokio::test]
    async fn test_implicit_directories() {
        let store = Arc::new(MemoryStorageClient::new());
        store.put_object(BUCKET, "photos/2024/img.jpg", 10);
        let fs = BucketFs::new(
            store,
            BucketLocation::new(BUCKET, ""),
            Arc::new(SimulatedClock::new(start_time())),
            options(10).with_listing(ListingOptions::default().with_implicit_dirs(true)),
        );

        let photos: LookUpEntry = fs.look_up_inode(ROOT_INODE_ID, "photos").await.unwrap();
        let year: LookUpEntry = fs.look_up_inode(photos.child, "2024").await.unwrap();
        assert_eq!(year.attributes.kind, InodeKind::Directory);
        // No placeholder, so the mtime is the creation time.
        assert_eq!(year.attributes.mtime, start_time());
    }

    #[tokio::test]
    async fn test_root_prefix() {
        let store = Arc::new(MemoryStorageClient::new());
        store.insert(BUCKET, ObjectInfo::new("tenant/a/", 0).with_last_modified(42));
        store.put_object(BUCKET, "a/", 0);
        let fs = BucketFs::new(
            store,
            BucketLocation::new(BUCKET, "/tenant"),
            Arc::new(SimulatedClock::new(start_time())),
            options(10),
        );

        let a: LookUpEntry = fs.look_up_inode(ROOT_INODE_ID, "a").await.unwrap();
        assert_eq!(a.attributes.mtime, UNIX_EPOCH + Duration::from_secs(42));
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces() {
        let (store, fs) = create_controlled_fs(&["a/"], 10);
        store.fail.store(true, Ordering::SeqCst);

        let err: VfsError = fs.look_up_inode(ROOT_INODE_ID, "a").await.unwrap_err();
        assert!(matches!(err, VfsError::Storage(StorageError::NetworkError { .. })));
        assert_eq!(err.to_errno(), libc::EAGAIN);
        assert_eq!(fs.stats().await.inodes, 1);
    }

    #[tokio::test]
    #[should_panic(expected = "unknown inode ID 77")]
    async fn test_unknown_parent_panics() {
        let (_, fs) = create_test_fs(&[], 10);
        let _ = fs.look_up_inode(77, "a").await;
    }
}

// ============================================================================
// getattr
// ============================================================================

mod getattr {
    use super::*;

    #[tokio::test]
    async fn test_root_attributes() {
        let (_, fs) = create_test_fs(&[], 10);
        let attrs = fs.get_inode_attributes(ROOT_INODE_ID).await.unwrap();

        assert_eq!(attrs.kind, InodeKind::Directory);
        assert_eq!(attrs.perm, 0o700);
        assert_eq!(attrs.size, 0);
        assert_eq!(attrs.nlink, 1);
        assert_eq!(attrs.mtime, start_time());
    }

    #[tokio::test]
    async fn test_placeholder_mtime() {
        let (store, fs) = create_test_fs(&[], 10);
        store.insert(BUCKET, ObjectInfo::new("dated/", 0).with_last_modified(1_000));

        let dated: LookUpEntry = fs.look_up_inode(ROOT_INODE_ID, "dated").await.unwrap();
        let attrs = fs.get_inode_attributes(dated.child).await.unwrap();
        assert_eq!(attrs.mtime, UNIX_EPOCH + Duration::from_secs(1_000));
    }

    #[tokio::test]
    #[should_panic(expected = "unknown inode ID 999")]
    async fn test_unknown_inode_panics() {
        let (_, fs) = create_test_fs(&[], 10);
        let _ = fs.get_inode_attributes(999).await;
    }
}

// ============================================================================
// opendir / readdir / releasedir
// ============================================================================

mod directory_handles {
    use super::*;

    const KEYS: &[&str] = &[
        "alpha.txt", "beta/", "beta/inner.txt", "delta.txt", "epsilon/x", "gamma.txt",
    ];

    #[tokio::test]
    async fn test_paginated_read_then_release() {
        let (_, fs) = create_test_fs(KEYS, 2);
        let handle: HandleId = fs.open_dir(ROOT_INODE_ID).await;

        let first: ReadDirResponse = fs.read_dir(handle, DirCursor::START, 100).await.unwrap();
        assert_eq!(names(&first), vec!["alpha.txt", "beta"]);
        let cursor: DirCursor = first.next_cursor.unwrap();

        let mut seen: Vec<String> = names(&first).iter().map(|s| s.to_string()).collect();
        let mut next: Option<DirCursor> = Some(cursor);
        while let Some(cursor) = next {
            let page: ReadDirResponse = fs.read_dir(handle, cursor, 100).await.unwrap();
            seen.extend(page.entries.iter().map(|e| e.name.clone()));
            next = page.next_cursor;
        }

        assert_eq!(seen, vec!["alpha.txt", "beta", "delta.txt", "epsilon", "gamma.txt"]);
        fs.release_dir_handle(handle).await;
        assert_eq!(fs.stats().await.open_handles, 0);
    }

    #[tokio::test]
    #[should_panic(expected = "unknown directory handle")]
    async fn test_read_after_release_panics() {
        let (_, fs) = create_test_fs(KEYS, 2);
        let handle: HandleId = fs.open_dir(ROOT_INODE_ID).await;
        fs.read_dir(handle, DirCursor::START, 10).await.unwrap();
        fs.release_dir_handle(handle).await;

        let _ = fs.read_dir(handle, DirCursor::START, 10).await;
    }

    #[tokio::test]
    #[should_panic(expected = "release of unknown directory handle")]
    async fn test_double_release_panics() {
        let (_, fs) = create_test_fs(&[], 2);
        let handle: HandleId = fs.open_dir(ROOT_INODE_ID).await;
        fs.release_dir_handle(handle).await;
        fs.release_dir_handle(handle).await;
    }

    #[tokio::test]
    async fn test_entry_kinds_and_placeholder_skipped() {
        let (_, fs) = create_test_fs(&["beta/", "beta/inner.txt", "beta/deeper/x"], 10);
        let beta: LookUpEntry = fs.look_up_inode(ROOT_INODE_ID, "beta").await.unwrap();

        let handle: HandleId = fs.open_dir(beta.child).await;
        let response: ReadDirResponse = fs.read_dir(handle, DirCursor::START, 10).await.unwrap();

        assert_eq!(names(&response), vec!["deeper", "inner.txt"]);
        assert_eq!(response.entries[0].kind, InodeKind::Directory);
        assert_eq!(response.entries[1].kind, InodeKind::File);
        assert_eq!(response.next_cursor, None);
    }

    #[tokio::test]
    async fn test_open_handles_iterate_independently() {
        let (_, fs) = create_test_fs(KEYS, 100);
        let first: HandleId = fs.open_dir(ROOT_INODE_ID).await;
        let second: HandleId = fs.open_dir(ROOT_INODE_ID).await;
        assert_ne!(first, second);

        let partial: ReadDirResponse = fs.read_dir(first, DirCursor::START, 2).await.unwrap();
        let full: ReadDirResponse = fs.read_dir(second, DirCursor::START, 100).await.unwrap();
        assert_eq!(partial.entries.len(), 2);
        assert_eq!(full.entries.len(), 5);

        let rest: ReadDirResponse = fs
            .read_dir(first, partial.next_cursor.unwrap(), 100)
            .await
            .unwrap();
        assert_eq!(names(&rest), vec!["delta.txt", "epsilon", "gamma.txt"]);
        assert_eq!(fs.stats().await.open_handles, 2);
    }

    #[tokio::test]
    async fn test_listing_kind_matches_lookup_across_pages() {
        // With one key per page, object "dup" and prefix "dup/" land on
        // different pages.
        let (_, fs) = create_test_fs(&["dup", "dup/", "dup/x"], 1);
        let looked_up: LookUpEntry = fs.look_up_inode(ROOT_INODE_ID, "dup").await.unwrap();
        assert_eq!(looked_up.attributes.kind, InodeKind::Directory);

        let handle: HandleId = fs.open_dir(ROOT_INODE_ID).await;
        let mut listed: Vec<(String, InodeKind)> = Vec::new();
        let mut next: Option<DirCursor> = Some(DirCursor::START);
        while let Some(cursor) = next {
            let page: ReadDirResponse = fs.read_dir(handle, cursor, 100).await.unwrap();
            listed.extend(page.entries.iter().map(|e| (e.name.clone(), e.kind)));
            next = page.next_cursor;
        }

        assert_eq!(listed, vec![("dup".to_string(), InodeKind::Directory)]);
        fs.release_dir_handle(handle).await;
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let (_, fs) = create_test_fs(&[], 10);
        let handle: HandleId = fs.open_dir(ROOT_INODE_ID).await;
        let response: ReadDirResponse = fs.read_dir(handle, DirCursor::START, 10).await.unwrap();
        assert!(response.entries.is_empty());
        assert_eq!(response.next_cursor, None);
    }
}

// ============================================================================
// cancellation
// ============================================================================

mod cancellation {
    use super::*;

    const DEADLINE: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_cancelled_lookup_leaves_tables_consistent() {
        let (store, fs) = create_controlled_fs(&["slow/", "fast/"], 10);
        store.stall_heads.store(true, Ordering::SeqCst);

        let outcome = tokio::time::timeout(DEADLINE, fs.look_up_inode(ROOT_INODE_ID, "slow")).await;
        assert!(outcome.is_err());
        assert_eq!(fs.verify_invariants().await, Ok(()));
        assert_eq!(fs.stats().await.inodes, 1);

        // The exclusive lock was released with the dropped request.
        store.stall_heads.store(false, Ordering::SeqCst);
        let fast: LookUpEntry = fs.look_up_inode(ROOT_INODE_ID, "fast").await.unwrap();
        assert_eq!(fast.child, ROOT_INODE_ID + 1);
    }

    #[tokio::test]
    async fn test_cancelled_read_can_be_retried() {
        let (store, fs) = create_controlled_fs(&["a", "b", "c"], 10);
        let handle: HandleId = fs.open_dir(ROOT_INODE_ID).await;

        store.stall_lists.store(true, Ordering::SeqCst);
        let outcome =
            tokio::time::timeout(DEADLINE, fs.read_dir(handle, DirCursor::START, 10)).await;
        assert!(outcome.is_err());

        store.stall_lists.store(false, Ordering::SeqCst);
        let response: ReadDirResponse = fs.read_dir(handle, DirCursor::START, 10).await.unwrap();
        assert_eq!(names(&response), vec!["a", "b", "c"]);

        fs.release_dir_handle(handle).await;
        assert_eq!(fs.verify_invariants().await, Ok(()));
    }
}
