//! In-memory `StorageClient` for tests and local experimentation.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::traits::{ObjectInfo, StorageClient};
use crate::types::{ListPage, ListRequest};

/// Object store held entirely in memory.
///
/// Listing follows S3 `ListObjectsV2` semantics: keys are returned in
/// lexicographic order, delimited keys are rolled up into common prefixes,
/// and continuation tokens are the last key or prefix of the previous page.
#[derive(Debug, Default)]
pub struct MemoryStorageClient {
    buckets: RwLock<HashMap<String, BTreeMap<String, ObjectInfo>>>,
    head_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

/// A listing entry before pagination.
enum Listed {
    Object(ObjectInfo),
    Prefix(String),
}

impl Listed {
    fn name(&self) -> &str {
        match self {
            Listed::Object(info) => &info.key,
            Listed::Prefix(prefix) => prefix,
        }
    }
}

impl MemoryStorageClient {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an object record.
    ///
    /// # Arguments
    /// * `bucket` - Bucket name (created on first use)
    /// * `info` - Object record; its key is the map key
    pub fn insert(&self, bucket: &str, info: ObjectInfo) {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(info.key.clone(), info);
    }

    /// Insert an object with the given key and size.
    ///
    /// # Arguments
    /// * `bucket` - Bucket name
    /// * `key` - Object key
    /// * `size` - Object size in bytes
    pub fn put_object(&self, bucket: &str, key: &str, size: u64) {
        self.insert(bucket, ObjectInfo::new(key, size));
    }

    /// Number of `head_object` calls served so far.
    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    /// Number of `list_objects_page` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Group the keys under `request.prefix` into objects and common prefixes.
    ///
    /// The result is sorted by name, and every key below a common prefix
    /// sorts adjacent to it, so names are strictly increasing.
    fn collect_listing(objects: &BTreeMap<String, ObjectInfo>, request: &ListRequest) -> Vec<Listed> {
        let mut listed: Vec<Listed> = Vec::new();
        let range = objects.range::<str, _>((Bound::Included(request.prefix.as_str()), Bound::Unbounded));

        for (key, info) in range.take_while(|(key, _)| key.starts_with(&request.prefix)) {
            let rest: &str = &key[request.prefix.len()..];

            let rolled_up: Option<String> = request.delimiter.and_then(|delimiter: char| {
                rest.find(delimiter)
                    .map(|idx: usize| format!("{}{}", request.prefix, &rest[..=idx]))
            });

            match rolled_up {
                Some(prefix) => {
                    let duplicate: bool =
                        matches!(listed.last(), Some(Listed::Prefix(last)) if *last == prefix);
                    if !duplicate {
                        listed.push(Listed::Prefix(prefix));
                    }
                }
                None => listed.push(Listed::Object(info.clone())),
            }
        }

        listed
    }
}

#[async_trait]
impl StorageClient for MemoryStorageClient {
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectInfo>, StorageError> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);

        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        Ok(buckets.get(bucket).and_then(|objects| objects.get(key)).cloned())
    }

    async fn list_objects_page(
        &self,
        bucket: &str,
        request: &ListRequest,
    ) -> Result<ListPage, StorageError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if request.max_keys == 0 {
            return Err(StorageError::InvalidConfig {
                message: "max_keys must be positive".into(),
            });
        }

        let listed: Vec<Listed> = {
            let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
            match buckets.get(bucket) {
                Some(objects) => Self::collect_listing(objects, request),
                None => Vec::new(),
            }
        };

        let mut remaining = listed.into_iter().filter(|item: &Listed| {
            request
                .continuation_token
                .as_deref()
                .map_or(true, |token: &str| item.name() > token)
        });

        let mut page = ListPage::default();
        let mut last_name: Option<String> = None;

        for item in remaining.by_ref().take(request.max_keys) {
            last_name = Some(item.name().to_string());
            match item {
                Listed::Object(info) => page.objects.push(info),
                Listed::Prefix(prefix) => page.common_prefixes.push(prefix),
            }
        }

        if remaining.next().is_some() {
            page.next_continuation_token = last_name;
        }

        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> MemoryStorageClient {
        let store = MemoryStorageClient::new();
        for key in ["a.txt", "b/", "b/one.txt", "b/two/three.txt", "c.txt", "d/x"] {
            store.put_object("bucket", key, 1);
        }
        store
    }

    #[tokio::test]
    async fn test_head_object() {
        let store = populated();
        let found: Option<ObjectInfo> = store.head_object("bucket", "a.txt").await.unwrap();
        assert_eq!(found.map(|o| o.key), Some("a.txt".to_string()));
        assert!(store.head_object("bucket", "missing").await.unwrap().is_none());
        assert!(store.head_object("other", "a.txt").await.unwrap().is_none());
        assert_eq!(store.head_calls(), 3);
    }

    #[tokio::test]
    async fn test_delimited_listing() {
        let store = populated();
        let page: ListPage = store
            .list_objects_page("bucket", &ListRequest::delimited(""))
            .await
            .unwrap();

        let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a.txt", "c.txt"]);
        assert_eq!(page.common_prefixes, vec!["b/", "d/"]);
        assert!(page.is_last());
    }

    #[tokio::test]
    async fn test_listing_under_prefix_includes_placeholder() {
        let store = populated();
        let page: ListPage = store
            .list_objects_page("bucket", &ListRequest::delimited("b/"))
            .await
            .unwrap();

        let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["b/", "b/one.txt"]);
        assert_eq!(page.common_prefixes, vec!["b/two/"]);
    }

    #[tokio::test]
    async fn test_pagination_counts_prefixes() {
        let store = populated();
        let first: ListPage = store
            .list_objects_page("bucket", &ListRequest::delimited("").with_max_keys(2))
            .await
            .unwrap();
        assert_eq!(first.objects.len(), 1);
        assert_eq!(first.common_prefixes, vec!["b/"]);
        assert_eq!(first.next_continuation_token.as_deref(), Some("b/"));

        let second: ListPage = store
            .list_objects_page(
                "bucket",
                &ListRequest::delimited("")
                    .with_max_keys(2)
                    .with_continuation_token(first.next_continuation_token),
            )
            .await
            .unwrap();
        assert_eq!(second.objects[0].key, "c.txt");
        assert_eq!(second.common_prefixes, vec!["d/"]);
        assert!(second.is_last());
        assert_eq!(store.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_undelimited_listing() {
        let store = populated();
        let mut request = ListRequest::delimited("b/");
        request.delimiter = None;

        let page: ListPage = store.list_objects_page("bucket", &request).await.unwrap();
        assert_eq!(page.objects.len(), 3);
        assert!(page.common_prefixes.is_empty());
    }

    #[tokio::test]
    async fn test_zero_page_size_rejected() {
        let store = populated();
        let result = store
            .list_objects_page("bucket", &ListRequest::delimited("").with_max_keys(0))
            .await;
        assert!(matches!(result, Err(StorageError::InvalidConfig { .. })));
    }
}
