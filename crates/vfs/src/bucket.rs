//! Root-prefix-aware view of one bucket.
//!
//! Inodes speak in names relative to the mount root. This wrapper joins
//! those names onto the configured root prefix before calling the store and
//! strips the prefix from every key the store returns.

use std::sync::Arc;

use prefixfs_storage::{BucketLocation, ListPage, ListRequest, ObjectInfo, StorageClient, StorageError};

/// A bucket sub-tree addressed by root-relative names.
#[derive(Clone)]
pub struct Bucket {
    client: Arc<dyn StorageClient>,
    location: BucketLocation,
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl Bucket {
    /// Create a view over `location` using `client`.
    pub fn new(client: Arc<dyn StorageClient>, location: BucketLocation) -> Self {
        Self { client, location }
    }

    /// The mounted bucket and root prefix.
    pub fn location(&self) -> &BucketLocation {
        &self.location
    }

    /// Fetch the record for a single object.
    ///
    /// # Arguments
    /// * `name` - Root-relative key
    ///
    /// # Returns
    /// The record with a root-relative key, or `None` if no such object
    /// exists. The mount root of an unprefixed mount has no key and is
    /// always `None`.
    pub async fn stat(&self, name: &str) -> Result<Option<ObjectInfo>, StorageError> {
        let key: String = self.location.full_key(name);
        if key.is_empty() {
            return Ok(None);
        }

        match self.client.head_object(&self.location.bucket, &key).await? {
            Some(info) => Ok(Some(self.relativize(info)?)),
            None => Ok(None),
        }
    }

    /// List one page of the direct children of a directory.
    ///
    /// # Arguments
    /// * `dir_name` - Root-relative directory name
    /// * `continuation_token` - Token from the previous page, if any
    /// * `max_keys` - Page size
    pub async fn list(
        &self,
        dir_name: &str,
        continuation_token: Option<String>,
        max_keys: usize,
    ) -> Result<ListPage, StorageError> {
        let request: ListRequest = ListRequest::delimited(self.location.full_key(dir_name))
            .with_continuation_token(continuation_token)
            .with_max_keys(max_keys);

        let page: ListPage = self
            .client
            .list_objects_page(&self.location.bucket, &request)
            .await?;

        let objects: Vec<ObjectInfo> = page
            .objects
            .into_iter()
            .map(|info| self.relativize(info))
            .collect::<Result<_, _>>()?;

        let common_prefixes: Vec<String> = page
            .common_prefixes
            .iter()
            .map(|prefix| Ok(self.location.relative_key(prefix)?.to_string()))
            .collect::<Result<_, StorageError>>()?;

        Ok(ListPage {
            objects,
            common_prefixes,
            next_continuation_token: page.next_continuation_token,
        })
    }

    /// Check whether any object exists below a directory name.
    ///
    /// # Arguments
    /// * `dir_name` - Root-relative directory name
    pub async fn has_descendants(&self, dir_name: &str) -> Result<bool, StorageError> {
        let mut request: ListRequest =
            ListRequest::delimited(self.location.full_key(dir_name)).with_max_keys(1);
        request.delimiter = None;

        let page: ListPage = self
            .client
            .list_objects_page(&self.location.bucket, &request)
            .await?;
        Ok(!page.objects.is_empty())
    }

    fn relativize(&self, mut info: ObjectInfo) -> Result<ObjectInfo, StorageError> {
        info.key = self.location.relative_key(&info.key)?.to_string();
        Ok(info)
    }
}
