//! AWS SDK S3 client implementation.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::DateTime;
use aws_sdk_s3::Client as S3Client;

use prefixfs_storage::{
    ListPage, ListRequest, ObjectInfo, StorageClient, StorageError, StorageSettings,
};

use crate::error::CrtError;

/// StorageClient implementation using AWS SDK for Rust.
///
/// Retries are handled by the SDK's standard retry strategy, configured from
/// [`StorageSettings::retry`].
pub struct CrtStorageClient {
    /// The underlying S3 client.
    s3_client: S3Client,
    /// Expected bucket owner for security validation.
    expected_bucket_owner: Option<String>,
}

impl CrtStorageClient {
    /// Create a new CRT storage client with default credential chain.
    ///
    /// # Arguments
    /// * `settings` - Storage settings including region and optional credentials
    ///
    /// # Returns
    /// A new CRT storage client.
    pub async fn new(settings: StorageSettings) -> Result<Self, StorageError> {
        if settings.retry.max_attempts == 0 {
            let err = CrtError::ConfigError("retry.max_attempts must be at least 1".into());
            return Err(err.into());
        }

        let retry_config: RetryConfig = RetryConfig::standard()
            .with_max_attempts(settings.retry.max_attempts)
            .with_initial_backoff(Duration::from_millis(settings.retry.initial_backoff_ms))
            .with_max_backoff(Duration::from_millis(settings.retry.max_backoff_ms));

        let mut config_loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(settings.region.clone()))
            .retry_config(retry_config);

        if let Some(ref creds) = settings.credentials {
            let credentials = Credentials::new(
                &creds.access_key_id,
                &creds.secret_access_key,
                creds.session_token.clone(),
                None,
                "prefixfs",
            );
            config_loader = config_loader.credentials_provider(credentials);
        }

        if let Some(ref endpoint) = settings.endpoint_url {
            config_loader = config_loader.endpoint_url(endpoint);
        }

        let sdk_config = config_loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.force_path_style)
            .build();

        Ok(Self {
            s3_client: S3Client::from_conf(s3_config),
            expected_bucket_owner: settings.expected_bucket_owner,
        })
    }

    /// Create a client from an existing S3Client (for testing).
    ///
    /// # Arguments
    /// * `s3_client` - Pre-configured S3 client
    /// * `expected_bucket_owner` - Optional expected bucket owner
    pub fn from_client(s3_client: S3Client, expected_bucket_owner: Option<String>) -> Self {
        Self {
            s3_client,
            expected_bucket_owner,
        }
    }
}

/// Convert an SDK timestamp to Unix epoch seconds.
fn epoch_secs(dt: &DateTime) -> i64 {
    dt.secs()
}

#[async_trait]
impl StorageClient for CrtStorageClient {
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectInfo>, StorageError> {
        let mut request = self.s3_client.head_object().bucket(bucket).key(key);

        if let Some(ref owner) = self.expected_bucket_owner {
            request = request.expected_bucket_owner(owner);
        }

        match request.send().await {
            Ok(output) => Ok(Some(ObjectInfo {
                key: key.to_string(),
                size: output.content_length().map(|l| l.max(0) as u64).unwrap_or(0),
                last_modified: output.last_modified().map(epoch_secs),
                etag: output.e_tag().map(|s| s.to_string()),
            })),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(None)
                } else {
                    tracing::warn!(
                        bucket,
                        key,
                        "head_object failed: {}",
                        DisplayErrorContext(&service_err)
                    );
                    Err(CrtError::SdkError {
                        message: DisplayErrorContext(&service_err).to_string(),
                        retryable: false,
                    }
                    .into())
                }
            }
        }
    }

    async fn list_objects_page(
        &self,
        bucket: &str,
        request: &ListRequest,
    ) -> Result<ListPage, StorageError> {
        let max_keys: i32 =
            i32::try_from(request.max_keys).map_err(|_| StorageError::InvalidConfig {
                message: format!("page size {} exceeds the S3 limit", request.max_keys),
            })?;

        let mut list_request = self
            .s3_client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(&request.prefix)
            .max_keys(max_keys)
            .set_delimiter(request.delimiter.map(String::from))
            .set_continuation_token(request.continuation_token.clone());

        if let Some(ref owner) = self.expected_bucket_owner {
            list_request = list_request.expected_bucket_owner(owner);
        }

        let response = match list_request.send().await {
            Ok(response) => response,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_bucket() {
                    return Err(CrtError::NoSuchBucket(bucket.to_string()).into());
                }
                tracing::warn!(
                    bucket,
                    prefix = %request.prefix,
                    "list_objects_v2 failed: {}",
                    DisplayErrorContext(&service_err)
                );
                return Err(CrtError::SdkError {
                    message: DisplayErrorContext(&service_err).to_string(),
                    retryable: false,
                }
                .into());
            }
        };

        let objects: Vec<ObjectInfo> = response
            .contents()
            .iter()
            .map(|obj| ObjectInfo {
                key: obj.key().unwrap_or_default().to_string(),
                size: obj.size().map(|s| s.max(0) as u64).unwrap_or(0),
                last_modified: obj.last_modified().map(epoch_secs),
                etag: obj.e_tag().map(|s| s.to_string()),
            })
            .collect();

        let common_prefixes: Vec<String> = response
            .common_prefixes()
            .iter()
            .filter_map(|cp| cp.prefix().map(|p| p.to_string()))
            .collect();

        let next_continuation_token: Option<String> = if response.is_truncated() == Some(true) {
            response.next_continuation_token().map(|t| t.to_string())
        } else {
            None
        };

        Ok(ListPage {
            objects,
            common_prefixes,
            next_continuation_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crt_client_implements_storage_client() {
        // This is a compile-time test to ensure the trait is implemented correctly
        fn assert_storage_client<T: StorageClient>() {}
        assert_storage_client::<CrtStorageClient>();
    }

    #[test]
    fn test_epoch_secs() {
        let dt: DateTime = DateTime::from_secs(1_700_000_000);
        assert_eq!(epoch_secs(&dt), 1_700_000_000);
    }

    #[tokio::test]
    async fn test_zero_retry_attempts_rejected() {
        let mut settings = StorageSettings::default();
        settings.retry.max_attempts = 0;
        let result = CrtStorageClient::new(settings).await;
        assert!(matches!(result, Err(StorageError::InvalidConfig { .. })));
    }
}
