use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use log::info;

use crate::errors::{Result, SyncError};

/// Destination of the transformed files.
#[async_trait]
pub trait ObjectStore {
    async fn upload_file(&self, path: &Path, key: &str) -> Result<()>;
}

/// Object key for a local file: `prefix/<file name>`.
pub fn object_key(prefix: &str, path: &Path) -> String {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Region and credentials come from the usual AWS environment.
    pub async fn new(bucket: String) -> S3ObjectStore {
        let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
        S3ObjectStore {
            client: Client::new(&shared),
            bucket,
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload_file(&self, path: &Path, key: &str) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| SyncError::Storage(format!("can't read {}: {}", path.display(), e)))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                SyncError::Storage(format!(
                    "put_object s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;
        info!("uploaded {} to s3://{}/{}", path.display(), self.bucket, key);
        Ok(())
    }
}
