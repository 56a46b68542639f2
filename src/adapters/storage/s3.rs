//! S3-compatible bucket storage

use super::{check_key, DurableStorage, StoredObject};
use crate::config::S3Config;
use crate::domain::{MatrikelError, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use std::path::Path;

/// Bucket-backed storage through the AWS SDK
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            config.access_key.expose_secret().as_ref(),
            config.secret_key.expose_secret().as_ref(),
            None,
            None,
            "matrikel-storage",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        tracing::debug!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "S3 client initialized"
        );

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl DurableStorage for S3Storage {
    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }

    async fn upload(&self, local: &Path, key: &str) -> Result<u64> {
        check_key(key)?;
        let size = tokio::fs::metadata(local)
            .await
            .map_err(|e| MatrikelError::Storage(format!("{}: {e}", local.display())))?
            .len();
        let body = ByteStream::from_path(local).await.map_err(|e| {
            MatrikelError::Storage(format!("Failed to open {}: {e}", local.display()))
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(size as i64)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                MatrikelError::Storage(format!("Failed to upload s3://{}/{key}: {e}", self.bucket))
            })?;

        tracing::info!(key = %key, bytes = size, storage = %self.describe(), "Uploaded object");
        Ok(size)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| {
                    MatrikelError::Storage(format!(
                        "Failed to list s3://{}/{prefix}: {e}",
                        self.bucket
                    ))
                })?;

            for object in response.contents() {
                let Some(key) = object.key() else { continue };
                let last_modified = object
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
                objects.push(StoredObject {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified,
                });
            }

            match (response.is_truncated(), response.next_continuation_token()) {
                (Some(true), Some(token)) => continuation = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(objects)
    }
}
