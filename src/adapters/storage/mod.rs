//! Durable storage for the archive backup and the merged artifact
//!
//! Objects are addressed by slash-separated keys. [`StorageLayout`] builds the
//! keys for the bronze (raw archive) and silver (anonymized artifact) tiers.

pub mod local;
pub mod s3;

use crate::config::{StorageBackend, StorageConfig};
use crate::domain::{MatrikelError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::Path;
use std::sync::Arc;

pub use local::LocalStorage;
pub use s3::S3Storage;

/// An object as reported by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Upload and list capability of a storage backend
#[async_trait]
pub trait DurableStorage: Send + Sync {
    /// Human-readable location, for logs
    fn describe(&self) -> String;

    /// Upload the file at `local` under `key`, returning the uploaded size
    ///
    /// # Errors
    ///
    /// Returns `MatrikelError::Storage` if the upload fails.
    async fn upload(&self, local: &Path, key: &str) -> Result<u64>;

    /// List every object whose key starts with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>>;
}

/// Create the storage backend selected by configuration
pub async fn create_storage(config: &StorageConfig) -> Result<Arc<dyn DurableStorage>> {
    match config.backend {
        StorageBackend::Local => {
            tracing::info!(root = %config.local_root, "Using local storage");
            Ok(Arc::new(LocalStorage::new(&config.local_root)))
        }
        StorageBackend::S3 => {
            let s3 = config.s3.as_ref().ok_or_else(|| {
                MatrikelError::Configuration("storage.s3 is required for the s3 backend".to_string())
            })?;
            tracing::info!(bucket = %s3.bucket, "Using S3 storage");
            Ok(Arc::new(S3Storage::new(s3)))
        }
    }
}

/// Key layout of the bronze and silver tiers
#[derive(Debug, Clone)]
pub struct StorageLayout {
    bronze_prefix: String,
    silver_prefix: String,
    dataset: String,
}

impl StorageLayout {
    pub fn new(config: &StorageConfig, dataset: &str) -> Self {
        Self {
            bronze_prefix: config.bronze_prefix.trim_matches('/').to_string(),
            silver_prefix: config.silver_prefix.trim_matches('/').to_string(),
            dataset: dataset.to_string(),
        }
    }

    /// `<bronze>/<dataset>/<YYYY-MM-DD>/<archive_name>`
    pub fn archive_key(&self, date: NaiveDate, archive_name: &str) -> String {
        join_key(&[
            &self.bronze_prefix,
            &self.dataset,
            &date.format("%Y-%m-%d").to_string(),
            archive_name,
        ])
    }

    /// `<silver>/<dataset>/<YYYY-MM-DD>.parquet`
    pub fn artifact_key(&self, date: NaiveDate) -> String {
        join_key(&[
            &self.silver_prefix,
            &self.dataset,
            &format!("{}.parquet", date.format("%Y-%m-%d")),
        ])
    }
}

fn join_key(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}

/// Reject keys that could escape a storage root
pub(crate) fn check_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(MatrikelError::Storage(format!("invalid object key '{key}'")));
    }
    Ok(())
}
