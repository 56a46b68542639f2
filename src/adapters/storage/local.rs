//! Local directory storage

use super::{check_key, DurableStorage, StoredObject};
use crate::domain::{MatrikelError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Stores objects as files below a root directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        key.split('/').fold(self.root.clone(), |path, part| path.join(part))
    }
}

#[async_trait]
impl DurableStorage for LocalStorage {
    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }

    async fn upload(&self, local: &Path, key: &str) -> Result<u64> {
        check_key(key)?;
        let dest = self.path_for(key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MatrikelError::Storage(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let staging = dest.with_extension("partial");
        let bytes = match tokio::fs::copy(local, &staging).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&staging).await;
                return Err(MatrikelError::Storage(format!(
                    "Failed to copy {} to {}: {e}",
                    local.display(),
                    dest.display()
                )));
            }
        };
        tokio::fs::rename(&staging, &dest).await.map_err(|e| {
            MatrikelError::Storage(format!("Failed to finalize {}: {e}", dest.display()))
        })?;

        tracing::info!(key = %key, bytes, storage = %self.describe(), "Uploaded object");
        Ok(bytes)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        let root = self.root.clone();
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || {
            let mut objects = Vec::new();
            if root.exists() {
                walk(&root, &root, &prefix, &mut objects)?;
            }
            objects.sort_by(|a, b| a.key.cmp(&b.key));
            Ok(objects)
        })
        .await
        .map_err(|e| MatrikelError::Storage(format!("listing task failed: {e}")))?
    }
}

fn walk(root: &Path, dir: &Path, prefix: &str, out: &mut Vec<StoredObject>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| MatrikelError::Storage(format!("Failed to list {}: {e}", dir.display())))?;

    for entry in entries {
        let entry = entry.map_err(|e| MatrikelError::Storage(e.to_string()))?;
        let path = entry.path();
        let metadata = entry
            .metadata()
            .map_err(|e| MatrikelError::Storage(format!("{}: {e}", path.display())))?;

        if metadata.is_dir() {
            walk(root, &path, prefix, out)?;
            continue;
        }

        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !key.starts_with(prefix) || key.ends_with(".partial") {
            continue;
        }

        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .map_err(|e| MatrikelError::Storage(format!("{}: {e}", path.display())))?;
        out.push(StoredObject {
            key,
            size: metadata.len(),
            last_modified,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_and_list() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("artifact.parquet");
        std::fs::write(&source, b"PAR1....PAR1").unwrap();

        let storage = LocalStorage::new(dir.path().join("store"));
        let before = Utc::now() - chrono::Duration::seconds(5);
        let bytes = storage
            .upload(&source, "silver/ownership/2025-03-07.parquet")
            .await
            .unwrap();
        assert_eq!(bytes, 12);

        let listed = storage.list("silver/ownership/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "silver/ownership/2025-03-07.parquet");
        assert_eq!(listed[0].size, 12);
        assert!(listed[0].last_modified >= before);

        assert!(storage.list("bronze/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let storage = LocalStorage::new("/nonexistent/matrikel/store");
        assert!(storage.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_missing_source() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        let err = storage
            .upload(&dir.path().join("absent"), "silver/x.parquet")
            .await
            .unwrap_err();
        assert!(matches!(err, MatrikelError::Storage(_)));
    }

    #[tokio::test]
    async fn test_rejects_escaping_key() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("f");
        std::fs::write(&source, b"x").unwrap();
        let storage = LocalStorage::new(dir.path().join("store"));
        assert!(storage.upload(&source, "../outside").await.is_err());
    }
}
