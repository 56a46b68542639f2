//! Directory-of-files secret store

use super::SecretStore;
use crate::config::{secret_string, SecretString};
use crate::domain::{AcquisitionError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Reads secret `name` from the file `<directory>/<name>`
///
/// A single trailing newline is stripped; everything else is kept verbatim,
/// which matters for PEM-encoded keys.
#[derive(Debug, Clone)]
pub struct DirectorySecretStore {
    directory: PathBuf,
}

impl DirectorySecretStore {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl SecretStore for DirectorySecretStore {
    async fn get_secret(&self, name: &str) -> Result<SecretString> {
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return Err(AcquisitionError::SecretNotFound(name.to_string()).into());
        }

        if !tokio::fs::try_exists(&self.directory).await.unwrap_or(false) {
            return Err(AcquisitionError::SecretStoreUnavailable(format!(
                "secret directory {} does not exist",
                self.directory.display()
            ))
            .into());
        }

        let path = self.directory.join(name);
        let mut value = match tokio::fs::read_to_string(&path).await {
            Ok(value) => value,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AcquisitionError::SecretNotFound(name.to_string()).into())
            }
            Err(e) => {
                return Err(AcquisitionError::SecretStoreUnavailable(format!(
                    "failed to read {}: {e}",
                    path.display()
                ))
                .into())
            }
        };

        if value.ends_with('\n') {
            value.pop();
            if value.ends_with('\r') {
                value.pop();
            }
        }
        if value.is_empty() {
            return Err(AcquisitionError::SecretNotFound(name.to_string()).into());
        }
        Ok(secret_string(value))
    }
}
