//! Secret store capability
//!
//! Credentials for the remote source are fetched by name before any network
//! activity. Two backends exist: process environment and a directory of files
//! (the layout of mounted container secrets).

pub mod directory;
pub mod env;

use crate::config::{SecretBackend, SecretString, SecretsConfig};
use crate::domain::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub use directory::DirectorySecretStore;
pub use env::EnvSecretStore;

/// Named secret lookup
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a secret by name
    ///
    /// # Errors
    ///
    /// Returns `AcquisitionError::SecretNotFound` if the secret is absent and
    /// `AcquisitionError::SecretStoreUnavailable` if the store cannot be read.
    async fn get_secret(&self, name: &str) -> Result<SecretString>;
}

/// Create the secret store selected by configuration
pub fn create_secret_store(config: &SecretsConfig) -> Arc<dyn SecretStore> {
    match config.backend {
        SecretBackend::Env => {
            tracing::debug!(prefix = %config.env_prefix, "Using environment secret store");
            Arc::new(EnvSecretStore::new(config.env_prefix.clone()))
        }
        SecretBackend::Directory => {
            tracing::debug!(directory = %config.directory, "Using directory secret store");
            Arc::new(DirectorySecretStore::new(&config.directory))
        }
    }
}
