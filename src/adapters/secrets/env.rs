//! Environment-variable secret store

use super::SecretStore;
use crate::config::{secret_string, SecretString};
use crate::domain::{AcquisitionError, Result};
use async_trait::async_trait;

/// Reads secret `name` from `<prefix><NAME>`
///
/// The name is upper-cased and `-`/`.` become `_`, so `sftp-host` with the
/// default prefix is read from `MATRIKEL_SECRET_SFTP_HOST`.
#[derive(Debug, Clone)]
pub struct EnvSecretStore {
    prefix: String,
}

impl EnvSecretStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn variable_for(&self, name: &str) -> String {
        let normalized: String = name
            .chars()
            .map(|c| match c {
                '-' | '.' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        format!("{}{}", self.prefix, normalized)
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret(&self, name: &str) -> Result<SecretString> {
        let variable = self.variable_for(name);
        match std::env::var(&variable) {
            Ok(value) if !value.is_empty() => Ok(secret_string(value)),
            Ok(_) | Err(std::env::VarError::NotPresent) => {
                Err(AcquisitionError::SecretNotFound(name.to_string()).into())
            }
            Err(std::env::VarError::NotUnicode(_)) => Err(
                AcquisitionError::SecretStoreUnavailable(format!("{variable} is not valid UTF-8"))
                    .into(),
            ),
        }
    }
}
