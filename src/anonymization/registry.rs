//! Pseudonym registry
//!
//! Maps a source personal identifier to a random surrogate. The registry is an
//! explicit value owned by the record loop and passed into the transformer by
//! `&mut`; it grows monotonically and never shrinks.
//!
//! In persisted mode the registry is keyed by the SHA-256 of a salt plus the
//! identifier, so the file on disk never contains a raw identifier.

use crate::config::SecretString;
use crate::domain::{MatrikelError, Result};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

const REGISTRY_FORMAT_VERSION: u32 = 1;

/// On-disk registry document
#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    version: u32,
    entries: HashMap<String, String>,
}

/// Source identifier to surrogate mapping
#[derive(Debug, Default)]
pub struct PseudonymRegistry {
    entries: HashMap<String, String>,
    salt: Option<SecretString>,
    created: usize,
}

impl PseudonymRegistry {
    /// Create an empty run-scoped registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry whose keys are salted hashes
    pub fn with_salt(salt: SecretString) -> Self {
        Self {
            entries: HashMap::new(),
            salt: Some(salt),
            created: 0,
        }
    }

    /// Load a persisted registry, or start an empty one if the file does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or was
    /// written by an incompatible version.
    pub fn load(path: &Path, salt: SecretString) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No persisted registry found, starting empty");
            return Ok(Self::with_salt(salt));
        }

        let contents = std::fs::read_to_string(path)?;
        let file: RegistryFile = serde_json::from_str(&contents)?;
        if file.version != REGISTRY_FORMAT_VERSION {
            return Err(MatrikelError::State(format!(
                "Unsupported registry format version {} in {}",
                file.version,
                path.display()
            )));
        }

        tracing::info!(
            path = %path.display(),
            identities = file.entries.len(),
            "Loaded persisted pseudonym registry"
        );

        Ok(Self {
            entries: file.entries,
            salt: Some(salt),
            created: 0,
        })
    }

    /// Write the registry to disk
    ///
    /// The file is written next to `path` and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns `MatrikelError::State` for an unsalted registry; raw identifiers
    /// are never written out.
    pub fn save(&self, path: &Path) -> Result<()> {
        if self.salt.is_none() {
            return Err(MatrikelError::State(
                "Refusing to persist an unsalted pseudonym registry".to_string(),
            ));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = RegistryFile {
            version: REGISTRY_FORMAT_VERSION,
            entries: self.entries.clone(),
        };
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(&file)?)?;
        std::fs::rename(&tmp, path)?;

        tracing::info!(
            path = %path.display(),
            identities = self.entries.len(),
            "Saved pseudonym registry"
        );
        Ok(())
    }

    /// Surrogate for `identifier`, created on first use
    pub fn surrogate(&mut self, identifier: &str) -> String {
        let key = self.key_for(identifier);
        let created = &mut self.created;
        self.entries
            .entry(key)
            .or_insert_with(|| {
                *created += 1;
                Uuid::new_v4().to_string()
            })
            .clone()
    }

    /// Number of distinct identities held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Surrogates created during this run
    pub fn created(&self) -> usize {
        self.created
    }

    fn key_for(&self, identifier: &str) -> String {
        match &self.salt {
            Some(salt) => {
                let mut hasher = Sha256::new();
                hasher.update(salt.expose_secret().as_ref().as_bytes());
                hasher.update(identifier.as_bytes());
                format!("{:x}", hasher.finalize())
            }
            None => identifier.to_string(),
        }
    }
}
