//! Privacy transformation configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifetime of the pseudonym registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistryMode {
    /// Run-scoped; a person seen in a later run gets a different surrogate
    #[default]
    Ephemeral,
    /// Loaded at run start and saved at run end, keyed by salted hash
    Persisted,
}

/// Privacy transformation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyConfig {
    /// Path of the person sub-record inside the feature properties.
    /// Segments fan out over sequences, so every owner in a list is handled.
    #[serde(default = "default_person_path")]
    pub person_path: Vec<String>,

    /// Registry lifetime
    #[serde(default)]
    pub registry: RegistryMode,

    /// Registry file (persisted mode only)
    #[serde(default)]
    pub registry_path: Option<PathBuf>,

    /// Secret name of the salt used to hash identifiers (persisted mode only)
    #[serde(default = "default_registry_salt_secret")]
    pub registry_salt_secret: String,

    /// Field names inside the person sub-record
    #[serde(default)]
    pub fields: PrivacyFields,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            person_path: default_person_path(),
            registry: RegistryMode::default(),
            registry_path: None,
            registry_salt_secret: default_registry_salt_secret(),
            fields: PrivacyFields::default(),
        }
    }
}

impl PrivacyConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.person_path.is_empty() || self.person_path.iter().any(|s| s.is_empty()) {
            anyhow::bail!("person_path must contain at least one non-empty segment");
        }

        if self.registry == RegistryMode::Persisted {
            if self.registry_path.is_none() {
                anyhow::bail!("registry_path is required when registry = \"persisted\"");
            }
            if self.registry_salt_secret.is_empty() {
                anyhow::bail!("registry_salt_secret is required when registry = \"persisted\"");
            }
        }

        self.fields.validate().context("Invalid privacy field names")?;

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("MATRIKEL_PRIVACY_REGISTRY") {
            self.registry = match val.to_lowercase().as_str() {
                "ephemeral" => RegistryMode::Ephemeral,
                "persisted" => RegistryMode::Persisted,
                _ => anyhow::bail!("Invalid MATRIKEL_PRIVACY_REGISTRY: {}", val),
            };
        }

        if let Ok(val) = std::env::var("MATRIKEL_PRIVACY_REGISTRY_PATH") {
            self.registry_path = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("MATRIKEL_PRIVACY_PERSON_PATH") {
            self.person_path = val.split('.').map(str::to_string).collect();
        }

        Ok(())
    }
}

/// Field names the privacy rules act on
///
/// Defaults follow the Danish ownership register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyFields {
    /// Gender, removed
    #[serde(default = "default_gender")]
    pub gender: String,

    /// Personal identifier, replaced by a surrogate
    #[serde(default = "default_identifier")]
    pub identifier: String,

    /// Residential address blocks, removed with everything nested in them
    #[serde(default = "default_address_blocks")]
    pub address_blocks: Vec<String>,

    /// Foreign-address indicators, folded into `lives_abroad` then removed
    #[serde(default = "default_foreign_address")]
    pub foreign_address: Vec<String>,

    /// Birth date and its uncertainty marker, removed
    #[serde(default = "default_birth_date")]
    pub birth_date: Vec<String>,

    /// Name of the derived boolean
    #[serde(default = "default_lives_abroad")]
    pub lives_abroad: String,
}

impl Default for PrivacyFields {
    fn default() -> Self {
        Self {
            gender: default_gender(),
            identifier: default_identifier(),
            address_blocks: default_address_blocks(),
            foreign_address: default_foreign_address(),
            birth_date: default_birth_date(),
            lives_abroad: default_lives_abroad(),
        }
    }
}

impl PrivacyFields {
    fn validate(&self) -> Result<()> {
        if self.identifier.is_empty() || self.lives_abroad.is_empty() {
            anyhow::bail!("identifier and lives_abroad cannot be empty");
        }

        let removed = std::iter::once(&self.gender)
            .chain(&self.address_blocks)
            .chain(&self.foreign_address)
            .chain(&self.birth_date);
        for name in removed {
            if name == &self.identifier || name == &self.lives_abroad {
                anyhow::bail!("field '{}' cannot be both removed and kept", name);
            }
        }

        Ok(())
    }
}

fn default_person_path() -> Vec<String> {
    vec!["ejendePerson".to_string()]
}

fn default_registry_salt_secret() -> String {
    "pseudonym-salt".to_string()
}

fn default_gender() -> String {
    "koen".to_string()
}

fn default_identifier() -> String {
    "id".to_string()
}

fn default_address_blocks() -> Vec<String> {
    vec![
        "bopaelsadresse".to_string(),
        "standardadresse".to_string(),
        "adresseoplysninger".to_string(),
    ]
}

fn default_foreign_address() -> Vec<String> {
    vec!["udlandsadresse".to_string(), "udrejseIndrejse".to_string()]
}

fn default_birth_date() -> Vec<String> {
    vec![
        "foedselsdato".to_string(),
        "foedselsdatoUsikkerhedsmarkering".to_string(),
    ]
}

fn default_lives_abroad() -> String {
    "lives_abroad".to_string()
}
