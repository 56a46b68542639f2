//! Configuration schema types
//!
//! This module defines the configuration structure for Matrikel.

use crate::anonymization::config::PrivacyConfig;
use crate::config::SecretString;
use serde::{Deserialize, Serialize};

/// Main Matrikel configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrikelConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Remote SFTP source
    #[serde(default)]
    pub source: SourceConfig,

    /// Archive payload selection
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Streaming reader settings
    #[serde(default)]
    pub reader: ReaderConfig,

    /// Privacy transformation settings
    #[serde(default)]
    pub privacy: PrivacyConfig,

    /// Batch writer settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Durable storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Secret store settings
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Terminal policy (decommission / retain)
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MatrikelConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.source.validate()?;
        self.archive.validate()?;
        self.reader.validate()?;
        self.privacy
            .validate()
            .map_err(|e| format!("privacy: {e:#}"))?;
        self.batch.validate()?;
        self.storage.validate()?;
        self.secrets.validate()?;
        self.lifecycle.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

impl Default for MatrikelConfig {
    fn default() -> Self {
        Self {
            application: ApplicationConfig::default(),
            source: SourceConfig::default(),
            archive: ArchiveConfig::default(),
            reader: ReaderConfig::default(),
            privacy: PrivacyConfig::default(),
            batch: BatchConfig::default(),
            storage: StorageConfig::default(),
            secrets: SecretsConfig::default(),
            lifecycle: LifecycleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dataset name used in storage keys
    #[serde(default = "default_dataset")]
    pub dataset: String,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.dataset.is_empty() || self.dataset.contains('/') {
            return Err(format!(
                "application.dataset must be a non-empty name without '/', got '{}'",
                self.dataset
            ));
        }

        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dataset: default_dataset(),
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Delay before the second attempt in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier (1.0 = fixed delay)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 || self.max_attempts > 50 {
            return Err(format!(
                "retry.max_attempts must be between 1 and 50, got {}",
                self.max_attempts
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(format!(
                "retry.backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err("retry.max_delay_ms must be >= retry.initial_delay_ms".to_string());
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Remote SFTP source configuration
///
/// Host, username and private key are never stored here; only the names under
/// which the secret store holds them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Secret name holding the SFTP host name
    #[serde(default = "default_host_secret")]
    pub host_secret: String,

    /// Secret name holding the SFTP username
    #[serde(default = "default_username_secret")]
    pub username_secret: String,

    /// Secret name holding the private key (PEM/OpenSSH)
    #[serde(default = "default_private_key_secret")]
    pub private_key_secret: String,

    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Remote directory to list
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,

    /// Suffix a remote entry must end with to be considered
    #[serde(default = "default_file_suffix")]
    pub file_suffix: String,

    /// Connect/handshake timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Name resolution retry policy
    #[serde(default)]
    pub retry: RetryConfig,
}

impl SourceConfig {
    fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("source.host_secret", &self.host_secret),
            ("source.username_secret", &self.username_secret),
            ("source.private_key_secret", &self.private_key_secret),
            ("source.file_suffix", &self.file_suffix),
        ] {
            if value.is_empty() {
                return Err(format!("{name} cannot be empty"));
            }
        }

        if self.port == 0 {
            return Err("source.port cannot be 0".to_string());
        }

        if self.timeout_seconds == 0 {
            return Err("source.timeout_seconds must be greater than 0".to_string());
        }

        self.retry.validate()
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            host_secret: default_host_secret(),
            username_secret: default_username_secret(),
            private_key_secret: default_private_key_secret(),
            port: default_port(),
            remote_dir: default_remote_dir(),
            file_suffix: default_file_suffix(),
            timeout_seconds: default_timeout_seconds(),
            retry: RetryConfig::default(),
        }
    }
}

/// Archive payload selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Suffix of the payload document inside the archive
    #[serde(default = "default_payload_suffix")]
    pub payload_suffix: String,

    /// Suffix of metadata sidecar files to exclude
    #[serde(default = "default_sidecar_suffix")]
    pub sidecar_suffix: String,
}

impl ArchiveConfig {
    fn validate(&self) -> Result<(), String> {
        if self.payload_suffix.is_empty() {
            return Err("archive.payload_suffix cannot be empty".to_string());
        }
        if self.payload_suffix == self.sidecar_suffix {
            return Err(
                "archive.payload_suffix and archive.sidecar_suffix must differ".to_string(),
            );
        }
        Ok(())
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            payload_suffix: default_payload_suffix(),
            sidecar_suffix: default_sidecar_suffix(),
        }
    }
}

/// Streaming reader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Log progress every N records
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Upper bound on the raw size of a single feature in bytes
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,
}

impl ReaderConfig {
    fn validate(&self) -> Result<(), String> {
        if self.progress_interval == 0 {
            return Err("reader.progress_interval must be greater than 0".to_string());
        }
        if self.max_record_bytes < 1024 {
            return Err(format!(
                "reader.max_record_bytes must be at least 1024, got {}",
                self.max_record_bytes
            ));
        }
        Ok(())
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            progress_interval: default_progress_interval(),
            max_record_bytes: default_max_record_bytes(),
        }
    }
}

/// Batch writer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Records per batch file
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Local working directory for downloads, batches and the merged artifact
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    /// Separator used when flattening nested property names into columns
    #[serde(default = "default_column_separator")]
    pub column_separator: String,
}

impl BatchConfig {
    fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 || self.batch_size > 5_000_000 {
            return Err(format!(
                "batch.batch_size must be between 1 and 5000000, got {}",
                self.batch_size
            ));
        }
        if self.work_dir.is_empty() {
            return Err("batch.work_dir cannot be empty".to_string());
        }
        if self.column_separator.is_empty() {
            return Err("batch.column_separator cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            work_dir: default_work_dir(),
            column_separator: default_column_separator(),
        }
    }
}

/// Durable storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local directory (tests, single-host deployments)
    #[default]
    Local,
    /// S3-compatible bucket
    S3,
}

/// Durable storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend type
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the local backend
    #[serde(default = "default_local_root")]
    pub local_root: String,

    /// S3 settings (required if backend = "s3")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,

    /// Key prefix for raw archives
    #[serde(default = "default_bronze_prefix")]
    pub bronze_prefix: String,

    /// Key prefix for transformed artifacts
    #[serde(default = "default_silver_prefix")]
    pub silver_prefix: String,

    /// Upload a backup copy of the original archive
    #[serde(default = "default_true")]
    pub backup_archive: bool,

    /// Clock skew tolerated when checking artifact freshness, in seconds
    #[serde(default = "default_validation_tolerance_secs")]
    pub validation_tolerance_secs: u64,
}

impl StorageConfig {
    fn validate(&self) -> Result<(), String> {
        match self.backend {
            StorageBackend::Local => {
                if self.local_root.is_empty() {
                    return Err("storage.local_root cannot be empty for the local backend".to_string());
                }
            }
            StorageBackend::S3 => match &self.s3 {
                Some(s3) => s3.validate()?,
                None => {
                    return Err(
                        "storage.s3 configuration is required when backend = 's3'".to_string()
                    )
                }
            },
        }

        if self.bronze_prefix.is_empty() || self.silver_prefix.is_empty() {
            return Err("storage prefixes cannot be empty".to_string());
        }
        if self.bronze_prefix == self.silver_prefix {
            return Err("storage.bronze_prefix and storage.silver_prefix must differ".to_string());
        }

        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            local_root: default_local_root(),
            s3: None,
            bronze_prefix: default_bronze_prefix(),
            silver_prefix: default_silver_prefix(),
            backup_archive: true,
            validation_tolerance_secs: default_validation_tolerance_secs(),
        }
    }
}

/// S3-compatible bucket configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Bucket name
    pub bucket: String,

    /// Region
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint (MinIO, GCS interoperability)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Access key ID
    pub access_key: SecretString,

    /// Secret access key
    pub secret_key: SecretString,

    /// Use path-style addressing
    #[serde(default)]
    pub path_style: bool,
}

impl S3Config {
    fn validate(&self) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if self.bucket.is_empty() {
            return Err("storage.s3.bucket cannot be empty".to_string());
        }
        if self.access_key.expose_secret().is_empty() || self.secret_key.expose_secret().is_empty()
        {
            return Err("storage.s3 credentials cannot be empty".to_string());
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err("storage.s3.endpoint must start with http:// or https://".to_string());
            }
        }
        Ok(())
    }
}

/// Secret store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecretBackend {
    /// Environment variables
    #[default]
    Env,
    /// One file per secret in a directory (mounted secrets)
    Directory,
}

/// Secret store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Backend type
    #[serde(default)]
    pub backend: SecretBackend,

    /// Prefix for environment variable names
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,

    /// Directory for the directory backend
    #[serde(default = "default_secrets_directory")]
    pub directory: String,
}

impl SecretsConfig {
    fn validate(&self) -> Result<(), String> {
        if self.backend == SecretBackend::Directory && self.directory.is_empty() {
            return Err("secrets.directory cannot be empty for the directory backend".to_string());
        }
        Ok(())
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            backend: SecretBackend::default(),
            env_prefix: default_env_prefix(),
            directory: default_secrets_directory(),
        }
    }
}

/// Decommission backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecommissionTarget {
    /// Log only
    #[default]
    None,
    /// Delete the Compute Engine instance this process runs on
    Gce,
}

/// Terminal policy configuration
///
/// A failed run never decommissions its instance, so an operator can attach
/// and inspect the working directory and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Decommission the instance after a completed run
    #[serde(default = "default_true")]
    pub decommission_on_success: bool,

    /// Grace period before decommission, in seconds
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Decommission backend
    #[serde(default)]
    pub decommissioner: DecommissionTarget,

    /// Metadata server base URL (gce backend)
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,

    /// Compute API base URL (gce backend)
    #[serde(default = "default_compute_api_url")]
    pub compute_api_url: String,
}

impl LifecycleConfig {
    fn validate(&self) -> Result<(), String> {
        if self.grace_period_secs > 86_400 {
            return Err(format!(
                "lifecycle.grace_period_secs must be <= 86400, got {}",
                self.grace_period_secs
            ));
        }
        if self.decommissioner == DecommissionTarget::Gce {
            for (name, url) in [
                ("lifecycle.metadata_url", &self.metadata_url),
                ("lifecycle.compute_api_url", &self.compute_api_url),
            ] {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(format!("{name} must start with http:// or https://"));
                }
            }
        }
        Ok(())
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            decommission_on_success: true,
            grace_period_secs: default_grace_period_secs(),
            decommissioner: DecommissionTarget::default(),
            metadata_url: default_metadata_url(),
            compute_api_url: default_compute_api_url(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable the JSON file sink
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Directory for log files
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Rotation (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.is_empty() {
            return Err("logging.local_path cannot be empty when local_enabled".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_dataset() -> String {
    "ownership".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> usize {
    5
}

fn default_initial_delay_ms() -> u64 {
    10_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_host_secret() -> String {
    "sftp-host".to_string()
}

fn default_username_secret() -> String {
    "sftp-username".to_string()
}

fn default_private_key_secret() -> String {
    "sftp-private-key".to_string()
}

fn default_port() -> u16 {
    22
}

fn default_remote_dir() -> String {
    ".".to_string()
}

fn default_file_suffix() -> String {
    ".zip".to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_payload_suffix() -> String {
    ".json".to_string()
}

fn default_sidecar_suffix() -> String {
    "_metadata.json".to_string()
}

fn default_progress_interval() -> u64 {
    50_000
}

fn default_max_record_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_batch_size() -> usize {
    100_000
}

fn default_work_dir() -> String {
    "/tmp/matrikel".to_string()
}

fn default_column_separator() -> String {
    ".".to_string()
}

fn default_local_root() -> String {
    "./storage".to_string()
}

fn default_bronze_prefix() -> String {
    "bronze".to_string()
}

fn default_silver_prefix() -> String {
    "silver".to_string()
}

fn default_validation_tolerance_secs() -> u64 {
    300
}

fn default_region() -> String {
    "auto".to_string()
}

fn default_env_prefix() -> String {
    "MATRIKEL_SECRET_".to_string()
}

fn default_secrets_directory() -> String {
    "/run/secrets".to_string()
}

fn default_grace_period_secs() -> u64 {
    300
}

fn default_metadata_url() -> String {
    "http://metadata.google.internal/computeMetadata/v1".to_string()
}

fn default_compute_api_url() -> String {
    "https://compute.googleapis.com/compute/v1".to_string()
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
