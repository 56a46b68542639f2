//! Configuration management for Matrikel.
//!
//! # Overview
//!
//! Matrikel uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `MATRIKEL_<SECTION>_<KEY>` environment overrides
//! - Default values for every setting
//! - Validation on load
//!
//! Credentials for the SFTP source are never part of the file. The file names
//! the secrets, and the configured secret store supplies them at run time.
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//! dataset = "ownership"
//!
//! [source]
//! remote_dir = "/outgoing"
//! file_suffix = ".zip"
//!
//! [batch]
//! batch_size = 100000
//! work_dir = "/mnt/scratch/matrikel"
//!
//! [storage]
//! backend = "s3"
//!
//! [storage.s3]
//! bucket = "landdata"
//! endpoint = "https://storage.googleapis.com"
//! access_key = "${MATRIKEL_S3_ACCESS_KEY}"
//! secret_key = "${MATRIKEL_S3_SECRET_KEY}"
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use matrikel::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("matrikel.toml")?;
//! println!("Dataset: {}", config.application.dataset);
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_str};
pub use schema::{
    ApplicationConfig, ArchiveConfig, BatchConfig, DecommissionTarget, LifecycleConfig,
    LoggingConfig, MatrikelConfig, ReaderConfig, RetryConfig, S3Config, SecretBackend,
    SecretsConfig, SourceConfig, StorageBackend, StorageConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
