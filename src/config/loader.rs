//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{MatrikelConfig, SecretBackend, StorageBackend};
use crate::domain::errors::MatrikelError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into MatrikelConfig
/// 4. Applies environment variable overrides (MATRIKEL_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns `MatrikelError::Configuration` if the file is missing or unreadable,
/// a referenced variable is unset, parsing fails, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use matrikel::config::loader::load_config;
///
/// let config = load_config("matrikel.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<MatrikelConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MatrikelError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        MatrikelError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_str(&contents)
}

/// Loads configuration from TOML text
///
/// Same pipeline as [`load_config`] minus the file read.
pub fn load_config_str(contents: &str) -> Result<MatrikelConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: MatrikelConfig = toml::from_str(&contents)
        .map_err(|e| MatrikelError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        MatrikelError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left alone.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| MatrikelError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(MatrikelError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env(name) {
        Some(val) => val.parse().map(Some).map_err(|_| {
            MatrikelError::Configuration(format!("Invalid value '{val}' for {name}"))
        }),
        None => Ok(None),
    }
}

/// Applies environment variable overrides using MATRIKEL_* prefix
///
/// Environment variables follow the pattern: MATRIKEL_<SECTION>_<KEY>
/// For example: MATRIKEL_BATCH_BATCH_SIZE, MATRIKEL_SOURCE_REMOTE_DIR
fn apply_env_overrides(config: &mut MatrikelConfig) -> Result<()> {
    // Application overrides
    if let Some(val) = env("MATRIKEL_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = env("MATRIKEL_APPLICATION_DATASET") {
        config.application.dataset = val;
    }

    // Source overrides
    if let Some(val) = env("MATRIKEL_SOURCE_REMOTE_DIR") {
        config.source.remote_dir = val;
    }
    if let Some(val) = env("MATRIKEL_SOURCE_FILE_SUFFIX") {
        config.source.file_suffix = val;
    }
    if let Some(port) = env_parse("MATRIKEL_SOURCE_PORT")? {
        config.source.port = port;
    }
    if let Some(attempts) = env_parse("MATRIKEL_SOURCE_RETRY_MAX_ATTEMPTS")? {
        config.source.retry.max_attempts = attempts;
    }
    if let Some(delay) = env_parse("MATRIKEL_SOURCE_RETRY_INITIAL_DELAY_MS")? {
        config.source.retry.initial_delay_ms = delay;
    }

    // Batch overrides
    if let Some(size) = env_parse("MATRIKEL_BATCH_BATCH_SIZE")? {
        config.batch.batch_size = size;
    }
    if let Some(val) = env("MATRIKEL_BATCH_WORK_DIR") {
        config.batch.work_dir = val;
    }

    // Storage overrides
    if let Some(val) = env("MATRIKEL_STORAGE_BACKEND") {
        config.storage.backend = match val.to_lowercase().as_str() {
            "local" => StorageBackend::Local,
            "s3" => StorageBackend::S3,
            other => {
                return Err(MatrikelError::Configuration(format!(
                    "Invalid MATRIKEL_STORAGE_BACKEND '{other}'. Must be one of: local, s3"
                )))
            }
        };
    }
    if let Some(val) = env("MATRIKEL_STORAGE_LOCAL_ROOT") {
        config.storage.local_root = val;
    }
    if let Some(backup) = env_parse("MATRIKEL_STORAGE_BACKUP_ARCHIVE")? {
        config.storage.backup_archive = backup;
    }
    if let Some(ref mut s3) = config.storage.s3 {
        if let Some(val) = env("MATRIKEL_STORAGE_S3_BUCKET") {
            s3.bucket = val;
        }
        if let Some(val) = env("MATRIKEL_STORAGE_S3_ENDPOINT") {
            s3.endpoint = Some(val);
        }
    }

    // Secrets overrides
    if let Some(val) = env("MATRIKEL_SECRETS_BACKEND") {
        config.secrets.backend = match val.to_lowercase().as_str() {
            "env" => SecretBackend::Env,
            "directory" => SecretBackend::Directory,
            other => {
                return Err(MatrikelError::Configuration(format!(
                    "Invalid MATRIKEL_SECRETS_BACKEND '{other}'. Must be one of: env, directory"
                )))
            }
        };
    }
    if let Some(val) = env("MATRIKEL_SECRETS_DIRECTORY") {
        config.secrets.directory = val;
    }

    // Lifecycle overrides
    if let Some(enabled) = env_parse("MATRIKEL_LIFECYCLE_DECOMMISSION_ON_SUCCESS")? {
        config.lifecycle.decommission_on_success = enabled;
    }
    if let Some(secs) = env_parse("MATRIKEL_LIFECYCLE_GRACE_PERIOD_SECS")? {
        config.lifecycle.grace_period_secs = secs;
    }

    // Logging overrides
    if let Some(enabled) = env_parse("MATRIKEL_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = enabled;
    }
    if let Some(val) = env("MATRIKEL_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    // Privacy overrides
    config
        .privacy
        .apply_env_overrides()
        .map_err(|e| MatrikelError::Configuration(format!("{e:#}")))?;

    Ok(())
}
