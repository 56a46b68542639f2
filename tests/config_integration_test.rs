//! Integration tests for configuration loading and validation
//!
//! Note: Tests that modify environment variables should be run with --test-threads=1
//! to avoid interference between tests.

use matrikel::anonymization::RegistryMode;
use matrikel::config::{load_config, DecommissionTarget, SecretBackend, StorageBackend};
use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Helper function to clean up environment variables
fn cleanup_env_vars() {
    std::env::remove_var("MATRIKEL_APPLICATION_LOG_LEVEL");
    std::env::remove_var("MATRIKEL_BATCH_BATCH_SIZE");
    std::env::remove_var("MATRIKEL_STORAGE_BACKEND");
    std::env::remove_var("MATRIKEL_SOURCE_RETRY_MAX_ATTEMPTS");
    std::env::remove_var("TEST_S3_ACCESS_KEY");
    std::env::remove_var("TEST_S3_SECRET_KEY");
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    let toml_content = r#"
[application]
log_level = "debug"
dataset = "ejerskab"

[source]
host_secret = "drop-host"
username_secret = "drop-user"
private_key_secret = "drop-key"
port = 2222
remote_dir = "/outgoing"
file_suffix = ".zip"
timeout_seconds = 30

[source.retry]
max_attempts = 3
initial_delay_ms = 500
max_delay_ms = 2000
backoff_multiplier = 2.0

[archive]
payload_suffix = ".json"
sidecar_suffix = "_metadata.json"

[reader]
progress_interval = 1000
max_record_bytes = 1048576

[privacy]
person_path = ["ejendePerson"]
registry = "persisted"
registry_path = "/var/lib/matrikel/registry.json"
registry_salt_secret = "salt"

[batch]
batch_size = 5000
work_dir = "/scratch/matrikel"
column_separator = "__"

[storage]
backend = "local"
local_root = "/data"
bronze_prefix = "raw"
silver_prefix = "clean"
backup_archive = false
validation_tolerance_secs = 60

[secrets]
backend = "directory"
directory = "/run/secrets"

[lifecycle]
decommission_on_success = true
grace_period_secs = 60
decommissioner = "gce"

[logging]
local_enabled = false
local_path = "/tmp/matrikel"
local_rotation = "hourly"
"#;

    let file = write_config(toml_content);
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.application.dataset, "ejerskab");
    assert_eq!(config.source.port, 2222);
    assert_eq!(config.source.remote_dir, "/outgoing");
    assert_eq!(config.source.retry.max_attempts, 3);
    assert_eq!(config.source.retry.backoff_multiplier, 2.0);
    assert_eq!(config.reader.max_record_bytes, 1_048_576);
    assert_eq!(config.privacy.registry, RegistryMode::Persisted);
    assert_eq!(config.batch.batch_size, 5000);
    assert_eq!(config.batch.column_separator, "__");
    assert_eq!(config.storage.backend, StorageBackend::Local);
    assert!(!config.storage.backup_archive);
    assert_eq!(config.secrets.backend, SecretBackend::Directory);
    assert_eq!(config.lifecycle.decommissioner, DecommissionTarget::Gce);
    assert_eq!(config.logging.local_rotation, "hourly");
}

#[test]
fn test_load_minimal_config_with_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    let file = write_config("[application]\ndataset = \"ownership\"\n");
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "info");
    assert_eq!(config.source.port, 22);
    assert_eq!(config.source.file_suffix, ".zip");
    assert_eq!(config.source.retry.max_attempts, 5);
    assert_eq!(config.source.retry.initial_delay_ms, 10_000);
    assert_eq!(config.archive.sidecar_suffix, "_metadata.json");
    assert_eq!(config.privacy.person_path, vec!["ejendePerson".to_string()]);
    assert_eq!(config.privacy.registry, RegistryMode::Ephemeral);
    assert_eq!(config.batch.batch_size, 100_000);
    assert_eq!(config.storage.backend, StorageBackend::Local);
    assert!(config.storage.backup_archive);
    assert_eq!(config.secrets.backend, SecretBackend::Env);
    assert_eq!(config.lifecycle.decommissioner, DecommissionTarget::None);
}

#[test]
fn test_env_var_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("TEST_S3_ACCESS_KEY", "access-123");
    std::env::set_var("TEST_S3_SECRET_KEY", "secret-456");

    let file = write_config(
        r#"
[storage]
backend = "s3"

[storage.s3]
bucket = "landdata"
endpoint = "https://storage.googleapis.com"
access_key = "${TEST_S3_ACCESS_KEY}"
secret_key = "${TEST_S3_SECRET_KEY}"
"#,
    );
    let config = load_config(file.path()).unwrap();
    let s3 = config.storage.s3.unwrap();
    assert_eq!(s3.bucket, "landdata");
    assert_eq!(s3.access_key.expose_secret().as_ref(), "access-123");
    assert_eq!(s3.secret_key.expose_secret().as_ref(), "secret-456");

    cleanup_env_vars();
}

#[test]
fn test_missing_env_var_is_reported() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
[storage.s3]
bucket = "landdata"
access_key = "${TEST_S3_ACCESS_KEY}"
secret_key = "x"
"#,
    );
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("TEST_S3_ACCESS_KEY"));
}

#[test]
fn test_env_var_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("MATRIKEL_APPLICATION_LOG_LEVEL", "trace");
    std::env::set_var("MATRIKEL_BATCH_BATCH_SIZE", "2000");
    std::env::set_var("MATRIKEL_SOURCE_RETRY_MAX_ATTEMPTS", "2");

    let file = write_config("[batch]\nbatch_size = 10\n");
    let config = load_config(file.path()).unwrap();
    assert_eq!(config.application.log_level, "trace");
    assert_eq!(config.batch.batch_size, 2000);
    assert_eq!(config.source.retry.max_attempts, 2);

    cleanup_env_vars();
}

#[test]
fn test_invalid_env_override_value() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("MATRIKEL_STORAGE_BACKEND", "ftp");

    let file = write_config("");
    assert!(load_config(file.path()).is_err());

    cleanup_env_vars();
}

#[test]
fn test_invalid_config_validation() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let cases = [
        "[batch]\nbatch_size = 0\n",
        "[source.retry]\nmax_attempts = 0\n",
        "[storage]\nbackend = \"s3\"\n",
        "[storage]\nbronze_prefix = \"x\"\nsilver_prefix = \"x\"\n",
        "[privacy]\nregistry = \"persisted\"\n",
        "[privacy]\nperson_path = []\n",
        "[logging]\nlocal_rotation = \"size\"\n",
    ];
    for case in cases {
        let file = write_config(case);
        assert!(load_config(file.path()).is_err(), "accepted: {case}");
    }
}

#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/matrikel.toml").unwrap_err();
    assert!(err.to_string().contains("not found"));
}
