//! Integration tests for logging functionality

use matrikel::config::LoggingConfig;
use matrikel::logging::init_logging;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(config.local_enabled);
    assert_eq!(config.local_rotation, "daily");
}

#[test]
fn test_invalid_log_level_is_rejected() {
    let config = LoggingConfig {
        local_enabled: false,
        ..LoggingConfig::default()
    };
    assert!(init_logging("loud", &config).is_err());
}

// The global subscriber can be installed once per process, so this is the
// only test in this file that succeeds in initializing it.
#[test]
fn test_file_sink_creates_directory_and_accepts_macros() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "never".to_string(),
    };
    assert!(!log_path.exists());

    let guard = init_logging("debug", &config).unwrap();
    assert!(log_path.exists());

    matrikel::log_stage_start!("extract");
    matrikel::log_stage_complete!("extract", Duration::from_millis(12));
    matrikel::log_retry_attempt!(2, 5, "temporary failure in name resolution");
    drop(guard);

    let written: Vec<_> = std::fs::read_dir(&log_path).unwrap().collect();
    assert!(!written.is_empty());
}
