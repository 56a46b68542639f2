//! Logging and observability
//!
//! Structured logging with:
//! - JSON-formatted file logs with rotation
//! - Console output
//! - Configurable log levels
//!
//! # Example
//!
//! ```no_run
//! use matrikel::logging::init_logging;
//! use matrikel::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(stage = "download", "Stage started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of a pipeline stage
///
/// # Example
///
/// ```no_run
/// use matrikel::log_stage_start;
///
/// log_stage_start!("extract");
/// ```
#[macro_export]
macro_rules! log_stage_start {
    ($stage:expr) => {
        tracing::info!(stage = $stage, "Stage started");
    };
}

/// Log the completion of a pipeline stage
///
/// # Example
///
/// ```no_run
/// use matrikel::log_stage_complete;
/// use std::time::Duration;
///
/// log_stage_complete!("extract", Duration::from_secs(3));
/// ```
#[macro_export]
macro_rules! log_stage_complete {
    ($stage:expr, $duration:expr) => {
        tracing::info!(
            stage = $stage,
            duration_ms = $duration.as_millis() as u64,
            "Stage completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use matrikel::log_error_with_context;
/// use matrikel::domain::MatrikelError;
///
/// let error = MatrikelError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use matrikel::log_retry_attempt;
///
/// log_retry_attempt!(2, 5, "no such host");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying operation"
        );
    };
}

/// Log a skipped record
///
/// # Example
///
/// ```no_run
/// use matrikel::log_record_skipped;
///
/// log_record_skipped!(17, "expected value at line 1 column 9");
/// ```
#[macro_export]
macro_rules! log_record_skipped {
    ($index:expr, $reason:expr) => {
        tracing::warn!(
            record = $index,
            reason = %$reason,
            "Skipping malformed record"
        );
    };
}
