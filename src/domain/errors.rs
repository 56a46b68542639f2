//! Domain error types
//!
//! This module defines the error hierarchy for Matrikel. All errors are
//! domain-specific and don't expose third-party types; conversions from
//! library errors flatten them into message strings.

use serde::Serialize;
use thiserror::Error;

/// Main Matrikel error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum MatrikelError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Remote acquisition errors (secrets, resolution, SFTP)
    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// Archive extraction errors
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Structural failure of the source document (not a single bad record)
    #[error("Document error: {0}")]
    Document(String),

    /// A single malformed record
    #[error("Malformed record #{index}: {reason}")]
    Record { index: u64, reason: String },

    /// Columnar (Parquet/Arrow) write or read errors
    #[error("Columnar error: {0}")]
    Columnar(String),

    /// Durable storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Post-upload validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid run state transition
    #[error("State error: {0}")]
    State(String),

    /// Instance decommission errors
    #[error("Decommission error: {0}")]
    Decommission(String),

    /// The run was cancelled by a shutdown signal
    #[error("Run cancelled")]
    Cancelled,

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Remote acquisition errors
///
/// Errors that occur while obtaining credentials or talking to the SFTP host.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// A required secret is absent from the secret store
    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    /// The secret store itself could not be read
    #[error("Secret store unavailable: {0}")]
    SecretStoreUnavailable(String),

    /// Host name could not be resolved after all attempts
    #[error("Failed to resolve {host} after {attempts} attempt(s): {message}")]
    NameResolution {
        host: String,
        attempts: usize,
        message: String,
    },

    /// TCP connection or SSH handshake failed
    #[error("Failed to connect to remote host: {0}")]
    ConnectionFailed(String),

    /// Key-based authentication was rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Remote directory could not be listed
    #[error("Failed to list remote directory: {0}")]
    ListingFailed(String),

    /// No remote entry matched the suffix filter
    #[error("No source file ending in '{suffix}' found in '{directory}'")]
    NoSourceFile { directory: String, suffix: String },

    /// Transfer of the selected file failed
    #[error("Download failed: {0}")]
    DownloadFailed(String),
}

/// Archive extraction errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The container could not be opened or read
    #[error("Unreadable archive {path}: {message}")]
    Unreadable { path: String, message: String },

    /// No entry matched the payload filter
    #[error("No payload ending in '{suffix}' (excluding '{excluded}') in {path}")]
    NoPayload {
        path: String,
        suffix: String,
        excluded: String,
    },
}

/// Failure classification used by the run orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Retried locally before becoming fatal
    Transient,
    /// Aborts the run
    Fatal,
    /// Absorbed by the reader, counted and skipped
    PerRecord,
    /// Upload succeeded but the destination check did not
    Validation,
    /// Shutdown signal
    Cancelled,
}

impl MatrikelError {
    /// Classify the error for failure reporting
    pub fn class(&self) -> ErrorClass {
        match self {
            MatrikelError::Acquisition(AcquisitionError::NameResolution { .. }) => {
                ErrorClass::Transient
            }
            MatrikelError::Record { .. } => ErrorClass::PerRecord,
            MatrikelError::Validation(_) => ErrorClass::Validation,
            MatrikelError::Cancelled => ErrorClass::Cancelled,
            _ => ErrorClass::Fatal,
        }
    }

    /// Whether a local retry may succeed
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

impl From<std::io::Error> for MatrikelError {
    fn from(err: std::io::Error) -> Self {
        MatrikelError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MatrikelError {
    fn from(err: serde_json::Error) -> Self {
        MatrikelError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for MatrikelError {
    fn from(err: toml::de::Error) -> Self {
        MatrikelError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<arrow::error::ArrowError> for MatrikelError {
    fn from(err: arrow::error::ArrowError) -> Self {
        MatrikelError::Columnar(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for MatrikelError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        MatrikelError::Columnar(err.to_string())
    }
}

impl From<zip::result::ZipError> for MatrikelError {
    fn from(err: zip::result::ZipError) -> Self {
        MatrikelError::Archive(ArchiveError::Unreadable {
            path: String::new(),
            message: err.to_string(),
        })
    }
}
