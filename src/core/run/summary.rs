//! Run summary and reporting

use crate::anonymization::TransformReport;
use crate::core::state::{RunState, RunStateMachine};
use crate::core::verification::VerificationReport;
use crate::domain::{ErrorClass, MatrikelError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Exit code of a completed run
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code of a failed run
pub const EXIT_FAILED: i32 = 5;
/// Exit code of a cancelled run
pub const EXIT_CANCELLED: i32 = 130;

/// Summary of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Unique id of this run
    pub run_id: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// State the run ended in
    pub final_state: RunState,

    /// Last state reached before failing
    pub failed_from: Option<RunState>,

    /// Name of the downloaded archive
    pub source_archive: Option<String>,

    /// Features found in the document, malformed ones included
    pub records_read: u64,

    /// Malformed features skipped
    pub records_skipped: u64,

    /// Person sub-records pseudonymized
    pub persons_pseudonymized: u64,

    /// Distinct identities seen
    pub distinct_identities: usize,

    /// Batch files written before merge
    pub batches_written: usize,

    /// Rows in the merged artifact
    pub merged_rows: u64,

    /// Columns in the merged artifact
    pub columns: usize,

    /// Size of the merged artifact in bytes
    pub artifact_bytes: u64,

    /// Storage key of the artifact
    pub artifact_key: Option<String>,

    /// Storage key of the archive backup
    pub archive_key: Option<String>,

    /// Privacy rule counters
    pub transform: TransformReport,

    /// Post-upload verification report
    pub verification: Option<VerificationReport>,

    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,

    /// Errors encountered
    pub errors: Vec<RunError>,
}

/// An error that ended or affected the run
#[derive(Debug, Clone, Serialize)]
pub struct RunError {
    /// State the run was in
    pub stage: RunState,

    pub class: ErrorClass,

    pub message: String,
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at,
            final_state: RunState::Provisioned,
            failed_from: None,
            source_archive: None,
            records_read: 0,
            records_skipped: 0,
            persons_pseudonymized: 0,
            distinct_identities: 0,
            batches_written: 0,
            merged_rows: 0,
            columns: 0,
            artifact_bytes: 0,
            artifact_key: None,
            archive_key: None,
            transform: TransformReport::default(),
            verification: None,
            duration_ms: 0,
            errors: Vec::new(),
        }
    }

    /// Record an error raised while in `stage`
    pub fn add_error(&mut self, stage: RunState, error: &MatrikelError) {
        self.errors.push(RunError {
            stage,
            class: error.class(),
            message: error.to_string(),
        });
    }

    /// Copy the final state from the machine and set the duration
    pub fn finish(&mut self, machine: &RunStateMachine, duration: Duration) {
        self.final_state = machine.state();
        self.failed_from = machine.failed_from();
        self.duration_ms = duration.as_millis() as u64;
    }

    pub fn is_successful(&self) -> bool {
        self.final_state == RunState::Completed
    }

    pub fn was_cancelled(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.class == ErrorClass::Cancelled)
    }

    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        if self.is_successful() {
            EXIT_SUCCESS
        } else if self.was_cancelled() {
            EXIT_CANCELLED
        } else {
            EXIT_FAILED
        }
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            run_id = %self.run_id,
            state = %self.final_state,
            archive = self.source_archive.as_deref().unwrap_or("-"),
            records_read = self.records_read,
            records_skipped = self.records_skipped,
            persons = self.persons_pseudonymized,
            identities = self.distinct_identities,
            batches = self.batches_written,
            rows = self.merged_rows,
            columns = self.columns,
            artifact = self.artifact_key.as_deref().unwrap_or("-"),
            duration_secs = self.duration_ms / 1000,
            "Run finished"
        );

        for error in &self.errors {
            tracing::error!(
                stage = %error.stage,
                class = ?error.class,
                message = %error.message,
                "Run error"
            );
        }
    }
}
