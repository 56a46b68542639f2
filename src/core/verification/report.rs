//! Verification report structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of checking one uploaded object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectCheck {
    /// Object key that was expected
    pub key: String,

    /// Whether the listing contained the key
    pub found: bool,

    /// Size reported by the listing
    pub size: Option<u64>,

    /// Modification time reported by the listing
    pub last_modified: Option<DateTime<Utc>>,

    /// Reason for failure, `None` when the check passed
    pub failure: Option<String>,
}

impl ObjectCheck {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Report of a post-upload verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// When the verification was performed
    pub verified_at: DateTime<Utc>,

    /// Oldest modification time accepted
    pub not_before: DateTime<Utc>,

    /// One entry per expected object
    pub checks: Vec<ObjectCheck>,

    /// Duration of verification in milliseconds
    pub duration_ms: u64,
}

impl VerificationReport {
    pub fn new(not_before: DateTime<Utc>) -> Self {
        Self {
            verified_at: Utc::now(),
            not_before,
            checks: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn record(&mut self, check: ObjectCheck) {
        self.checks.push(check);
    }

    /// True when every expected object passed
    pub fn is_successful(&self) -> bool {
        !self.checks.is_empty() && self.checks.iter().all(ObjectCheck::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ObjectCheck> {
        self.checks.iter().filter(|c| !c.passed())
    }

    /// One line per failed object
    pub fn failure_summary(&self) -> String {
        self.failures()
            .map(|c| format!("{}: {}", c.key, c.failure.as_deref().unwrap_or("failed")))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn log(&self) {
        let failed = self.failures().count();
        tracing::info!(
            checked = self.checks.len(),
            failed,
            not_before = %self.not_before,
            duration_ms = self.duration_ms,
            "Verification completed"
        );
        for check in self.failures() {
            tracing::warn!(
                key = %check.key,
                reason = check.failure.as_deref().unwrap_or_default(),
                "Verification failure"
            );
        }
    }
}
