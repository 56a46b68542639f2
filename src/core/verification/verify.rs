//! Independent check of uploaded objects
//!
//! The upload call returning success is not trusted on its own: the
//! destination is listed again and every expected key must be present,
//! non-empty and modified no earlier than the run start minus a tolerance.

use super::report::{ObjectCheck, VerificationReport};
use crate::adapters::storage::DurableStorage;
use crate::domain::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Instant;

/// Verifier over a storage backend
pub struct Verifier {
    storage: Arc<dyn DurableStorage>,
    tolerance: Duration,
}

impl Verifier {
    pub fn new(storage: Arc<dyn DurableStorage>, tolerance_secs: u64) -> Self {
        Self {
            storage,
            tolerance: Duration::seconds(tolerance_secs.min(i64::MAX as u64) as i64),
        }
    }

    /// Check every key in `keys` against a fresh listing
    ///
    /// # Errors
    ///
    /// Returns an error only if listing itself fails; failed checks are
    /// reported in the returned [`VerificationReport`].
    pub async fn verify(
        &self,
        keys: &[String],
        run_started: DateTime<Utc>,
    ) -> Result<VerificationReport> {
        let start = Instant::now();
        let not_before = run_started - self.tolerance;
        let mut report = VerificationReport::new(not_before);

        for key in keys {
            report.record(self.check_object(key, not_before).await?);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        report.log();
        Ok(report)
    }

    async fn check_object(&self, key: &str, not_before: DateTime<Utc>) -> Result<ObjectCheck> {
        let listing = self.storage.list(key).await?;
        let Some(object) = listing.iter().find(|o| o.key == key) else {
            return Ok(ObjectCheck {
                key: key.to_string(),
                found: false,
                size: None,
                last_modified: None,
                failure: Some(format!("not found in {}", self.storage.describe())),
            });
        };

        let failure = if object.size == 0 {
            Some("object is empty".to_string())
        } else if object.last_modified < not_before {
            Some(format!(
                "stale: last modified {} is before {}",
                object.last_modified, not_before
            ))
        } else {
            None
        };

        Ok(ObjectCheck {
            key: key.to_string(),
            found: true,
            size: Some(object.size),
            last_modified: Some(object.last_modified),
            failure,
        })
    }
}
