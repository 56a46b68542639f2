//! Privacy rule counters
//!
//! Tracks how often each rule fired during a run so the summary can show that
//! personal data was actually found and handled.

use serde::{Deserialize, Serialize};

/// Per-run privacy transformation report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformReport {
    /// Features passed through the transformer
    pub features_seen: u64,

    /// Features carrying at least one person sub-record
    pub features_with_person: u64,

    /// Person sub-records transformed
    pub persons: u64,

    /// Identifiers replaced by a surrogate
    pub identifiers_replaced: u64,

    /// Identifiers dropped because they could not be read as text
    pub identifiers_dropped: u64,

    /// Gender fields removed
    pub gender_removed: u64,

    /// Address blocks removed
    pub address_blocks_removed: u64,

    /// Birth-date fields removed
    pub birth_date_removed: u64,

    /// Foreign-address indicator fields removed
    pub foreign_address_removed: u64,

    /// Persons flagged as living abroad
    pub lives_abroad: u64,
}

impl TransformReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Total fields removed across all rules
    pub fn fields_removed(&self) -> u64 {
        self.gender_removed
            + self.address_blocks_removed
            + self.birth_date_removed
            + self.foreign_address_removed
            + self.identifiers_dropped
    }

    /// Log the report
    pub fn log(&self) {
        tracing::info!(
            features = self.features_seen,
            features_with_person = self.features_with_person,
            persons = self.persons,
            identifiers_replaced = self.identifiers_replaced,
            fields_removed = self.fields_removed(),
            lives_abroad = self.lives_abroad,
            "Privacy transformation report"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_removed_sums_rules() {
        let report = TransformReport {
            gender_removed: 2,
            address_blocks_removed: 3,
            birth_date_removed: 4,
            foreign_address_removed: 1,
            identifiers_dropped: 1,
            ..TransformReport::default()
        };
        assert_eq!(report.fields_removed(), 11);
    }
}
