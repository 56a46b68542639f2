//! Privacy transformation for ownership records
//!
//! Person sub-records inside feature properties are stripped of gender,
//! address and birth-date fields, their identifiers are replaced by random
//! surrogates, and a derived `lives_abroad` flag replaces the raw foreign
//! address.
//!
//! # Architecture
//!
//! - **Config**: rule field names and registry lifetime
//! - **Registry**: identifier to surrogate mapping, ephemeral or persisted
//! - **Engine**: the per-record transformer
//! - **Report**: per-rule counters for the run summary

pub mod config;
pub mod engine;
pub mod registry;
pub mod report;

// Re-export main types
pub use config::{PrivacyConfig, PrivacyFields, RegistryMode};
pub use engine::PrivacyTransformer;
pub use registry::PseudonymRegistry;
pub use report::TransformReport;
