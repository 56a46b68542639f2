//! Record shaping between the privacy transformer and the batch writer
//!
//! - **Clean**: strip nulls and empty containers at any depth
//! - **Flatten**: turn nested property bags into one flat row per feature

pub mod clean;
pub mod flatten;

pub use clean::{clean, clean_feature, clean_map};
pub use flatten::{flatten_feature, Row, FEATURE_ID_COLUMN, GEOMETRY_COLUMN};
