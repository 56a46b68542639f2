//! Batched columnar output
//!
//! - [`writer`] - bounded-memory batch files
//! - [`merge`] - schema-union merge into the final artifact
//! - [`schema`] - column type inference shared by both

pub mod merge;
pub mod schema;
pub mod writer;

pub use merge::{merge_batches, MergeOutcome};
pub use schema::{ColumnSet, ColumnType};
pub use writer::{BatchFile, BatchWriter};
