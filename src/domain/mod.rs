//! Domain models and types for Matrikel.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Semi-structured values** ([`Value`], [`Map`]) for irregular property bags
//! - **Features** ([`Feature`]) flowing from the reader to the batch writer
//! - **Error types** ([`MatrikelError`], [`AcquisitionError`], [`ArchiveError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, MatrikelError>`]:
//!
//! ```rust
//! use matrikel::domain::{MatrikelError, Result};
//!
//! fn example() -> Result<()> {
//!     let config = matrikel::config::load_config("matrikel.toml")?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod feature;
pub mod result;
pub mod value;

// Re-export commonly used types for convenience
pub use errors::{AcquisitionError, ArchiveError, ErrorClass, MatrikelError};
pub use feature::Feature;
pub use result::Result;
pub use value::{Map, Value};
