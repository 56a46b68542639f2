//! Post-upload verification
//!
//! Re-lists the destination after upload and checks that each expected object
//! exists, is non-empty and is fresh.

pub mod report;
pub mod verify;

pub use report::{ObjectCheck, VerificationReport};
pub use verify::Verifier;
