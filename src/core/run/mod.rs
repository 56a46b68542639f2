//! Run orchestration
//!
//! - [`coordinator`] - drives one run through every stage
//! - [`summary`] - what happened, for logs and the exit code
//! - [`terminal`] - post-run decommission hook

pub mod coordinator;
pub mod summary;
pub mod terminal;

pub use coordinator::{RunCoordinator, RunDependencies, WorkDirs};
pub use summary::{RunError, RunSummary, EXIT_CANCELLED, EXIT_FAILED, EXIT_SUCCESS};
pub use terminal::{TerminalAction, TerminalPolicy};
