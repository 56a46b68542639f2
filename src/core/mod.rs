//! Core business logic for Matrikel.
//!
//! # Modules
//!
//! - [`acquisition`] - Secrets, host resolution with retry, SFTP download
//! - [`extract`] - Payload extraction from the zip container
//! - [`stream`] - Streaming feature reader over multi-gigabyte documents
//! - [`transform`] - Structural cleaning and row flattening
//! - [`batch`] - Bounded-memory Parquet batches and the schema-union merge
//! - [`verification`] - Post-upload destination checks
//! - [`state`] - Run state machine
//! - [`run`] - Run coordinator, summary and terminal policy
//!
//! # Run Workflow
//!
//! 1. **Resolve**: Fetch SFTP credentials, resolve the host with retry
//! 2. **Connect**: Authenticate with a short-lived key file
//! 3. **Download**: Stream the newest matching archive to disk, back it up
//! 4. **Extract**: Decompress the payload document only
//! 5. **Transform**: Read, pseudonymize, clean, flatten and batch each feature
//! 6. **Merge**: Union the batch schemas into one Parquet artifact
//! 7. **Upload**: Store the artifact under the silver prefix
//! 8. **Validate**: Re-list the destination and check freshness
//!
//! # Example
//!
//! ```rust,no_run
//! use matrikel::config::load_config;
//! use matrikel::core::run::{RunCoordinator, RunDependencies};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("matrikel.toml")?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let deps = RunDependencies::from_config(&config).await?;
//! let coordinator = RunCoordinator::new(config, deps, shutdown_rx);
//! let summary = coordinator.execute().await;
//!
//! println!("State: {}", summary.final_state);
//! println!("Rows: {}", summary.merged_rows);
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod batch;
pub mod extract;
pub mod run;
pub mod state;
pub mod stream;
pub mod transform;
pub mod verification;
