// Matrikel - Pseudonymizing ETL for Land-Register Ownership Extracts
// Copyright (c) 2025 Matrikel Contributors
// Licensed under the MIT License

//! # Matrikel - Pseudonymizing Ownership ETL
//!
//! Matrikel fetches the newest property-ownership archive from an SFTP
//! drop, streams the GeoJSON feature collection inside it, replaces every
//! owner's personal identifier with a run-stable surrogate, strips direct
//! identifiers, and publishes the result as one Parquet file.
//!
//! ## Overview
//!
//! - **Acquiring** the archive over key-authenticated SFTP, with retry on
//!   host resolution
//! - **Extracting** only the payload document from the zip container
//! - **Streaming** features one at a time, so memory stays bounded by the
//!   batch size rather than the multi-gigabyte document
//! - **Pseudonymizing** and cleaning each record before it reaches disk
//! - **Batching** rows into Parquet files and merging them under a unified
//!   schema
//! - **Publishing** the artifact to durable storage and verifying it landed
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Pipeline stages, run state machine and coordinator
//! - [`anonymization`] - Surrogate registry and the person-record transform
//! - [`adapters`] - SFTP, object storage, secret stores, decommission
//! - [`domain`] - Error type and shared records
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use matrikel::config::load_config;
//! use matrikel::core::run::{RunCoordinator, RunDependencies};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("matrikel.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//!     let deps = RunDependencies::from_config(&config).await?;
//!     let summary = RunCoordinator::new(config, deps, shutdown_rx).execute().await;
//!
//!     println!("{} rows, state {}", summary.merged_rows, summary.final_state);
//!     std::process::exit(summary.exit_code());
//! }
//! ```
//!
//! ## Privacy
//!
//! A person's identifier never leaves the transform step. The registry maps
//! it to a random UUID for the lifetime of the run; birth date, gender and
//! residential address blocks are dropped, and any foreign-address block is
//! reduced to a single `lives_abroad` flag:
//!
//! ```rust,no_run
//! use matrikel::anonymization::{PrivacyConfig, PrivacyTransformer, PseudonymRegistry};
//! use matrikel::domain::{Feature, Map, Value};
//!
//! let transformer = PrivacyTransformer::new(&PrivacyConfig::default());
//! let mut registry = PseudonymRegistry::new();
//!
//! let mut person = Map::new();
//! person.insert("id".to_string(), Value::String("1234567890".to_string()));
//! person.insert("koen".to_string(), Value::String("M".to_string()));
//! let mut properties = Map::new();
//! properties.insert("ejendePerson".to_string(), Value::Map(person));
//!
//! let feature = transformer.transform(Feature::new(properties), &mut registry);
//! assert_eq!(registry.len(), 1);
//! ```
//!
//! ## Error Handling
//!
//! Library code returns [`domain::MatrikelError`]; every variant maps to an
//! [`domain::ErrorClass`] that the run summary reports.

pub mod adapters;
pub mod anonymization;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
