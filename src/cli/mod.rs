//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Matrikel using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Matrikel - pseudonymizing ETL for land-register ownership extracts
#[derive(Parser, Debug)]
#[command(name = "matrikel")]
#[command(version, about, long_about = None)]
#[command(author = "Matrikel Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "matrikel.toml", env = "MATRIKEL_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "MATRIKEL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download, pseudonymize and publish the latest archive
    Run(commands::run::RunArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
