//! Run command implementation
//!
//! Executes one full pipeline run and then applies the terminal policy.

use crate::adapters::decommission::create_decommissioner;
use crate::config::{load_config, MatrikelConfig};
use crate::core::acquisition::TokioSleeper;
use crate::core::run::{
    RunCoordinator, RunDependencies, RunSummary, TerminalAction, TerminalPolicy,
};
use clap::Args;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the run command
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Override the number of rows per batch file
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Override the local working directory
    #[arg(long)]
    pub work_dir: Option<String>,

    /// Never decommission the instance, even on success
    #[arg(long)]
    pub keep_instance: bool,
}

impl RunArgs {
    /// Apply CLI overrides to a loaded configuration
    pub fn apply_overrides(&self, config: &mut MatrikelConfig) {
        if let Some(batch_size) = self.batch_size {
            tracing::info!(batch_size, "Overriding batch size from CLI");
            config.batch.batch_size = batch_size;
        }
        if let Some(work_dir) = &self.work_dir {
            tracing::info!(work_dir = %work_dir, "Overriding work directory from CLI");
            config.batch.work_dir = work_dir.clone();
        }
    }

    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting run command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };
        self.apply_overrides(&mut config);
        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let deps = match RunDependencies::from_config(&config).await {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialize dependencies");
                eprintln!("Failed to initialize run: {e}");
                return Ok(2);
            }
        };
        let decommissioner = create_decommissioner(&config.lifecycle)?;
        let policy = TerminalPolicy::new(
            &config.lifecycle,
            self.keep_instance,
            decommissioner,
            Arc::new(TokioSleeper),
            shutdown_signal.clone(),
        );

        let coordinator = RunCoordinator::new(config, deps, shutdown_signal);
        let summary = coordinator.execute().await;
        print_summary(&summary);

        match policy.apply(&summary).await {
            TerminalAction::Decommissioned => println!("Instance deletion requested."),
            TerminalAction::DecommissionFailed(e) => eprintln!("Decommission failed: {e}"),
            TerminalAction::Cancelled => println!("Decommission skipped: shutdown requested."),
            TerminalAction::Skipped(reason) => tracing::debug!(reason = %reason, "No decommission"),
        }

        Ok(summary.exit_code())
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Run Summary ({}):", summary.run_id);
    println!("  State: {}", summary.final_state);
    if let Some(from) = summary.failed_from {
        println!("  Failed during: {from}");
    }
    println!(
        "  Source archive: {}",
        summary.source_archive.as_deref().unwrap_or("-")
    );
    println!("  Records read: {}", summary.records_read);
    println!("  Records skipped: {}", summary.records_skipped);
    println!("  Persons pseudonymized: {}", summary.persons_pseudonymized);
    println!("  Distinct identities: {}", summary.distinct_identities);
    println!("  Batches written: {}", summary.batches_written);
    println!(
        "  Merged rows: {} ({} columns, {} bytes)",
        summary.merged_rows, summary.columns, summary.artifact_bytes
    );
    println!(
        "  Artifact: {}",
        summary.artifact_key.as_deref().unwrap_or("-")
    );
    if let Some(key) = &summary.archive_key {
        println!("  Archive backup: {key}");
    }
    println!("  Duration: {:.2}s", summary.duration_ms as f64 / 1000.0);

    if let Some(report) = &summary.verification {
        let failed = report.failures().count();
        println!(
            "  Verification: {} checked, {} failed",
            report.checks.len(),
            failed
        );
    }

    if !summary.errors.is_empty() {
        println!();
        println!("Errors:");
        for error in &summary.errors {
            println!("  - [{}] {:?}: {}", error.stage, error.class, error.message);
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_defaults() {
        let args = RunArgs::default();
        assert!(args.batch_size.is_none());
        assert!(args.work_dir.is_none());
        assert!(!args.keep_instance);
    }

    #[test]
    fn test_apply_overrides() {
        let args = RunArgs {
            batch_size: Some(250),
            work_dir: Some("/scratch".to_string()),
            keep_instance: true,
        };
        let mut config = MatrikelConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.batch.batch_size, 250);
        assert_eq!(config.batch.work_dir, "/scratch");
    }

    #[tokio::test]
    async fn test_missing_config_is_config_error() {
        let (_tx, rx) = watch::channel(false);
        let code = RunArgs::default()
            .execute("/nonexistent/matrikel.toml", rx)
            .await
            .unwrap();
        assert_eq!(code, 2);
    }
}
