//! Validate config command implementation

use crate::config::{load_config, StorageBackend};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        // load_config validates as well
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!("Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Dataset: {}", config.application.dataset);
        println!("  Log Level: {}", config.application.log_level);
        println!(
            "  Source: {} (suffix '{}', port {})",
            config.source.remote_dir, config.source.file_suffix, config.source.port
        );
        println!(
            "  Resolve Retry: {} attempts, {}ms initial delay",
            config.source.retry.max_attempts, config.source.retry.initial_delay_ms
        );
        println!(
            "  Payload: '*{}' excluding '*{}'",
            config.archive.payload_suffix, config.archive.sidecar_suffix
        );
        println!("  Person Path: {}", config.privacy.person_path.join("."));
        println!("  Registry: {:?}", config.privacy.registry);
        println!("  Batch Size: {}", config.batch.batch_size);
        println!("  Work Dir: {}", config.batch.work_dir);
        match config.storage.backend {
            StorageBackend::Local => println!("  Storage: local ({})", config.storage.local_root),
            StorageBackend::S3 => {
                if let Some(s3) = &config.storage.s3 {
                    println!("  Storage: s3://{}", s3.bucket);
                }
            }
        }
        println!(
            "  Decommission: {} ({:?}, {}s grace)",
            if config.lifecycle.decommission_on_success {
                "on success"
            } else {
                "never"
            },
            config.lifecycle.decommissioner,
            config.lifecycle.grace_period_secs
        );
        println!();
        Ok(0)
    }
}
