//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "matrikel.toml")]
    pub output: String,

    /// Include every section with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("Initializing Matrikel configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Provide the SFTP secrets to the configured secret store:");
                println!("     - MATRIKEL_SECRET_SFTP_HOST");
                println!("     - MATRIKEL_SECRET_SFTP_USERNAME");
                println!("     - MATRIKEL_SECRET_SFTP_PRIVATE_KEY");
                println!("  3. Validate configuration: matrikel validate-config");
                println!("  4. Run the pipeline: matrikel run");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Matrikel Configuration File
# Land-register ownership extract to pseudonymized Parquet

[application]
log_level = "info"
dataset = "ownership"

[source]
remote_dir = "."
file_suffix = ".zip"

[batch]
batch_size = 100000
work_dir = "/tmp/matrikel"

[storage]
backend = "local"
local_root = "./storage"

[lifecycle]
decommission_on_success = false
"#
        .to_string()
    }

    /// Generate configuration with every section documented
    fn generate_config_with_examples() -> String {
        r#"# Matrikel Configuration File
# Land-register ownership extract to pseudonymized Parquet
#
# Values may reference environment variables as ${VAR_NAME}.
# Any key can also be overridden with MATRIKEL_<SECTION>_<KEY>.

[application]
log_level = "info"          # trace | debug | info | warn | error
dataset = "ownership"       # used in storage keys

[source]
# Secret names, resolved through [secrets]
host_secret = "sftp-host"
username_secret = "sftp-username"
private_key_secret = "sftp-private-key"
port = 22
remote_dir = "."
file_suffix = ".zip"
timeout_seconds = 60

[source.retry]
# Host resolution retry
max_attempts = 5
initial_delay_ms = 10000
max_delay_ms = 60000
backoff_multiplier = 1.0

[archive]
payload_suffix = ".json"
sidecar_suffix = "_metadata.json"

[reader]
progress_interval = 50000
max_record_bytes = 67108864

[privacy]
person_path = ["ejendePerson"]
registry = "ephemeral"      # ephemeral | persisted
# registry_path = "/var/lib/matrikel/registry.json"
# registry_salt_secret = "pseudonym-salt"

[privacy.fields]
gender = "koen"
identifier = "id"
address_blocks = ["bopaelsadresse", "standardadresse", "adresseoplysninger"]
foreign_address = ["udlandsadresse", "udrejseIndrejse"]
birth_date = ["foedselsdato", "foedselsdatoUsikkerhedsmarkering"]
lives_abroad = "lives_abroad"

[batch]
batch_size = 100000
work_dir = "/tmp/matrikel"
column_separator = "."

[storage]
backend = "local"           # local | s3
local_root = "./storage"
bronze_prefix = "bronze"
silver_prefix = "silver"
backup_archive = true
validation_tolerance_secs = 300

# [storage.s3]
# bucket = "landdata"
# region = "auto"
# endpoint = "https://storage.googleapis.com"
# access_key = "${MATRIKEL_S3_ACCESS_KEY}"
# secret_key = "${MATRIKEL_S3_SECRET_KEY}"
# path_style = false

[secrets]
backend = "env"             # env | directory
env_prefix = "MATRIKEL_SECRET_"
directory = "/run/secrets"

[lifecycle]
decommission_on_success = true
grace_period_secs = 300
decommissioner = "none"     # none | gce

[logging]
local_enabled = true
local_path = "/var/log/matrikel"
local_rotation = "daily"    # daily | hourly | never
"#
        .to_string()
    }
}
