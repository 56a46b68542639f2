//! Run coordinator - main orchestrator for a pipeline run
//!
//! Drives one run through acquisition, extraction, transformation, batching,
//! merge, upload and verification, advancing the [`RunStateMachine`] one step
//! per successful stage. Any error fails the run; local scratch files are
//! removed on every exit path.

use super::summary::RunSummary;
use crate::adapters::secrets::{create_secret_store, SecretStore};
use crate::adapters::storage::{create_storage, DurableStorage, StorageLayout};
use crate::adapters::transport::{RemoteTransport, SftpTransport};
use crate::anonymization::{PrivacyTransformer, PseudonymRegistry, RegistryMode, TransformReport};
use crate::config::MatrikelConfig;
use crate::core::acquisition::{
    Acquirer, DownloadedArchive, HostResolver, Sleeper, SystemResolver, TokioSleeper,
};
use crate::core::batch::{merge_batches, BatchFile, BatchWriter, MergeOutcome};
use crate::core::extract::{extract_payload, ExtractedPayload};
use crate::core::state::{RunState, RunStateMachine};
use crate::core::stream::{FeatureStream, ReadStats};
use crate::core::transform::{clean_feature, flatten_feature};
use crate::core::verification::Verifier;
use crate::domain::{MatrikelError, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use uuid::Uuid;

/// How often the record loop polls the shutdown signal
const CANCEL_POLL_RECORDS: u64 = 1024;

/// Capabilities the coordinator talks to
#[derive(Clone)]
pub struct RunDependencies {
    pub secrets: Arc<dyn SecretStore>,
    pub resolver: Arc<dyn HostResolver>,
    pub transport: Arc<dyn RemoteTransport>,
    pub storage: Arc<dyn DurableStorage>,
    pub sleeper: Arc<dyn Sleeper>,
}

impl RunDependencies {
    /// Production dependencies selected by configuration
    pub async fn from_config(config: &MatrikelConfig) -> Result<Self> {
        Ok(Self {
            secrets: create_secret_store(&config.secrets),
            resolver: Arc::new(SystemResolver),
            transport: Arc::new(SftpTransport::new(std::time::Duration::from_secs(
                config.source.timeout_seconds,
            ))),
            storage: create_storage(&config.storage).await?,
            sleeper: Arc::new(TokioSleeper),
        })
    }
}

/// Local scratch directories of a run
#[derive(Debug, Clone)]
pub struct WorkDirs {
    pub download: PathBuf,
    pub extract: PathBuf,
    pub batches: PathBuf,
    pub merged: PathBuf,
}

impl WorkDirs {
    pub fn new(root: &Path) -> Self {
        Self {
            download: root.join("download"),
            extract: root.join("extract"),
            batches: root.join("batches"),
            merged: root.join("merged"),
        }
    }

    /// Remove every scratch directory, best effort
    pub fn cleanup(&self) {
        for dir in [&self.download, &self.extract, &self.batches, &self.merged] {
            match std::fs::remove_dir_all(dir) {
                Ok(()) => tracing::debug!(dir = %dir.display(), "Removed scratch directory"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Failed to remove scratch directory")
                }
            }
        }
    }
}

/// Result of the record loop
struct TransformOutcome {
    stats: ReadStats,
    report: TransformReport,
    files: Vec<BatchFile>,
    registry: PseudonymRegistry,
}

/// Run coordinator
pub struct RunCoordinator {
    config: MatrikelConfig,
    deps: RunDependencies,
    shutdown: watch::Receiver<bool>,
    work: WorkDirs,
}

impl RunCoordinator {
    pub fn new(
        config: MatrikelConfig,
        deps: RunDependencies,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let work = WorkDirs::new(Path::new(&config.batch.work_dir));
        Self {
            config,
            deps,
            shutdown,
            work,
        }
    }

    /// Execute a run
    ///
    /// Never returns an error: failures are recorded in the summary and the
    /// machine ends in `Failed`.
    pub async fn execute(&self) -> RunSummary {
        let start = Instant::now();
        let mut machine = RunStateMachine::new();
        let run_id = Uuid::new_v4().to_string();
        let mut summary = RunSummary::new(run_id.clone(), machine.started_at());

        tracing::info!(
            run_id = %run_id,
            dataset = %self.config.application.dataset,
            work_dir = %self.config.batch.work_dir,
            "Starting run"
        );

        if let Err(e) = self.run_stages(&mut machine, &mut summary).await {
            summary.add_error(machine.state(), &e);
            crate::log_error_with_context!(e, machine.state().as_str());
            machine.fail(&e.to_string());
        }

        self.work.cleanup();
        summary.finish(&machine, start.elapsed());
        summary.log_summary();
        summary
    }

    async fn run_stages(
        &self,
        machine: &mut RunStateMachine,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let run_date = machine.started_at().date_naive();
        let layout = StorageLayout::new(&self.config.storage, &self.config.application.dataset);
        let acquirer = Acquirer::new(
            self.config.source.clone(),
            self.deps.secrets.clone(),
            self.deps.resolver.clone(),
            self.deps.transport.clone(),
            self.deps.sleeper.clone(),
            self.shutdown.clone(),
        );

        // Resolving
        self.check_cancelled()?;
        machine.advance_to(RunState::Resolving)?;
        let stage = Instant::now();
        crate::log_stage_start!("resolve");
        let source = acquirer.resolve().await?;
        let registry = self.open_registry().await?;
        crate::log_stage_complete!("resolve", stage.elapsed());

        // Connected
        self.check_cancelled()?;
        let stage = Instant::now();
        crate::log_stage_start!("connect");
        let mut session = acquirer.connect(&source).await?;
        machine.advance_to(RunState::Connected)?;
        crate::log_stage_complete!("connect", stage.elapsed());

        // Downloaded
        if let Err(e) = self.check_cancelled() {
            session.close();
            return Err(e);
        }
        let stage = Instant::now();
        crate::log_stage_start!("download");
        let archive = acquirer.download_latest(session, &self.work.download).await?;
        summary.source_archive = Some(archive.remote_name.clone());
        machine.advance_to(RunState::Downloaded)?;
        crate::log_stage_complete!("download", stage.elapsed());

        if self.config.storage.backup_archive {
            summary.archive_key = Some(self.backup_archive(&layout, run_date, &archive).await?);
        }

        // Extracted
        self.check_cancelled()?;
        let stage = Instant::now();
        crate::log_stage_start!("extract");
        let payload = self.extract(&archive).await?;
        remove_quietly(&archive.path);
        machine.advance_to(RunState::Extracted)?;
        crate::log_stage_complete!("extract", stage.elapsed());

        // Transformed
        self.check_cancelled()?;
        let stage = Instant::now();
        crate::log_stage_start!("transform");
        let outcome = self.transform(&payload, registry).await?;
        remove_quietly(&payload.path);
        outcome.report.log();
        summary.records_read = outcome.stats.read;
        summary.records_skipped = outcome.stats.skipped;
        summary.persons_pseudonymized = outcome.report.identifiers_replaced;
        summary.distinct_identities = outcome.registry.len();
        summary.batches_written = outcome.files.len();
        summary.transform = outcome.report.clone();
        machine.advance_to(RunState::Transformed)?;
        crate::log_stage_complete!("transform", stage.elapsed());

        // Merged
        self.check_cancelled_discarding(&outcome.files)?;
        let stage = Instant::now();
        crate::log_stage_start!("merge");
        let merged = self.merge(outcome.files).await?;
        if merged.rows != outcome.stats.yielded() {
            return Err(MatrikelError::Columnar(format!(
                "merged artifact has {} rows but {} features were read",
                merged.rows,
                outcome.stats.yielded()
            )));
        }
        summary.merged_rows = merged.rows;
        summary.columns = merged.columns;
        summary.artifact_bytes = merged.bytes;
        machine.advance_to(RunState::Merged)?;
        crate::log_stage_complete!("merge", stage.elapsed());

        // Uploaded
        self.check_cancelled()?;
        let stage = Instant::now();
        crate::log_stage_start!("upload");
        let artifact_key = layout.artifact_key(run_date);
        self.deps.storage.upload(&merged.path, &artifact_key).await?;
        summary.artifact_key = Some(artifact_key.clone());
        machine.advance_to(RunState::Uploaded)?;
        crate::log_stage_complete!("upload", stage.elapsed());

        // Validated
        let stage = Instant::now();
        crate::log_stage_start!("validate");
        let mut expected = vec![artifact_key];
        expected.extend(summary.archive_key.clone());
        let verifier = Verifier::new(
            self.deps.storage.clone(),
            self.config.storage.validation_tolerance_secs,
        );
        let report = verifier.verify(&expected, machine.started_at()).await?;
        let passed = report.is_successful();
        let failures = report.failure_summary();
        summary.verification = Some(report);
        if !passed {
            return Err(MatrikelError::Validation(failures));
        }
        machine.advance_to(RunState::Validated)?;
        crate::log_stage_complete!("validate", stage.elapsed());

        self.persist_registry(&outcome.registry)?;
        machine.advance_to(RunState::Completed)?;
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        if *self.shutdown.borrow() {
            return Err(MatrikelError::Cancelled);
        }
        Ok(())
    }

    fn check_cancelled_discarding(&self, files: &[BatchFile]) -> Result<()> {
        self.check_cancelled().inspect_err(|_| {
            for file in files {
                remove_quietly(&file.path);
            }
        })
    }

    async fn open_registry(&self) -> Result<PseudonymRegistry> {
        let privacy = &self.config.privacy;
        match privacy.registry {
            RegistryMode::Ephemeral => Ok(PseudonymRegistry::new()),
            RegistryMode::Persisted => {
                let path = privacy.registry_path.clone().ok_or_else(|| {
                    MatrikelError::Configuration(
                        "privacy.registry_path is required for a persisted registry".to_string(),
                    )
                })?;
                let salt = self
                    .deps
                    .secrets
                    .get_secret(&privacy.registry_salt_secret)
                    .await?;
                tokio::task::spawn_blocking(move || PseudonymRegistry::load(&path, salt))
                    .await
                    .map_err(|e| MatrikelError::Other(format!("registry load task failed: {e}")))?
            }
        }
    }

    fn persist_registry(&self, registry: &PseudonymRegistry) -> Result<()> {
        if self.config.privacy.registry != RegistryMode::Persisted {
            return Ok(());
        }
        match &self.config.privacy.registry_path {
            Some(path) => registry.save(path),
            None => Ok(()),
        }
    }

    async fn backup_archive(
        &self,
        layout: &StorageLayout,
        date: NaiveDate,
        archive: &DownloadedArchive,
    ) -> Result<String> {
        let key = layout.archive_key(date, &archive.remote_name);
        self.deps.storage.upload(&archive.path, &key).await?;
        tracing::info!(key = %key, "Archive backed up");
        Ok(key)
    }

    async fn extract(&self, archive: &DownloadedArchive) -> Result<ExtractedPayload> {
        let archive_path = archive.path.clone();
        let dest = self.work.extract.clone();
        let config = self.config.archive.clone();
        tokio::task::spawn_blocking(move || extract_payload(&archive_path, &dest, &config))
            .await
            .map_err(|e| MatrikelError::Other(format!("extraction task failed: {e}")))?
    }

    async fn transform(
        &self,
        payload: &ExtractedPayload,
        mut registry: PseudonymRegistry,
    ) -> Result<TransformOutcome> {
        let path = payload.path.clone();
        let batches_dir = self.work.batches.clone();
        let reader = self.config.reader.clone();
        let batch = self.config.batch.clone();
        let transformer = PrivacyTransformer::new(&self.config.privacy);
        let shutdown = self.shutdown.clone();

        tokio::task::spawn_blocking(move || -> Result<TransformOutcome> {
            let mut stream =
                FeatureStream::open(&path, reader.max_record_bytes, reader.progress_interval)?;
            let mut writer = BatchWriter::new(&batches_dir, batch.batch_size)?;
            let mut report = TransformReport::new();
            let mut processed: u64 = 0;

            for item in stream.by_ref() {
                if processed % CANCEL_POLL_RECORDS == 0 && *shutdown.borrow() {
                    writer.discard();
                    return Err(MatrikelError::Cancelled);
                }
                let feature = match item {
                    Ok(feature) => feature,
                    Err(e) => {
                        writer.discard();
                        return Err(e);
                    }
                };

                let feature = transformer.transform_counted(feature, &mut registry, &mut report);
                let feature = clean_feature(feature);
                writer.push(flatten_feature(&feature, &batch.column_separator))?;
                processed += 1;
            }

            let stats = stream.stats();
            let files = writer.finish()?;
            if stats.yielded() == 0 {
                return Err(MatrikelError::Document(format!(
                    "no usable features in payload ({} read, {} skipped)",
                    stats.read, stats.skipped
                )));
            }

            Ok(TransformOutcome {
                stats,
                report,
                files,
                registry,
            })
        })
        .await
        .map_err(|e| MatrikelError::Other(format!("transform task failed: {e}")))?
    }

    async fn merge(&self, files: Vec<BatchFile>) -> Result<MergeOutcome> {
        let output = self
            .work
            .merged
            .join(format!("{}.parquet", self.config.application.dataset));
        tokio::task::spawn_blocking(move || merge_batches(&files, &output))
            .await
            .map_err(|e| MatrikelError::Other(format!("merge task failed: {e}")))?
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove file");
        }
    }
}
