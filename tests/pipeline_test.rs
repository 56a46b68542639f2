//! End-to-end run tests against in-memory SFTP and local storage

mod common;

use arrow::array::{Array, BooleanArray, StringArray};
use arrow::record_batch::RecordBatch;
use common::{
    feature_collection, owner_feature, zip_archive, zip_with_entries, CountingDecommissioner,
    FakeResolver, FakeTransport, Harness, UnlistedStorage,
};
use matrikel::adapters::storage::LocalStorage;
use matrikel::anonymization::RegistryMode;
use matrikel::config::LifecycleConfig;
use matrikel::core::acquisition::RecordingSleeper;
use matrikel::core::run::{
    RunCoordinator, TerminalAction, TerminalPolicy, EXIT_CANCELLED, EXIT_FAILED, EXIT_SUCCESS,
};
use std::sync::Arc;
use matrikel::core::state::RunState;
use matrikel::domain::ErrorClass;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;

fn read_artifact(path: &Path) -> Vec<RecordBatch> {
    let file = File::open(path).unwrap();
    ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn strings(batches: &[RecordBatch], column: &str) -> Vec<Option<String>> {
    batches
        .iter()
        .flat_map(|batch| {
            let array = batch
                .column_by_name(column)
                .unwrap_or_else(|| panic!("missing column {column}"))
                .as_any()
                .downcast_ref::<StringArray>()
                .unwrap()
                .clone();
            (0..array.len())
                .map(|i| (!array.is_null(i)).then(|| array.value(i).to_string()))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn bools(batches: &[RecordBatch], column: &str) -> Vec<bool> {
    batches
        .iter()
        .flat_map(|batch| {
            let array = batch
                .column_by_name(column)
                .unwrap()
                .as_any()
                .downcast_ref::<BooleanArray>()
                .unwrap()
                .clone();
            (0..array.len()).map(|i| array.value(i)).collect::<Vec<_>>()
        })
        .collect()
}

async fn run(harness: &Harness) -> matrikel::core::run::RunSummary {
    let (_tx, rx) = watch::channel(false);
    RunCoordinator::new(harness.config.clone(), harness.deps(), rx)
        .execute()
        .await
}

#[tokio::test]
async fn test_full_run_skips_malformed_record_and_pseudonymizes() {
    let abroad = r#"{"type":"Feature","id":3,"geometry":null,
        "properties":{"andel":"1/2","ejendePerson":{"id":"1234567890",
        "udlandsadresse":{"land":"SE"}}}}"#;
    let payload = feature_collection(&[
        &owner_feature(1, "1234567890"),
        r#"{"type":"Feature","properties": }"#,
        abroad,
    ]);
    let transport = FakeTransport::default()
        .with_file("EJF_20250101.zip", 100, zip_archive("[]"))
        .with_file("EJF_20250301.zip", 300, zip_archive(&payload));
    let harness = Harness::new(transport);

    let summary = run(&harness).await;

    assert_eq!(summary.final_state, RunState::Completed, "{:?}", summary.errors);
    assert_eq!(summary.exit_code(), EXIT_SUCCESS);
    assert_eq!(summary.source_archive.as_deref(), Some("EJF_20250301.zip"));
    assert_eq!(summary.records_read, 3);
    assert_eq!(summary.records_skipped, 1);
    assert_eq!(summary.merged_rows, 2);
    assert_eq!(summary.persons_pseudonymized, 2);
    assert_eq!(summary.distinct_identities, 1);
    assert_eq!(harness.transport.downloads(), vec!["EJF_20250301.zip".to_string()]);

    let artifact = harness.stored(summary.artifact_key.as_deref().unwrap());
    let batches = read_artifact(&artifact);
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, 2);

    let surrogates = strings(&batches, "ejendePerson.id");
    assert_eq!(surrogates[0], surrogates[1]);
    assert_ne!(surrogates[0].as_deref(), Some("1234567890"));
    assert_eq!(bools(&batches, "ejendePerson.lives_abroad"), vec![false, true]);

    let schema = batches[0].schema();
    for removed in [
        "ejendePerson.koen",
        "ejendePerson.foedselsdato",
        "ejendePerson.bopaelsadresse.vejnavn",
        "ejendePerson.udlandsadresse.land",
    ] {
        assert!(schema.field_with_name(removed).is_err(), "{removed} leaked");
    }

    let report = summary.verification.as_ref().unwrap();
    assert!(report.is_successful());
    assert_eq!(report.checks.len(), 2);
}

#[tokio::test]
async fn test_archive_backup_and_scratch_cleanup() {
    let payload = feature_collection(&[
        &owner_feature(1, "1111111111"),
        &owner_feature(2, "2222222222"),
        &owner_feature(3, "3333333333"),
        &owner_feature(4, "4444444444"),
        &owner_feature(5, "5555555555"),
    ]);
    let transport = FakeTransport::default().with_file("EJF.zip", 1, zip_archive(&payload));
    let mut harness = Harness::new(transport);
    harness.config.batch.batch_size = 2;

    let summary = run(&harness).await;

    assert!(summary.is_successful(), "{:?}", summary.errors);
    assert_eq!(summary.batches_written, 3);
    assert_eq!(summary.merged_rows, 5);
    assert_eq!(summary.distinct_identities, 5);

    let archive_key = summary.archive_key.as_deref().unwrap();
    assert!(archive_key.starts_with("bronze/ownership/"));
    assert!(archive_key.ends_with("/EJF.zip"));
    assert!(harness.stored(archive_key).exists());

    let artifact_key = summary.artifact_key.as_deref().unwrap();
    assert!(artifact_key.starts_with("silver/ownership/"));
    assert!(artifact_key.ends_with(".parquet"));

    for dir in ["download", "extract", "batches", "merged"] {
        assert!(!harness.work_dir().join(dir).exists(), "{dir} not cleaned");
    }
}

#[tokio::test]
async fn test_backup_disabled() {
    let payload = feature_collection(&[&owner_feature(1, "1111111111")]);
    let transport = FakeTransport::default().with_file("EJF.zip", 1, zip_archive(&payload));
    let mut harness = Harness::new(transport);
    harness.config.storage.backup_archive = false;

    let summary = run(&harness).await;
    assert!(summary.is_successful());
    assert!(summary.archive_key.is_none());
    assert_eq!(summary.verification.unwrap().checks.len(), 1);
}

#[tokio::test]
async fn test_artifact_missing_from_listing_fails_validation() {
    let payload = feature_collection(&[&owner_feature(1, "1111111111")]);
    let transport = FakeTransport::default().with_file("EJF.zip", 1, zip_archive(&payload));
    let harness = Harness::new(transport);
    let storage = Arc::new(UnlistedStorage::new(
        LocalStorage::new(&harness.config.storage.local_root),
        "silver/",
    ));

    let (_tx, rx) = watch::channel(false);
    let summary = RunCoordinator::new(harness.config.clone(), harness.deps_with_storage(storage), rx.clone())
        .execute()
        .await;

    assert_eq!(summary.final_state, RunState::Failed);
    assert_eq!(summary.failed_from, Some(RunState::Uploaded));
    assert_eq!(summary.exit_code(), EXIT_FAILED);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].class, ErrorClass::Validation);
    let report = summary.verification.as_ref().unwrap();
    assert!(!report.is_successful());
    assert_eq!(report.failures().count(), 1);

    let lifecycle = LifecycleConfig {
        decommission_on_success: true,
        ..LifecycleConfig::default()
    };
    let decommissioner = Arc::new(CountingDecommissioner::default());
    let sleeper = Arc::new(RecordingSleeper::new());
    let action = TerminalPolicy::new(&lifecycle, false, decommissioner.clone(), sleeper.clone(), rx)
        .apply(&summary)
        .await;

    assert!(matches!(action, TerminalAction::Skipped(_)));
    assert_eq!(decommissioner.calls(), 0);
    assert!(sleeper.slept().is_empty());
}

#[tokio::test]
async fn test_no_matching_file_fails_without_download() {
    let transport = FakeTransport::default().with_file("readme.txt", 1, b"hello".to_vec());
    let harness = Harness::new(transport);

    let summary = run(&harness).await;

    assert_eq!(summary.final_state, RunState::Failed);
    assert_eq!(summary.failed_from, Some(RunState::Connected));
    assert_eq!(summary.exit_code(), EXIT_FAILED);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].class, ErrorClass::Fatal);
    assert!(harness.transport.downloads().is_empty());
    assert!(summary.artifact_key.is_none());
}

#[tokio::test]
async fn test_resolution_retries_then_succeeds() {
    let payload = feature_collection(&[&owner_feature(1, "1111111111")]);
    let transport = FakeTransport::default().with_file("EJF.zip", 1, zip_archive(&payload));
    let harness = Harness::with_resolver(transport, FakeResolver::failing(2));

    let summary = run(&harness).await;

    assert!(summary.is_successful(), "{:?}", summary.errors);
    assert_eq!(harness.resolver.calls(), 3);
    assert_eq!(
        harness.sleeper.slept(),
        vec![Duration::from_secs(10), Duration::from_secs(10)]
    );
}

#[tokio::test]
async fn test_resolution_exhausted_is_transient_failure() {
    let transport = FakeTransport::default();
    let mut harness = Harness::with_resolver(transport, FakeResolver::failing(usize::MAX));
    harness.config.source.retry.max_attempts = 3;

    let summary = run(&harness).await;

    assert_eq!(summary.final_state, RunState::Failed);
    assert_eq!(summary.failed_from, Some(RunState::Resolving));
    assert_eq!(summary.errors[0].class, ErrorClass::Transient);
    assert_eq!(harness.resolver.calls(), 3);
    assert_eq!(harness.sleeper.slept().len(), 2);
}

#[tokio::test]
async fn test_archive_without_payload_fails() {
    let archive = zip_with_entries(&[("EJF_metadata.json", "{}"), ("notes.txt", "x")]);
    let transport = FakeTransport::default().with_file("EJF.zip", 1, archive);
    let harness = Harness::new(transport);

    let summary = run(&harness).await;

    assert_eq!(summary.final_state, RunState::Failed);
    assert_eq!(summary.failed_from, Some(RunState::Downloaded));
    assert!(!harness.work_dir().join("download").exists());
}

#[tokio::test]
async fn test_empty_feature_collection_fails() {
    let transport = FakeTransport::default().with_file("EJF.zip", 1, zip_archive(&feature_collection(&[])));
    let harness = Harness::new(transport);

    let summary = run(&harness).await;

    assert_eq!(summary.final_state, RunState::Failed);
    assert_eq!(summary.failed_from, Some(RunState::Extracted));
    assert!(summary.artifact_key.is_none());
}

#[tokio::test]
async fn test_shutdown_before_start_is_cancelled() {
    let transport = FakeTransport::default().with_file("EJF.zip", 1, zip_archive("[]"));
    let harness = Harness::new(transport);
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let summary = RunCoordinator::new(harness.config.clone(), harness.deps(), rx)
        .execute()
        .await;

    assert_eq!(summary.final_state, RunState::Failed);
    assert!(summary.was_cancelled());
    assert_eq!(summary.exit_code(), EXIT_CANCELLED);
    assert_eq!(harness.resolver.calls(), 0);
}

#[tokio::test]
async fn test_persisted_registry_keeps_surrogates_across_runs() {
    let payload = feature_collection(&[&owner_feature(1, "1234567890")]);
    let mut surrogates = Vec::new();
    let registry_dir = tempfile::TempDir::new().unwrap();

    for _ in 0..2 {
        let transport = FakeTransport::default().with_file("EJF.zip", 1, zip_archive(&payload));
        let mut harness = Harness::new(transport);
        harness.config.privacy.registry = RegistryMode::Persisted;
        harness.config.privacy.registry_path = Some(registry_dir.path().join("registry.json"));

        let summary = run(&harness).await;
        assert!(summary.is_successful(), "{:?}", summary.errors);
        let batches = read_artifact(&harness.stored(summary.artifact_key.as_deref().unwrap()));
        surrogates.push(strings(&batches, "ejendePerson.id")[0].clone());
    }

    assert_eq!(surrogates[0], surrogates[1]);
    let saved = std::fs::read_to_string(registry_dir.path().join("registry.json")).unwrap();
    assert!(!saved.contains("1234567890"));
}

#[tokio::test]
async fn test_ephemeral_registry_changes_surrogates_across_runs() {
    let payload = feature_collection(&[&owner_feature(1, "1234567890")]);
    let mut surrogates = Vec::new();

    for _ in 0..2 {
        let transport = FakeTransport::default().with_file("EJF.zip", 1, zip_archive(&payload));
        let harness = Harness::new(transport);
        let summary = run(&harness).await;
        let batches = read_artifact(&harness.stored(summary.artifact_key.as_deref().unwrap()));
        surrogates.push(strings(&batches, "ejendePerson.id")[0].clone());
    }

    assert_ne!(surrogates[0], surrogates[1]);
}
