use chrono::{TimeZone, Utc};
use sha2::{Digest, Sha256};
use strata_core::prelude::*;
use strata_mock::MemoryStateStore;
use strata_state::*;

const KEY: &str = "env/acme/terraform.tfstate";

fn request(dir: &std::path::Path) -> BackupRequest {
    BackupRequest::new("acme", "acme-org", dir)
        .created_by("tester")
        .schedule(Schedule::Daily)
        .created_at(Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap())
}

#[tokio::test]
async fn remote_backup_records_current_version() {
    let store = MemoryStateStore::new("tf-state");
    store.seed(KEY, "old");
    let current = store.seed(KEY, "current state");
    let dir = tempfile::tempdir().unwrap();

    let outcome = StateBackup::new(store, KEY)
        .backup(&request(dir.path()), false)
        .await
        .unwrap();

    assert_eq!(outcome.manifest.snapshot_id, "2025-01-15T10-30-00");
    let CapturedState::S3(state) = outcome.manifest.captured_state().unwrap() else {
        panic!("expected a remote capture");
    };
    assert_eq!(state.version_id.as_deref(), Some(current.as_str()));
    assert_eq!(state.bucket, "tf-state");
    assert!(state.backup_path.is_none());
    assert!(!state.etag.as_deref().unwrap().contains('"'));

    let written = strata_fs::read_manifest(&outcome.manifest_path).await.unwrap();
    assert_eq!(written.environment.as_deref(), Some("acme"));
    assert_eq!(written.schedule, Schedule::Daily);
    assert!(!dir.path().join(STATE_FILE_NAME).exists());
}

#[tokio::test]
async fn download_hashes_content_at_captured_version() {
    let store = MemoryStateStore::new("tf-state");
    store.seed(KEY, "current state");
    let dir = tempfile::tempdir().unwrap();

    let outcome = StateBackup::new(store, KEY)
        .backup(&request(dir.path()), true)
        .await
        .unwrap();

    let CapturedState::S3(state) = outcome.manifest.captured_state().unwrap() else {
        panic!("expected a remote capture");
    };
    let copy = std::fs::read(dir.path().join(STATE_FILE_NAME)).unwrap();
    assert_eq!(copy, b"current state");
    assert_eq!(
        state.backup_sha256.as_deref(),
        Some(hex::encode(Sha256::digest(&copy)).as_str())
    );
}

#[tokio::test]
async fn missing_remote_state_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = StateBackup::new(MemoryStateStore::new("tf-state"), KEY)
        .backup(&request(dir.path()), false)
        .await;

    assert!(matches!(result, Err(BackupError::Store(StateStoreError::NotFound(_)))));
    assert!(!dir.path().join(MANIFEST_FILE_NAME).exists());
}

#[tokio::test]
async fn local_backup_copies_and_hashes() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("live.tfstate");
    std::fs::write(&source, r#"{"serial": 3}"#).unwrap();
    let output = dir.path().join("backup");

    let outcome = backup_local(&request(&output), &source).await.unwrap();

    let CapturedState::Local(state) = outcome.manifest.captured_state().unwrap() else {
        panic!("expected a local capture");
    };
    assert_eq!(state.size_bytes, 13);
    assert_eq!(state.sha256, hex::encode(Sha256::digest(br#"{"serial": 3}"#)));
    assert!(output.join(STATE_FILE_NAME).exists());
    assert!(output.join(MANIFEST_FILE_NAME).exists());
}

#[tokio::test]
async fn local_backup_of_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = backup_local(&request(dir.path()), &dir.path().join("nope.tfstate")).await;
    assert!(matches!(result, Err(BackupError::LocalStateNotFound(_))));
}
