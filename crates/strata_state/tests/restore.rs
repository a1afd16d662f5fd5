use bytes::Bytes;
use strata_core::prelude::*;
use strata_mock::{MemoryStateStore, ScriptedProvisioner};
use strata_state::*;

const KEY: &str = "env/acme/terraform.tfstate";

fn store_with_history() -> (MemoryStateStore, String, String) {
    let store = MemoryStateStore::new("tf-state");
    let old = store.seed(KEY, r#"{"serial": 1}"#);
    let current = store.seed(KEY, r#"{"serial": 2}"#);
    (store, old, current)
}

#[tokio::test]
async fn restoring_twice_writes_new_versions_with_target_content() {
    let (store, old, current) = store_with_history();
    let restore = StateRestore::new(store.clone(), KEY);

    let first = restore.restore_state(&old, false).await.unwrap();
    let second = restore.restore_state(&old, false).await.unwrap();

    let (RestoreOutcome::Restored { previous: p1, new: n1, .. }, RestoreOutcome::Restored { previous: p2, new: n2, restored_from }) =
        (first, second)
    else {
        panic!("both restores should write a new version");
    };
    assert_eq!(p1.as_deref(), Some(current.as_str()));
    assert_eq!(p2, n1);
    assert_ne!(n1, n2);
    assert_eq!(restored_from, old);
    assert_eq!(store.current(KEY).unwrap(), Bytes::from(r#"{"serial": 1}"#));
    assert_eq!(store.put_count(), 2);
}

#[tokio::test]
async fn current_target_is_a_no_op() {
    let (store, _, current) = store_with_history();

    let outcome = StateRestore::new(store.clone(), KEY)
        .restore_state(&current, false)
        .await
        .unwrap();

    assert_eq!(outcome, RestoreOutcome::AlreadyCurrent { version_id: current });
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let (store, old, current) = store_with_history();

    let outcome = StateRestore::new(store.clone(), KEY)
        .restore_state(&old, true)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RestoreOutcome::DryRun {
            current: Some(current),
            would_restore: old,
        }
    );
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn unknown_version_is_an_error() {
    let (store, _, _) = store_with_history();

    let err = StateRestore::new(store.clone(), KEY)
        .restore_state("v9999", false)
        .await
        .unwrap_err();

    assert!(matches!(err, RestoreError::Store(StateStoreError::VersionNotFound(_))));
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn lists_versions_newest_first() {
    let (store, old, current) = store_with_history();

    let versions = StateRestore::new(store, KEY).list_versions(10).await.unwrap();

    let ids: Vec<&str> = versions.iter().map(|v| v.version_id.as_str()).collect();
    assert_eq!(ids, vec![current.as_str(), old.as_str()]);
    assert!(versions[0].is_latest);
}

#[tokio::test]
async fn full_restore_runs_init_plan_apply_and_discards_plan() {
    let (store, old, _) = store_with_history();
    let tool = ScriptedProvisioner::new("environments/acme/terraform");

    let report = StateRestore::new(store, KEY)
        .full_restore(&tool, &old, false, true)
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.provisioning.status(), "applied");
    assert!(matches!(report.state, RestoreOutcome::Restored { .. }));
    assert_eq!(tool.calls(), vec!["init", "plan", "apply -auto-approve", "discard"]);
}

#[tokio::test]
async fn dry_run_full_restore_plans_then_discards() {
    let (store, old, _) = store_with_history();
    let tool = ScriptedProvisioner::new("tf");

    let report = StateRestore::new(store.clone(), KEY)
        .full_restore(&tool, &old, true, false)
        .await
        .unwrap();

    assert_eq!(report.provisioning.status(), "dry_run");
    assert!(report.is_success());
    assert_eq!(tool.calls(), vec!["init", "plan", "discard"]);
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn init_failure_stops_before_plan() {
    let tool = ScriptedProvisioner::new("tf").failing_init(1);

    let outcome = run_provisioning(&tool, false, true).await.unwrap();

    assert_eq!(outcome.status(), "init_failed");
    assert_eq!(outcome.error(), Some("init failed"));
    assert_eq!(tool.calls(), vec!["init"]);
}

#[tokio::test]
async fn plan_failure_skips_apply_and_discards() {
    let tool = ScriptedProvisioner::new("tf").failing_plan(1);

    let outcome = run_provisioning(&tool, false, true).await.unwrap();

    assert_eq!(outcome.status(), "plan_failed");
    assert!(!outcome.is_success());
    assert_eq!(tool.calls(), vec!["init", "plan", "discard"]);
}

#[tokio::test]
async fn apply_failure_still_discards_plan() {
    let tool = ScriptedProvisioner::new("tf").failing_apply(2);

    let outcome = run_provisioning(&tool, false, false).await.unwrap();

    assert_eq!(outcome.status(), "apply_failed");
    assert_eq!(outcome.error(), Some("apply failed"));
    assert_eq!(tool.calls(), vec!["init", "plan", "apply", "discard"]);
}

#[test]
fn target_from_state_manifest() {
    let raw = r#"{
        "version": "2.0",
        "backup_type": "state-based",
        "snapshot_id": "2025-01-15T10-30-00",
        "environment": "acme",
        "org_name": "acme",
        "created_at": "2025-01-15T10:30:00Z",
        "created_by": "ci",
        "terraform_state": {"source": "s3", "bucket": "tf-state", "key": "k", "region": "eu-west-1", "version_id": "v7"}
    }"#;
    let manifest = SnapshotManifest::from_slice(raw.as_bytes()).unwrap();

    let target = RestoreTarget::from_manifest(&manifest).unwrap();

    assert_eq!(target.version_id, "v7");
    assert_eq!(target.location.region, "eu-west-1");
    assert_eq!(target.environment.as_deref(), Some("acme"));
    assert_eq!(
        default_terraform_dir("acme"),
        std::path::PathBuf::from("environments/acme/terraform")
    );
}

#[test]
fn local_state_manifest_cannot_be_restored() {
    let raw = r#"{
        "version": "2.0",
        "backup_type": "state-based",
        "snapshot_id": "s",
        "org_name": "acme",
        "created_at": "2025-01-15T10:30:00Z",
        "created_by": "ci",
        "terraform_state": {"source": "local", "original_path": "a", "backup_path": "b",
                            "sha256": "00", "size_bytes": 2, "modified": "2025-01-15T10:30:00Z"}
    }"#;
    let manifest = SnapshotManifest::from_slice(raw.as_bytes()).unwrap();

    assert!(matches!(
        RestoreTarget::from_manifest(&manifest),
        Err(RestoreError::LocalState)
    ));
}
