use chrono::{TimeZone, Utc};
use serde_json::json;
use strata_core::prelude::*;
use strata_http::Method;
use strata_mock::{ManualClock, MockTransport};
use strata_pam::*;

const TEAM: &str = "/v1/teams/acme";

fn config() -> PamConfig {
    PamConfig::new(Some("acme".into()), Some("key".into()), Some("secret".into()))
        .unwrap()
        .with_api_base("https://pam.test/v1/")
}

fn team(mock: &MockTransport) {
    mock.on_json(
        Method::POST,
        &format!("{TEAM}/service_token"),
        200,
        &json!({"bearer_token": "pam-token"}),
    );
    mock.on_json(
        Method::GET,
        &format!("{TEAM}/resource_groups"),
        200,
        &json!({"list": [{"id": "rg1", "name": "Production", "description": "Prod hosts"}]}),
    );
    mock.on_json(
        Method::GET,
        &format!("{TEAM}/resource_groups/rg1/projects"),
        200,
        &json!({"list": [{"id": "p1", "name": "Web Servers", "resource_group_id": "rg1"}]}),
    );
    mock.on_json(
        Method::GET,
        &format!("{TEAM}/groups"),
        200,
        &json!({"list": [{"id": "g1", "name": "SRE"}, {"id": "g2", "name": "sre"}]}),
    );
    mock.on_json(
        Method::GET,
        &format!("{TEAM}/gateway_setup_tokens"),
        200,
        &json!({"list": [{"id": "t1", "description": "EU gateway", "labels": {"region": "eu"}}]}),
    );
    mock.on_json(
        Method::GET,
        &format!("{TEAM}/resource_groups/rg1/projects/p1/secret_folders"),
        200,
        &json!({"list": [{"id": "f1", "name": "db creds"}]}),
    );
    mock.on_status(Method::GET, &format!("{TEAM}/security_policies"), 403);
}

fn importer(mock: &MockTransport) -> PamImporter<MockTransport, ManualClock> {
    let client = PamClient::with_transport(&config(), mock.clone(), ManualClock::starting_at(1_700_000_000));
    PamImporter::new(client)
}

fn generated_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn generates_blocks_and_import_commands() {
    let mock = MockTransport::new();
    team(&mock);
    let dir = tempfile::tempdir().unwrap();

    let report = importer(&mock)
        .import_all(dir.path(), true, generated_at())
        .await
        .unwrap();

    assert_eq!(
        report.summary,
        ImportSummary {
            resource_groups: 1,
            projects: 1,
            groups: 2,
            gateway_tokens: 1,
            secret_folders: 1,
            security_policies: 0,
            import_commands: 6,
        }
    );
    assert_eq!(
        report.artifacts.commands,
        vec![
            "terraform import oktapam_resource_group.production rg1",
            "terraform import oktapam_resource_group_project.web_servers rg1/p1",
            "terraform import oktapam_group.sre g1",
            "terraform import oktapam_group.sre_2 g2",
            "terraform import oktapam_gateway_setup_token.eu_gateway t1",
            "terraform import oktapam_secret_folder.web_servers_db_creds f1",
        ]
    );

    let tf = &report.artifacts.terraform;
    assert!(tf.contains("# Projects in Production"));
    assert!(tf.contains("project        = oktapam_resource_group_project.web_servers.id"));
    assert!(tf.contains("region = \"eu\""));
    assert!(report.artifacts.script.starts_with("#!/bin/bash\n"));
    assert!(report.artifacts.script.contains("# Generated: 2026-03-01T12:00:00Z"));
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let mock = MockTransport::new();
    team(&mock);
    let dir = tempfile::tempdir().unwrap();

    let report = importer(&mock)
        .import_all(dir.path(), true, generated_at())
        .await
        .unwrap();

    assert!(report.written.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(mock.mutating_calls().len(), 1, "only the token exchange");
}

#[tokio::test]
async fn writes_three_files_with_executable_script() {
    let mock = MockTransport::new();
    team(&mock);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("terraform");

    let report = importer(&mock)
        .import_all(&output, false, generated_at())
        .await
        .unwrap();
    let written = report.written.unwrap();

    assert_eq!(written.terraform, output.join(TERRAFORM_FILE));
    let export: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&written.export).unwrap()).unwrap();
    assert_eq!(export["team"], "acme");
    assert_eq!(export["groups"].as_array().unwrap().len(), 2);
    assert_eq!(export["exported_at"], "2026-03-01T12:00:00Z");
    assert_eq!(
        std::fs::read_to_string(&written.script).unwrap(),
        report.artifacts.script
    );

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&written.script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}

#[tokio::test]
async fn service_token_is_exchanged_once_and_sent_as_bearer() {
    let mock = MockTransport::new();
    team(&mock);

    importer(&mock).collect().await;

    assert_eq!(mock.calls_to(Method::POST, &format!("{TEAM}/service_token")), 1);
    let exchange = mock.requests().into_iter().next().unwrap();
    assert_eq!(
        exchange.json_body(),
        Some(&json!({"key_id": "key", "key_secret": "secret"}))
    );
    let last = mock.requests().last().cloned().unwrap();
    assert_eq!(
        last.headers.get("authorization").unwrap().to_str().unwrap(),
        "Bearer pam-token"
    );
}

#[tokio::test]
async fn failed_authentication_leaves_inventory_empty() {
    let mock = MockTransport::new();
    mock.on_status(Method::POST, &format!("{TEAM}/service_token"), 401);

    let inventory = importer(&mock).collect().await;

    assert_eq!(inventory, PamInventory::default());
}
