use serde_json::json;
use std::collections::BTreeSet;
use strata_core::prelude::*;
use strata_http::Method;
use strata_idp::*;
use strata_mock::{ManualClock, MockTransport};

fn clients(mock: &MockTransport) -> (IdpClient<MockTransport, ManualClock>, GovernanceClient<MockTransport, ManualClock>) {
    let config = IdpConfig::new("acme", None, "token").unwrap();
    let clock = ManualClock::starting_at(1_700_000_000);
    (
        IdpClient::with_transport(&config, mock.clone(), clock.clone()),
        GovernanceClient::with_transport(&config, mock.clone(), clock),
    )
}

fn source_tenant() -> MockTransport {
    let mock = MockTransport::new();
    mock.on_json(
        Method::GET,
        "/governance/api/v1/entitlement-bundles",
        200,
        &json!({"data": [
            {"id": "enb1", "name": "CRM Admins", "status": "ACTIVE",
             "target": [{"externalId": "0oa1", "type": "APPLICATION"}]}
        ]}),
    );
    mock.on_json(
        Method::GET,
        "/governance/api/v1/grants",
        200,
        &json!({"data": [
            {"id": "gr1", "bundle": {"id": "enb1"}, "principal": {"id": "u1", "type": "USER"}},
            {"id": "gr2", "bundle": {"id": "enb1"}, "principal": {"id": "g1", "type": "GROUP"}},
            {"id": "gr3", "bundle": {"id": "enb-gone"}, "principal": {"id": "g1", "type": "GROUP"}}
        ]}),
    );
    mock.on_json(Method::GET, "/api/v1/apps", 200, &json!([{"id": "0oa1", "label": "Sales CRM"}]));
    mock.on_json(
        Method::GET,
        "/api/v1/groups",
        200,
        &json!([{"id": "g1", "type": "OKTA_GROUP", "profile": {"name": "Sales Ops"}}]),
    );
    mock.on_json(
        Method::GET,
        "/api/v1/users",
        200,
        &json!([{"id": "u1", "profile": {"login": "alice@acme.com", "email": "alice@acme.com",
                 "firstName": "Alice", "lastName": "Smith"}}]),
    );
    mock
}

fn target_tenant() -> MockTransport {
    let mock = MockTransport::new();
    mock.on_json(
        Method::GET,
        "/governance/api/v1/entitlement-bundles",
        200,
        &json!([{"id": "tenb1", "name": "CRM Admins"}]),
    );
    mock.on_json(
        Method::GET,
        "/api/v1/groups",
        200,
        &json!([{"id": "tg1", "type": "OKTA_GROUP", "profile": {"name": "Sales Ops"}}]),
    );
    mock.on_json(
        Method::GET,
        "/api/v1/users",
        200,
        &json!([{"id": "t1", "profile": {"login": "asmith", "email": "alice@acme.com",
                 "firstName": "Alice", "lastName": "Smith"}}]),
    );
    mock.on_json(Method::POST, "/governance/api/v1/grants", 201, &json!({"id": "new"}));
    mock.on_json(
        Method::POST,
        "/governance/api/v1/grants",
        409,
        &json!({"errorSummary": "exists"}),
    );
    mock
}

async fn exported() -> GrantExport {
    let source = source_tenant();
    let (idp, governance) = clients(&source);
    export_grants(&idp, &governance, "2024-05-01T00:00:00Z".into())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn export_resolves_names_and_drops_unknown_bundles() {
    let export = exported().await;

    assert_eq!(export.source_org, "acme");
    assert_eq!(export.bundles.len(), 1);
    assert_eq!(export.bundles[0].target_app_name.as_deref(), Some("Sales CRM"));
    assert_eq!(export.grants.len(), 2);

    let user_grant = &export.grants[0];
    assert_eq!(user_grant.principal_type, "USER");
    assert_eq!(user_grant.principal_name, "Alice Smith");
    assert_eq!(user_grant.bundle_name, "CRM Admins");
    assert_eq!(user_grant.target_app_id.as_deref(), Some("0oa1"));
    assert_eq!(export.grants[1].principal_name, "Sales Ops");
}

#[tokio::test]
async fn import_creates_then_treats_conflict_as_existing() {
    let export = exported().await;
    let target = target_tenant();
    let (idp, governance) = clients(&target);

    let summary = import_grants(&idp, &governance, &export, &BTreeSet::new(), false)
        .await
        .unwrap();

    assert_eq!(
        summary,
        GrantImportSummary {
            created: 1,
            exists: 1,
            ..Default::default()
        }
    );

    let posts = target.mutating_calls();
    assert_eq!(posts.len(), 2);
    assert_eq!(
        posts[0].json_body(),
        Some(&json!({
            "principal": {"id": "t1", "type": "USER"},
            "bundle": {"id": "tenb1"},
            "grantType": "ENTITLEMENT-BUNDLE"
        }))
    );
    assert_eq!(posts[1].json_body().unwrap()["principal"]["id"], "tg1");
}

#[tokio::test]
async fn excluded_apps_and_dry_run_make_no_calls() {
    let export = exported().await;

    let target = target_tenant();
    let (idp, governance) = clients(&target);
    let excluded = BTreeSet::from(["Sales CRM".to_string()]);
    let summary = import_grants(&idp, &governance, &export, &excluded, false)
        .await
        .unwrap();
    assert_eq!(summary.excluded, 2);
    assert!(target.mutating_calls().is_empty());

    let target = target_tenant();
    let (idp, governance) = clients(&target);
    let summary = import_grants(&idp, &governance, &export, &BTreeSet::new(), true)
        .await
        .unwrap();
    assert_eq!(summary.created, 2);
    assert!(target.mutating_calls().is_empty());
}

#[tokio::test]
async fn unresolved_principals_are_skipped() {
    let mut export = exported().await;
    export.grants[1].principal_name = "Nobody".into();
    export.grants[0].bundle_name = "Gone".into();

    let target = target_tenant();
    let (idp, governance) = clients(&target);
    let summary = import_grants(&idp, &governance, &export, &BTreeSet::new(), false)
        .await
        .unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.errors, 0);
    assert!(target.mutating_calls().is_empty());
}

#[tokio::test]
async fn tenant_without_grants_exports_empty_list() {
    let mock = MockTransport::new();
    mock.on_json(
        Method::GET,
        "/governance/api/v1/entitlement-bundles",
        200,
        &json!([{"id": "enb1", "name": "Solo"}]),
    );
    let (idp, governance) = clients(&mock);

    let export = export_grants(&idp, &governance, "now".into()).await.unwrap().unwrap();
    assert!(export.grants.is_empty());
    assert_eq!(export.bundles[0].target_app_id, None);

    let empty = MockTransport::new();
    let (idp, governance) = clients(&empty);
    assert!(export_grants(&idp, &governance, "now".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn entitlement_settings_follow_status_codes_and_fallbacks() {
    let mock = MockTransport::new();
    mock.on_json(
        Method::GET,
        "/governance/api/v1/entitlement-settings/0oa1",
        200,
        &json!({"enabled": true}),
    );
    mock.on_status(Method::GET, "/governance/api/v1/entitlement-settings/0oa2", 400);
    mock.on_status(Method::POST, "/governance/api/v1/entitlement-settings", 400);
    mock.on_status(Method::PUT, "/governance/api/v1/entitlement-settings/0oa2", 200);
    let (_, governance) = clients(&mock);

    assert!(governance.entitlement_status("0oa1").await.unwrap().is_enabled());
    assert!(matches!(
        governance.entitlement_status("0oa2").await.unwrap(),
        EntitlementStatus::NotEligible { .. }
    ));
    assert_eq!(
        governance.entitlement_status("0oa3").await.unwrap(),
        EntitlementStatus::NotConfigured
    );

    assert_eq!(
        governance.enable_entitlements("0oa2", false).await.unwrap(),
        SettingChange::Success
    );
    let fallback = mock.requests().last().cloned().unwrap();
    assert_eq!(fallback.method, Method::PUT);
    assert_eq!(fallback.json_body(), Some(&json!({"enabled": true})));

    assert_eq!(
        governance.disable_entitlements("0oa9", false).await.unwrap(),
        SettingChange::NotEnabled
    );

    let before = mock.mutating_calls().len();
    assert_eq!(
        governance.enable_entitlements("0oa1", true).await.unwrap(),
        SettingChange::DryRun
    );
    assert_eq!(mock.mutating_calls().len(), before);
}

#[tokio::test]
async fn label_selector_uses_wildcards() {
    let mock = MockTransport::new();
    mock.on_json(
        Method::GET,
        "/api/v1/apps",
        200,
        &json!([
            {"id": "0oa1", "label": "Sales CRM"},
            {"id": "0oa2", "label": "Sales Portal"},
            {"id": "0oa3", "label": "HR Portal"}
        ]),
    );
    let (idp, _) = clients(&mock);

    let apps = select_apps(&idp, &AppSelector::Label("Sales*".into())).await.unwrap();
    assert_eq!(apps.len(), 2);

    assert!(matches!(
        select_apps(&idp, &AppSelector::Label("Finance*".into())).await,
        Err(IdpError::AppNotFound(_))
    ));
    assert!(matches!(
        select_apps(&idp, &AppSelector::Id("0oa404".into())).await,
        Err(IdpError::AppNotFound(_))
    ));
}
