use serde_json::json;
use strata_core::prelude::*;
use strata_gateway::*;
use strata_http::Method;
use strata_mock::{ManualClock, MockTransport};

const TOKEN: &str = "/api/v2/oauth/token";
const APPS: &str = "/api/v2/apps";

fn config() -> GatewayConfig {
    GatewayConfig::new(
        Some("gw.example.com".into()),
        Some("client-1".into()),
        None,
        Some("unused".into()),
    )
    .unwrap()
}

fn manager(mock: &MockTransport, clock: &ManualClock) -> ApplicationManager<MockTransport, ManualClock> {
    let config = config();
    let signer = AssertionSigner::hs256(&config.client_id, &config.base_url(), &config.scope(), b"secret");
    ApplicationManager::new(GatewayClient::with_transport(&config, signer, mock.clone(), clock.clone()))
}

fn token(mock: &MockTransport, access_token: &str) {
    mock.on_json(
        Method::POST,
        TOKEN,
        200,
        &json!({"access_token": access_token, "expires_in": 3600, "token_type": "Bearer"}),
    );
}

fn bearer(request: &strata_http::ApiRequest) -> Option<String> {
    request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn wiki() -> AppConfig {
    serde_json::from_value(json!({
        "label": "Wiki",
        "public_domain": "wiki.example.com",
        "description": "Team wiki",
        "protected_resources": [{"url": "http://10.0.0.5:8080"}],
        "policy": "Protected",
        "attributes": [
            {"field": "login", "name": "X-Remote-User"},
            {"field": "email", "name": "X-Email"}
        ]
    }))
    .unwrap()
}

#[tokio::test]
async fn token_is_requested_once_and_reused() {
    let mock = MockTransport::new();
    let clock = ManualClock::starting_at(1_700_000_000);
    token(&mock, "tok-1");
    mock.on_json(Method::GET, APPS, 200, &json!({"data": [{"id": "a1", "label": "Wiki"}]}));

    let manager = manager(&mock, &clock);
    let apps = manager.list_applications().await.unwrap();
    manager.list_applications().await.unwrap();

    assert_eq!(apps.len(), 1);
    assert_eq!(mock.calls_to(Method::POST, TOKEN), 1);
    let api_calls: Vec<_> = mock.requests().into_iter().filter(|r| r.url.ends_with(APPS)).collect();
    assert_eq!(api_calls.len(), 2);
    assert!(api_calls.iter().all(|r| bearer(r).as_deref() == Some("Bearer tok-1")));
}

#[tokio::test]
async fn token_request_carries_client_assertion() {
    let mock = MockTransport::new();
    let clock = ManualClock::starting_at(1_700_000_000);
    token(&mock, "tok-1");

    let manager = manager(&mock, &clock);
    let health = manager.client().health_check().await;
    assert!(health.is_healthy());
    assert_eq!(health.hostname, "gw.example.com");

    let request = mock.requests().into_iter().next().unwrap();
    assert_eq!(request.url, "https://gw.example.com/api/v2/oauth/token");
    let body = match &request.body {
        Some(strata_http::RequestBody::Form(fields)) => fields.clone(),
        other => panic!("expected form body, got {other:?}"),
    };
    let field = |name: &str| body.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone());
    assert_eq!(field("grant_type").as_deref(), Some("client_credentials"));
    assert_eq!(field("client_assertion_type").as_deref(), Some(ASSERTION_TYPE));
    assert!(field("client_assertion").is_some_and(|jwt| jwt.split('.').count() == 3));
    assert!(field("scope").is_some_and(|s| s.contains("okta.oag.app.manage")));
}

#[tokio::test]
async fn rejected_token_reports_unhealthy() {
    let mock = MockTransport::new();
    let clock = ManualClock::starting_at(1_700_000_000);
    mock.on_json(Method::POST, TOKEN, 400, &json!({"error": "invalid_client"}));

    let health = manager(&mock, &clock).client().health_check().await;

    assert!(!health.authenticated);
    assert_eq!(health.status, "unhealthy");
    assert!(health.error.unwrap().contains("Failed to obtain access token: 400"));
}

#[tokio::test]
async fn unauthorized_response_refreshes_token_and_retries() {
    let mock = MockTransport::new();
    let clock = ManualClock::starting_at(1_700_000_000);
    token(&mock, "tok-1");
    token(&mock, "tok-2");
    mock.on_status(Method::GET, APPS, 401);
    mock.on_json(Method::GET, APPS, 200, &json!([]));

    let apps = manager(&mock, &clock).list_applications().await.unwrap();

    assert!(apps.is_empty());
    assert_eq!(mock.calls_to(Method::POST, TOKEN), 2);
    let last = mock.requests().last().cloned().unwrap();
    assert_eq!(bearer(&last).as_deref(), Some("Bearer tok-2"));
}

#[tokio::test]
async fn expired_token_is_refreshed() {
    let mock = MockTransport::new();
    let clock = ManualClock::starting_at(1_700_000_000);
    token(&mock, "tok-1");
    token(&mock, "tok-2");
    mock.on_json(Method::GET, APPS, 200, &json!([]));

    let manager = manager(&mock, &clock);
    manager.list_applications().await.unwrap();
    strata_http::Clock::sleep(&clock, std::time::Duration::from_secs(3_550)).await;
    manager.list_applications().await.unwrap();

    assert_eq!(mock.calls_to(Method::POST, TOKEN), 2);
}

#[tokio::test]
async fn deploy_creates_app_attributes_and_policy() {
    let mock = MockTransport::new();
    let clock = ManualClock::starting_at(1_700_000_000);
    token(&mock, "tok");
    mock.on_json(Method::GET, APPS, 200, &json!([]));
    mock.on_json(Method::POST, APPS, 201, &json!({"id": "app9", "label": "Wiki"}));
    mock.on_json(Method::POST, "/api/v2/apps/app9/attributes", 201, &json!({"id": "at"}));
    mock.on_json(Method::POST, "/api/v2/apps/app9/policies", 201, &json!({"id": "p1"}));

    let result = manager(&mock, &clock).deploy_application(&wiki(), false).await.unwrap();

    assert_eq!(result.action, DeployAction::Create);
    assert_eq!(result.app_id.as_deref(), Some("app9"));
    assert_eq!(result.attributes.added, vec!["X-Remote-User", "X-Email"]);

    let create = mock
        .requests()
        .into_iter()
        .find(|r| r.method == Method::POST && r.url.ends_with(APPS))
        .unwrap();
    let body = create.json_body().unwrap();
    assert_eq!(body["type"], "header");
    assert_eq!(body["publicDomain"], "wiki.example.com");
    assert_eq!(body["protectedResources"][0]["weight"], 100);

    let policy = mock
        .requests()
        .into_iter()
        .find(|r| r.url.ends_with("/policies"))
        .unwrap();
    assert_eq!(policy.json_body().unwrap()["pattern"], "/*");
    assert_eq!(policy.json_body().unwrap()["type"], "Protected");
}

#[tokio::test]
async fn deploy_updates_existing_app_and_syncs_attributes() {
    let mock = MockTransport::new();
    let clock = ManualClock::starting_at(1_700_000_000);
    token(&mock, "tok");
    mock.on_json(Method::GET, APPS, 200, &json!([{"id": "a1", "label": "Wiki"}]));
    mock.on_json(Method::PUT, "/api/v2/apps/a1", 200, &json!({"id": "a1"}));
    mock.on_json(
        Method::GET,
        "/api/v2/apps/a1/attributes",
        200,
        &json!([
            {"id": "x1", "name": "X-Remote-User", "dataSource": "IDP", "field": "login", "targetType": "Header"},
            {"id": "x2", "name": "X-Email", "dataSource": "IDP", "field": "login", "targetType": "Header"},
            {"id": "x3", "name": "X-Legacy", "dataSource": "IDP", "field": "id", "targetType": "Header"}
        ]),
    );
    mock.on_json(Method::PUT, "/api/v2/apps/a1/attributes/x2", 200, &json!({"id": "x2"}));
    mock.on_status(Method::DELETE, "/api/v2/apps/a1/attributes/x3", 204);

    let result = manager(&mock, &clock).deploy_application(&wiki(), false).await.unwrap();

    assert_eq!(result.action, DeployAction::Update);
    assert_eq!(result.app_id.as_deref(), Some("a1"));
    assert_eq!(
        result.attributes,
        AttributeChanges {
            added: vec![],
            updated: vec!["X-Email".into()],
            deleted: vec!["X-Legacy".into()],
        }
    );
    assert_eq!(mock.calls_to(Method::POST, "/api/v2/apps/a1/attributes"), 0);
}

#[tokio::test]
async fn dry_run_deploy_makes_no_changes() {
    let mock = MockTransport::new();
    let clock = ManualClock::starting_at(1_700_000_000);
    token(&mock, "tok");
    mock.on_json(Method::GET, APPS, 200, &json!([]));

    let result = manager(&mock, &clock).deploy_application(&wiki(), true).await.unwrap();

    assert!(result.dry_run);
    assert_eq!(result.action, DeployAction::Create);
    assert!(result.app_id.is_none());
    let writes: Vec<_> = mock
        .mutating_calls()
        .into_iter()
        .filter(|r| !r.url.ends_with(TOKEN))
        .collect();
    assert!(writes.is_empty());
}

#[tokio::test]
async fn create_without_public_domain_is_rejected() {
    let mock = MockTransport::new();
    let clock = ManualClock::starting_at(1_700_000_000);
    let config = AppConfig {
        label: "Broken".into(),
        ..Default::default()
    };

    let err = manager(&mock, &clock).create_application(&config).await.unwrap_err();

    assert!(matches!(err, GatewayError::InvalidApp(_)));
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn import_reads_apps_and_tolerates_attribute_failures() {
    let mock = MockTransport::new();
    let clock = ManualClock::starting_at(1_700_000_000);
    token(&mock, "tok");
    mock.on_json(
        Method::GET,
        APPS,
        200,
        &json!({"data": [
            {"id": "a1", "label": "Wiki", "publicDomain": "wiki.example.com",
             "protectedResources": [{"url": "http://b1", "weight": 70}]},
            {"id": "a2", "label": "Jira"}
        ]}),
    );
    mock.on_json(
        Method::GET,
        "/api/v2/apps/a1/attributes",
        200,
        &json!([{"id": "x1", "name": "X-Remote-User", "field": "login"}]),
    );
    mock.on_status(Method::GET, "/api/v2/apps/a2/attributes", 500);

    let configs = manager(&mock, &clock).import_applications().await.unwrap();

    assert_eq!(configs.len(), 2);
    assert_eq!(configs[0].public_domain.as_deref(), Some("wiki.example.com"));
    assert_eq!(configs[0].protected_resources[0].weight, 70);
    assert_eq!(configs[0].attributes[0].source, "IDP");
    assert_eq!(configs[0].attributes[0].target_type, "Header");
    assert_eq!(configs[1].label, "Jira");
    assert!(configs[1].attributes.is_empty());
    assert_eq!(configs[1].description, "");
}
