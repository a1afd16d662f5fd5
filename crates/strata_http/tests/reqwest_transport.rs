use strata_http::{ApiClient, Method, ReqwestTransport, StatusCode, SswsToken};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn rate_limited_request_is_retried_over_http() {
    let server = MockServer::start().await;

    // Reset lies in the past, so the retry goes out immediately.
    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("X-Rate-Limit-Reset", "0")
                .insert_header("X-Rate-Limit-Remaining", "0"),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .and(header("authorization", "SSWS token"))
        .and(query_param("limit", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": "00u1"}])))
        .expect(1)
        .mount(&server)
        .await;

    let api = ApiClient::new(
        format!("{}/api/v1", server.uri()),
        ReqwestTransport::new().unwrap(),
        SswsToken("token".into()),
    );

    let users: Vec<serde_json::Value> = api
        .get_json("users", &[("limit", "200".to_string())])
        .await
        .unwrap();

    assert_eq!(users.len(), 1);
}

#[tokio::test]
async fn error_status_is_surfaced_with_body() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/groups/g1"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let api = ApiClient::new(server.uri(), ReqwestTransport::new().unwrap(), SswsToken("t".into()));
    let err = api.delete("/api/v1/groups/g1").await.unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
    assert!(err.to_string().contains("forbidden"));

    let raw = api
        .send(api.request(Method::DELETE, "/api/v1/groups/g1"))
        .await
        .unwrap();
    assert_eq!(raw.status, StatusCode::FORBIDDEN);
}
