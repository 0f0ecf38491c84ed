#![allow(clippy::unwrap_used)]
// Integration tests for `TenantClient` using wiremock.

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use leavesync_api::frames::Details;
use leavesync_api::{Error, OutboundFrame, PollResponse, TenantClient};

// ── Helpers ─────────────────────────────────────────────────────────

const POLL_TIMEOUT: Duration = Duration::from_secs(2);
const WAIT_HINT: Duration = Duration::from_millis(500);

async fn setup() -> (MockServer, TenantClient) {
    let server = MockServer::start().await;
    let client = TenantClient::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        "acme",
    );
    (server, client)
}

fn outbound(change_type: &str) -> OutboundFrame {
    let mut details = Details::new();
    details.insert("employee_id".into(), json!(12));
    OutboundFrame {
        change_type: change_type.into(),
        details,
        timestamp: "2026-03-01T09:30:00Z".into(),
        tenant_id: "acme".into(),
        source: "client".into(),
    }
}

// ── Polling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_poll_with_changes() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/tenants/acme/changes"))
        .and(query_param("since", "2026-03-01T09:00:00Z"))
        .and(query_param("timeout", "0.5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "has_changes": true,
            "change_type": "vacation_created",
            "details": { "vacation_id": 99 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .poll_changes("2026-03-01T09:00:00Z", WAIT_HINT, POLL_TIMEOUT)
        .await
        .unwrap();

    let PollResponse::Changed(changes) = result else {
        panic!("expected Changed, got {result:?}");
    };
    assert_eq!(changes.change_type, "vacation_created");
    assert_eq!(changes.details["vacation_id"], 99);
}

#[tokio::test]
async fn test_poll_without_changes() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/tenants/acme/changes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "has_changes": false })))
        .mount(&server)
        .await;

    let result = client.poll_changes("now", WAIT_HINT, POLL_TIMEOUT).await.unwrap();
    assert_eq!(result, PollResponse::Unchanged);
}

#[tokio::test]
async fn test_poll_tenant_with_url_characters() {
    let server = MockServer::start().await;
    let client = TenantClient::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        "acme?x=1",
    );

    Mock::given(method("GET"))
        .and(path("/api/tenants/acme%3Fx=1/changes"))
        .and(query_param("timeout", "0.5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "has_changes": false })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .poll_changes("2026-03-01T09:00:00Z", WAIT_HINT, POLL_TIMEOUT)
        .await
        .unwrap();
    assert_eq!(result, PollResponse::Unchanged);

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].url.query_pairs().all(|(k, _)| k != "x"));
}

#[tokio::test]
async fn test_poll_unprocessable_is_not_an_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/tenants/acme/changes"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad since"))
        .mount(&server)
        .await;

    let result = client.poll_changes("now", WAIT_HINT, POLL_TIMEOUT).await.unwrap();
    assert_eq!(result, PollResponse::Unprocessable);
}

#[tokio::test]
async fn test_poll_timeout() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/tenants/acme/changes"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "has_changes": false }))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let err = client
        .poll_changes("now", WAIT_HINT, Duration::from_millis(100))
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got: {err:?}");
    assert!(matches!(err, Error::Timeout { timeout_ms: 100 }));
}

#[tokio::test]
async fn test_poll_unexpected_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/tenants/acme/changes"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client.poll_changes("now", WAIT_HINT, POLL_TIMEOUT).await.unwrap_err();
    assert!(
        matches!(err, Error::UnexpectedStatus { status: 500, ref body } if body == "boom"),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn test_poll_garbage_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/tenants/acme/changes"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client.poll_changes("now", WAIT_HINT, POLL_TIMEOUT).await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { ref body, .. } if body == "<html>"));
}

#[tokio::test]
async fn test_poll_unreachable_server() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = TenantClient::with_client(
        reqwest::Client::new(),
        Url::parse(&format!("http://{addr}")).unwrap(),
        "acme",
    );

    let err = client.poll_changes("now", WAIT_HINT, POLL_TIMEOUT).await.unwrap_err();
    assert!(err.is_unreachable(), "expected unreachable, got: {err:?}");
}

// ── Notify ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_notify_posts_frame() {
    let (server, client) = setup().await;
    let frame = outbound("employee_hidden");

    Mock::given(method("POST"))
        .and(path("/api/tenants/acme/notify"))
        .and(body_json(&frame))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.notify(&frame, Duration::from_secs(3)).await.unwrap();
}

#[tokio::test]
async fn test_notify_rejects_redirect_and_error_statuses() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/tenants/acme/notify"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client
        .notify(&outbound("vacation_deleted"), Duration::from_secs(3))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));
}

// ── Health ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_ok() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(&server)
        .await;

    client.health(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_health_failure() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.health(Duration::from_secs(5)).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
}
