use std::time::{Duration, Instant};

use redmine_cli_api::{ApiError, IssueUpdate, RedmineClient, RetryPolicy};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_millis(40);

fn client(server: &MockServer) -> RedmineClient {
    RedmineClient::new(server.uri(), "test-key")
        .unwrap()
        .with_retry_policy(RetryPolicy::new(3, WAIT))
}

#[tokio::test]
async fn two_transient_failures_then_success_waits_twice() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/issues/7.json"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/issues/7.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"issue": {"id": 7}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let started = Instant::now();
    let value = client(&mock_server).issue(7).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(value["issue"]["id"], 7);
    // Three requests, so exactly two fixed waits in between.
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
    assert!(
        elapsed >= WAIT * 2,
        "expected two waits of {WAIT:?}, got {elapsed:?}"
    );
}

#[tokio::test]
async fn server_errors_exhaust_the_attempt_bound() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/issues/7.json"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal error"))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).issue(7).await.unwrap_err();

    assert!(matches!(err, ApiError::ServerError { status: 500, .. }));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn permanent_rejections_are_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/issues/7.json"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "errors": ["Status is not included in the list"]
        })))
        .mount(&mock_server)
        .await;

    let update = IssueUpdate::new().notes("ping");
    let err = client(&mock_server)
        .update_issue(7, &update)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Rejected { status: 422, .. }));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn rate_limiting_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/issues/7.json"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/issues/7.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"issue": {"id": 7}})))
        .mount(&mock_server)
        .await;

    let value = client(&mock_server).issue(7).await.unwrap();

    assert_eq!(value["issue"]["id"], 7);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn writes_retry_like_reads() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/issues/7.json"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/issues/7.json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let update = IssueUpdate::new().notes("retry me");
    client(&mock_server).update_issue(7, &update).await.unwrap();

    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}
