use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use weights_rs::{JobStatus, PollOptions, WeightsClient, WeightsError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn status_body(status: &str, modified: &str) -> serde_json::Value {
    serde_json::json!({
        "imageId": "img_1",
        "status": status,
        "lastModifiedDate": modified,
    })
}

async fn mount_healthy(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(server)
        .await;
}

async fn mount_submit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/generateImage"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"success": true, "imageId": "img_1"})),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn first_poll_completed_returns_without_second_poll() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    Mock::given(method("GET"))
        .and(path("/status/img_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("COMPLETED", "t1")))
        .expect(1)
        .mount(&server)
        .await;

    let client = WeightsClient::new(server.uri());
    let mut updates = Vec::new();
    let snapshot = client
        .generate_progressive("a cat", None, |u| updates.push(u))
        .await
        .unwrap();

    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.image_id, "img_1");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].status, JobStatus::Completed);
    assert_eq!(updates[0].image_id, "img_1");
}

#[tokio::test]
async fn callback_fires_only_when_modified_date_changes() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    // Poll 1 and 2 report the same token, poll 3 completes with a new one.
    Mock::given(method("GET"))
        .and(path("/status/img_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("PENDING", "t0")))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status/img_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("COMPLETED", "t1")))
        .expect(1)
        .mount(&server)
        .await;

    let client = WeightsClient::new(server.uri());
    let options = PollOptions::default().with_interval(Duration::from_millis(10));
    let mut updates = Vec::new();
    let snapshot = client
        .generate_progressive_with("a cat", None, options, |u| updates.push(u.status))
        .await
        .unwrap();

    // First observation plus the one real transition; the unchanged
    // second poll is silent.
    assert_eq!(updates, vec![JobStatus::Pending, JobStatus::Completed]);
    assert_eq!(snapshot.last_modified_date.as_deref(), Some("t1"));
}

#[tokio::test]
async fn failed_poll_raises_generation_failed_with_server_error() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    Mock::given(method("GET"))
        .and(path("/status/img_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("PENDING", "t0")))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status/img_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "imageId": "img_1",
            "status": "FAILED",
            "lastModifiedDate": "t1",
            "error": "model exploded",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = WeightsClient::new(server.uri());
    let options = PollOptions::default().with_interval(Duration::from_millis(10));
    let mut updates = Vec::new();
    let err = client
        .generate_progressive_with("a cat", None, options, |u| updates.push(u.status))
        .await
        .unwrap_err();

    assert!(matches!(err, WeightsError::GenerationFailed(_)));
    assert!(err.to_string().contains("model exploded"));
    assert_eq!(updates, vec![JobStatus::Pending, JobStatus::Failed]);
}

#[tokio::test]
async fn first_poll_failed_fails_immediately() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    Mock::given(method("GET"))
        .and(path("/status/img_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "imageId": "img_1",
            "status": "FAILED",
            "lastModifiedDate": "t0",
            "error": "invalid prompt",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = WeightsClient::new(server.uri());
    let mut updates = Vec::new();
    let err = client
        .generate_progressive("a cat", None, |u| updates.push(u.status))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("invalid prompt"));
    assert_eq!(updates, vec![JobStatus::Failed]);
}

#[tokio::test]
async fn health_failure_prevents_submission_and_polling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/generateImage"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status/img_1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = WeightsClient::new(server.uri());
    let err = client
        .generate_progressive("a cat", None, |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, WeightsError::Unreachable { .. }));
    assert!(err.to_string().contains("health probe returned HTTP 500"));
}

#[tokio::test]
async fn deadline_elapsed_times_out() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    Mock::given(method("GET"))
        .and(path("/status/img_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("PENDING", "t0")))
        .mount(&server)
        .await;

    let client = WeightsClient::new(server.uri());
    let options = PollOptions::default()
        .with_interval(Duration::from_millis(20))
        .with_deadline(Duration::from_millis(100));
    let err = client
        .generate_progressive_with("a cat", None, options, |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, WeightsError::Timeout));
}

#[tokio::test]
async fn cancellation_flag_stops_polling() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    Mock::given(method("GET"))
        .and(path("/status/img_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("PENDING", "t0")))
        .mount(&server)
        .await;

    let client = WeightsClient::new(server.uri());
    let cancel = Arc::new(AtomicBool::new(false));
    let trigger = cancel.clone();
    let options = PollOptions::default()
        .with_interval(Duration::from_millis(10))
        .with_cancellation(cancel);

    // Abort as soon as the first observation arrives.
    let err = client
        .generate_progressive_with("a cat", None, options, move |_| {
            trigger.store(true, Ordering::Relaxed);
        })
        .await
        .unwrap_err();

    assert!(matches!(err, WeightsError::Cancelled));
}
