use base64::Engine;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::common::test_config;
use crate::models::TaskPayload;
use crate::services::QueueService;

#[tokio::test]
async fn enqueue_builds_an_http_target_task_for_the_worker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(
            "/projects/scribe-test/locations/europe-west1/queues/ingest-tasks/tasks",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "t1" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config();
    config.queue_api_url = server.uri();
    let queue = QueueService::new(Arc::new(config));

    let payload = TaskPayload {
        tenant_id: -1001,
        message_id: 42,
        file_id: "F1".to_string(),
        uploader_username: "dana".to_string(),
        uploader_first_name: "Dana".to_string(),
        chat_title: "Acme Group".to_string(),
        received_at: chrono::Utc::now(),
    };
    queue.enqueue("/tasks/ingest", &payload).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let http_request = &body["task"]["httpRequest"];
    assert_eq!(http_request["url"], "http://worker.test/tasks/ingest");
    assert_eq!(http_request["httpMethod"], "POST");

    // the task body round-trips through base64 to the typed payload
    let encoded = http_request["body"].as_str().unwrap();
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
    let sent: TaskPayload = serde_json::from_slice(&decoded).unwrap();
    assert_eq!(sent.tenant_id, -1001);
    assert_eq!(sent.message_id, 42);
    assert_eq!(sent.file_id, "F1");
}

#[tokio::test]
async fn queue_rejection_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let mut config = test_config();
    config.queue_api_url = server.uri();
    let queue = QueueService::new(Arc::new(config));

    let result = queue.enqueue("/tasks/ingest", &json!({ "x": 1 })).await;
    assert!(result.is_err());
}
