use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::common::test_config;
use crate::services::chat_service::InlineButton;
use crate::services::ChatService;

async fn service(server: &MockServer) -> ChatService {
    let mut config = test_config();
    config.chat_api_url = server.uri();
    ChatService::new(Arc::new(config))
}

#[tokio::test]
async fn send_message_posts_markdown_with_reply_and_buttons() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottest-token/sendMessage"))
        .and(body_partial_json(json!({
            "chat_id": -1001,
            "parse_mode": "Markdown",
            "reply_to_message_id": 42,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": 77 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let buttons = vec![vec![InlineButton {
        text: "Keep both".to_string(),
        callback_data: "keep_both:-1001_42".to_string(),
    }]];
    let message_id = service(&server)
        .await
        .send_message(-1001, "warning", Some(42), Some(buttons))
        .await
        .unwrap();
    assert_eq!(message_id, 77);
}

#[tokio::test]
async fn api_level_failure_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottest-token/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "description": "Bad Request: chat not found"
        })))
        .mount(&server)
        .await;

    let result = service(&server).await.send_message(-1001, "hi", None, None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn download_resolves_the_path_then_fetches_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottest-token/getFile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "file_path": "documents/file_9.pdf", "file_size": 1024 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file/bottest-token/documents/file_9.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.5 fake".to_vec()))
        .mount(&server)
        .await;

    let downloaded = service(&server).await.download_file("F9").await.unwrap();
    assert_eq!(downloaded.file_path, "documents/file_9.pdf");
    assert_eq!(downloaded.bytes, b"%PDF-1.5 fake");
}

#[tokio::test]
async fn oversized_file_is_refused_before_the_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottest-token/getFile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "file_path": "big.bin", "file_size": 6 * 1024 * 1024 }
        })))
        .mount(&server)
        .await;

    let result = service(&server).await.download_file("F9").await;
    assert!(result.is_err());
}
