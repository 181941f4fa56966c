use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::common::test_config;
use crate::services::sheets_service::{SheetsService, INVOICES_HEADERS, INVOICES_TAB};

async fn service(server: &MockServer) -> SheetsService {
    let mut config = test_config();
    config.sheets_api_url = server.uri();
    SheetsService::new(Arc::new(config))
}

fn spreadsheet_meta(tabs: &[&str]) -> serde_json::Value {
    json!({
        "sheets": tabs
            .iter()
            .map(|t| json!({ "properties": { "title": t } }))
            .collect::<Vec<_>>()
    })
}

#[tokio::test]
async fn list_tabs_reads_spreadsheet_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/spreadsheets/sheet-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(spreadsheet_meta(&["Invoices", "2025"])),
        )
        .mount(&server)
        .await;

    let tabs = service(&server).await.list_tabs("sheet-1").await.unwrap();
    assert_eq!(tabs, vec!["Invoices".to_string(), "2025".to_string()]);
}

#[tokio::test]
async fn inaccessible_spreadsheet_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/spreadsheets/private"))
        .respond_with(ResponseTemplate::new(403).set_body_string("no access"))
        .mount(&server)
        .await;

    assert!(service(&server).await.list_tabs("private").await.is_err());
}

#[tokio::test]
async fn append_posts_user_entered_values_and_returns_the_range() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/spreadsheets/sheet-1/values/.*:append$"))
        .and(body_partial_json(json!({ "values": [["'2026-01-15", "ABC"]] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updates": { "updatedRange": "Invoices!A7:K7" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let row_id = service(&server)
        .await
        .append_row(
            "sheet-1",
            INVOICES_TAB,
            vec!["'2026-01-15".to_string(), "ABC".to_string()],
        )
        .await
        .unwrap();
    assert_eq!(row_id, "Invoices!A7:K7");
}

#[tokio::test]
async fn ensure_tab_is_a_no_op_when_the_tab_exists() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/spreadsheets/sheet-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(spreadsheet_meta(&[INVOICES_TAB])))
        .expect(1)
        .mount(&server)
        .await;

    service(&server)
        .await
        .ensure_tab("sheet-1", INVOICES_TAB, &INVOICES_HEADERS)
        .await
        .unwrap();
}

#[tokio::test]
async fn ensure_tab_creates_the_tab_and_writes_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/spreadsheets/sheet-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(spreadsheet_meta(&["Other"])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/spreadsheets/sheet-1:batchUpdate"))
        .and(body_partial_json(json!({
            "requests": [{ "addSheet": { "properties": { "title": INVOICES_TAB } } }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/spreadsheets/sheet-1/values/.*:append$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updates": { "updatedRange": "Invoices!A1:K1" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    service(&server)
        .await
        .ensure_tab("sheet-1", INVOICES_TAB, &INVOICES_HEADERS)
        .await
        .unwrap();
}
