use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::debug;

use super::AppState;
use crate::error::AppResult;
use crate::models::Update;
use crate::utils::constant_time_eq;

/// POST /webhook/{secret} - validate, classify, enqueue, return fast.
///
/// The secret path is compared in constant time before the body is even
/// parsed; a mismatch is a bare 404 with no diagnostic, keeping the path
/// unguessable. Schema failures return a generic 400.
pub async fn receive(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let secret = path.into_inner();
    if !constant_time_eq(&secret, &state.config.webhook_secret) {
        return Ok(HttpResponse::NotFound().json(json!({ "error": "Not found" })));
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            debug!("Webhook payload failed schema parse: {}", e);
            return Ok(HttpResponse::BadRequest().json(json!({ "error": "Invalid payload" })));
        }
    };

    let action = state.ingest_service.handle_update(&update).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "action": action })))
}
