use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::Deserialize;

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::utils::constant_time_eq;
use crate::utils::ApiResponse;

/// Confusable-free alphabet: no 0/O, no 1/I/L.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;
const DEFAULT_EXPIRY_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct CreateInviteCodeRequest {
    #[serde(default)]
    pub expires_in_days: Option<i64>,
    #[serde(default)]
    pub note: Option<String>,
}

pub fn generate_invite_code<R: Rng>(rng: &mut R) -> String {
    let suffix: String = (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    format!("INV-{}", suffix)
}

/// POST /admin/invite-codes - mint a one-time admission token. Guarded by
/// the admin password header; no password configured means no admin
/// surface.
pub async fn create_invite_code(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateInviteCodeRequest>,
) -> AppResult<HttpResponse> {
    let supplied = req
        .headers()
        .get("X-Admin-Password")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if state.config.admin_password.is_empty()
        || !constant_time_eq(supplied, &state.config.admin_password)
    {
        return Err(AppError::NotFound("Not found".to_string()));
    }

    let expires_at =
        Utc::now() + Duration::days(body.expires_in_days.unwrap_or(DEFAULT_EXPIRY_DAYS));
    let code = generate_invite_code(&mut rand::thread_rng());
    let invite = state
        .tenant_repo
        .create_invite_code(&code, "admin", expires_at, body.note.as_deref())
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::success(invite, "Invite code created")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validator::is_valid_invite_code;

    #[test]
    fn generated_codes_match_the_wire_format() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let code = generate_invite_code(&mut rng);
            assert!(is_valid_invite_code(&code), "bad code: {}", code);
        }
    }
}
