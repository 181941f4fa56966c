use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    // Validation errors
    ValidationError(String),
    BadRequest(String),

    // Resource errors
    NotFound(String),
    Conflict(String),

    // Database errors
    DatabaseError(String),

    // External service errors
    ChatApiError(String),
    StorageError(String),
    SheetsError(String),
    QueueError(String),
    RendererError(String),
    ExtractionError(String),

    // Transient I/O (timeouts, 5xx from collaborators) - the queue retries these
    Transient(String),

    // Internal errors
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::ChatApiError(msg) => write!(f, "Chat API error: {}", msg),
            AppError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            AppError::SheetsError(msg) => write!(f, "Sheets error: {}", msg),
            AppError::QueueError(msg) => write!(f, "Queue error: {}", msg),
            AppError::RendererError(msg) => write!(f, "Renderer error: {}", msg),
            AppError::ExtractionError(msg) => write!(f, "Extraction error: {}", msg),
            AppError::Transient(msg) => write!(f, "Transient error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, code, message) = match self {
            AppError::ValidationError(msg) => {
                (actix_web::http::StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::BadRequest(msg) => {
                (actix_web::http::StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone())
            }
            AppError::NotFound(msg) => {
                (actix_web::http::StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone())
            }
            AppError::Conflict(msg) => {
                (actix_web::http::StatusCode::CONFLICT, "CONFLICT", msg.clone())
            }
            AppError::DatabaseError(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                msg.clone(),
            ),
            // Collaborator failures are retryable from the queue's point of view
            AppError::ChatApiError(msg) => {
                (actix_web::http::StatusCode::BAD_GATEWAY, "CHAT_API_ERROR", msg.clone())
            }
            AppError::StorageError(msg) => {
                (actix_web::http::StatusCode::BAD_GATEWAY, "STORAGE_ERROR", msg.clone())
            }
            AppError::SheetsError(msg) => {
                (actix_web::http::StatusCode::BAD_GATEWAY, "SHEETS_ERROR", msg.clone())
            }
            AppError::QueueError(msg) => {
                (actix_web::http::StatusCode::BAD_GATEWAY, "QUEUE_ERROR", msg.clone())
            }
            AppError::RendererError(msg) => {
                (actix_web::http::StatusCode::BAD_GATEWAY, "RENDERER_ERROR", msg.clone())
            }
            AppError::ExtractionError(msg) => {
                (actix_web::http::StatusCode::BAD_GATEWAY, "EXTRACTION_ERROR", msg.clone())
            }
            AppError::Transient(msg) => (
                actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                "TRANSIENT_ERROR",
                msg.clone(),
            ),
            AppError::InternalError(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "success": false,
            "error": {
                "code": code,
                "message": message
            }
        }))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::DatabaseError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("HTTP request error: {:?}", err);
        AppError::Transient(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Anyhow error: {:?}", err);
        AppError::InternalError(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
