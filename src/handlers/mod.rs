pub mod admin;
pub mod tasks;
pub mod webhook;

use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::AppResult;
use crate::repository::*;
use crate::services::*;
use crate::utils::ApiResponse;

/// Application state shared across all handlers
pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: PgPool,
    pub started_at: Instant,

    // Repositories
    pub tenant_repo: Arc<TenantRepository>,
    pub business_repo: Arc<BusinessRepository>,
    pub job_repo: Arc<JobRepository>,
    pub counter_repo: Arc<CounterRepository>,
    pub session_repo: Arc<SessionRepository>,
    pub invoice_repo: Arc<GeneratedInvoiceRepository>,

    // Services
    pub ingest_service: Arc<IngestService>,
    pub pipeline_service: Arc<PipelineService>,
    pub callback_service: Arc<CallbackService>,
    pub onboarding_service: Arc<OnboardingService>,
    pub invoicegen_service: Arc<InvoiceGenService>,
    pub report_service: Arc<ReportService>,
}

/// Health check endpoint
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "SCRIBE Backend",
        "uptime": state.started_at.elapsed().as_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Job counters by status and recent failures, for the dashboard.
pub async fn metrics(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let snapshot = state.report_service.metrics().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(snapshot)))
}
