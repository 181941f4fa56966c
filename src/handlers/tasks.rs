use actix_web::{web, HttpResponse};

use super::AppState;
use crate::error::AppResult;
use crate::models::{
    CallbackTask, CancelTask, FailureTask, InvoiceCallbackTask, InvoiceCommandTask,
    InvoiceMessageTask, OnboardCommandTask, OnboardMessageTask, OnboardPhotoTask, ReportTask,
    TaskPayload,
};
use crate::utils::validator::validate_request;
use crate::utils::ApiResponse;

/// POST /tasks/ingest - run the pipeline for one inbound document.
/// 200 carries the terminal disposition; transient failures propagate as
/// 5xx so the queue redelivers.
pub async fn ingest(
    state: web::Data<AppState>,
    body: web::Json<TaskPayload>,
) -> AppResult<HttpResponse> {
    let payload = body.into_inner();
    validate_request(&payload)?;
    let result = state.pipeline_service.process(&payload).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_message(result.as_str())))
}

/// POST /tasks/callback - duplicate resolution and onboarding buttons.
pub async fn callback(
    state: web::Data<AppState>,
    body: web::Json<CallbackTask>,
) -> AppResult<HttpResponse> {
    let task = body.into_inner();
    validate_request(&task)?;
    if task.data.starts_with("onb:") {
        state.onboarding_service.handle_callback(&task).await?;
    } else {
        state.callback_service.handle(&task).await?;
    }
    Ok(HttpResponse::Ok().json(ApiResponse::success_message("handled")))
}

/// POST /tasks/onboard - the /onboard command.
pub async fn onboard(
    state: web::Data<AppState>,
    body: web::Json<OnboardCommandTask>,
) -> AppResult<HttpResponse> {
    let outcome = state.onboarding_service.handle_command(&body).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_message(outcome)))
}

/// POST /tasks/onboard-message - conversational onboarding input.
pub async fn onboard_message(
    state: web::Data<AppState>,
    body: web::Json<OnboardMessageTask>,
) -> AppResult<HttpResponse> {
    state.onboarding_service.handle_message(&body).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_message("handled")))
}

/// POST /tasks/onboard-photo - a logo candidate.
pub async fn onboard_photo(
    state: web::Data<AppState>,
    body: web::Json<OnboardPhotoTask>,
) -> AppResult<HttpResponse> {
    state.onboarding_service.handle_photo(&body).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_message("handled")))
}

/// POST /tasks/invoice-command - the /invoice command.
pub async fn invoice_command(
    state: web::Data<AppState>,
    body: web::Json<InvoiceCommandTask>,
) -> AppResult<HttpResponse> {
    state.invoicegen_service.handle_command(&body).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_message("handled")))
}

/// POST /tasks/invoice-message - conversational invoice-generation input.
pub async fn invoice_message(
    state: web::Data<AppState>,
    body: web::Json<InvoiceMessageTask>,
) -> AppResult<HttpResponse> {
    state.invoicegen_service.handle_message(&body).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_message("handled")))
}

/// POST /tasks/invoice-callback - invoice-generation buttons.
pub async fn invoice_callback(
    state: web::Data<AppState>,
    body: web::Json<InvoiceCallbackTask>,
) -> AppResult<HttpResponse> {
    state.invoicegen_service.handle_callback(&body).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_message("handled")))
}

/// POST /tasks/report - the /report command.
pub async fn report(
    state: web::Data<AppState>,
    body: web::Json<ReportTask>,
) -> AppResult<HttpResponse> {
    state.report_service.handle(&body).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_message("handled")))
}

/// POST /tasks/cancel - /cancel inside a conversational flow. Clears
/// whichever session is active; onboarding wins when both exist.
pub async fn cancel(
    state: web::Data<AppState>,
    body: web::Json<CancelTask>,
) -> AppResult<HttpResponse> {
    let cancelled = state
        .onboarding_service
        .handle_cancel(body.tenant_id)
        .await?;
    if !cancelled {
        state
            .invoicegen_service
            .handle_cancel(body.tenant_id, body.user_id)
            .await?;
    }
    Ok(HttpResponse::Ok().json(ApiResponse::success_message("handled")))
}

/// POST /tasks/failure - the queue reports an exhausted task; the user
/// gets a short "failed after retries" note.
pub async fn failure(
    state: web::Data<AppState>,
    body: web::Json<FailureTask>,
) -> AppResult<HttpResponse> {
    state
        .pipeline_service
        .notify_exhausted(body.tenant_id, body.message_id)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_message("notified")))
}
