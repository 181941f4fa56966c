use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /tasks/ingest`: one inbound document to run through the
/// pipeline. Deliveries are at-least-once; `(tenant_id, message_id)` is the
/// idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TaskPayload {
    pub tenant_id: i64,
    pub message_id: i64,
    #[validate(length(min = 1, message = "file_id must not be empty"))]
    pub file_id: String,
    #[serde(default)]
    pub uploader_username: String,
    #[serde(default)]
    pub uploader_first_name: String,
    #[serde(default)]
    pub chat_title: String,
    pub received_at: DateTime<Utc>,
}

/// Body of `POST /tasks/callback`: a duplicate-resolution button press.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CallbackTask {
    pub update_id: i64,
    #[validate(length(min = 1, message = "callback_id must not be empty"))]
    pub callback_id: String,
    pub tenant_id: i64,
    pub message_id: i64,
    pub user_id: i64,
    pub data: String,
}

/// Body of `POST /tasks/onboard`: the /onboard command, possibly carrying an
/// invite code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardCommandTask {
    pub tenant_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub chat_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
}

/// Body of `POST /tasks/onboard-message`: free text advancing onboarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardMessageTask {
    pub tenant_id: i64,
    pub user_id: i64,
    pub text: String,
}

/// Body of `POST /tasks/onboard-photo`: a logo candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardPhotoTask {
    pub tenant_id: i64,
    pub user_id: i64,
    pub file_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// Body of `POST /tasks/invoice-command`: the /invoice command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceCommandTask {
    pub tenant_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub username: String,
}

/// Body of `POST /tasks/invoice-message`: free text advancing invoice
/// generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceMessageTask {
    pub tenant_id: i64,
    pub user_id: i64,
    pub text: String,
}

/// Body of `POST /tasks/invoice-callback`: an inline-button press inside the
/// invoice-generation flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceCallbackTask {
    pub update_id: i64,
    pub callback_id: String,
    pub tenant_id: i64,
    pub user_id: i64,
    pub message_id: i64,
    pub data: String,
}

/// Body of `POST /tasks/report`: the /report command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportTask {
    pub tenant_id: i64,
    pub user_id: i64,
}

/// Body of `POST /tasks/cancel`: /cancel inside a conversational flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelTask {
    pub tenant_id: i64,
    pub user_id: i64,
}

/// Body of `POST /tasks/failure`: the queue reports a task that exhausted
/// its attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureTask {
    pub tenant_id: i64,
    pub message_id: i64,
}
