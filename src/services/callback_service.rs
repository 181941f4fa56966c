use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{CallbackTask, JobStatus, Language};
use crate::repository::{BusinessRepository, JobRepository, SessionRepository};
use crate::services::{ChatService, PipelineService, StorageService};
use crate::utils::i18n::t;

/// Resolution of a duplicate-decision button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackResult {
    Resolved,
    Duplicate,
    Refused,
}

/// Handles duplicate-resolution callbacks: `keep_both:{job_id}` appends the
/// persisted extraction as a second row, `delete_new:{job_id}` discards the
/// upload. Both close the job and edit the warning message in place.
pub struct CallbackService {
    config: Arc<Config>,
    job_repo: Arc<JobRepository>,
    business_repo: Arc<BusinessRepository>,
    session_repo: Arc<SessionRepository>,
    chat: Arc<ChatService>,
    storage: Arc<StorageService>,
    pipeline: Arc<PipelineService>,
}

impl CallbackService {
    pub fn new(
        config: Arc<Config>,
        job_repo: Arc<JobRepository>,
        business_repo: Arc<BusinessRepository>,
        session_repo: Arc<SessionRepository>,
        chat: Arc<ChatService>,
        storage: Arc<StorageService>,
        pipeline: Arc<PipelineService>,
    ) -> Self {
        Self {
            config,
            job_repo,
            business_repo,
            session_repo,
            chat,
            storage,
            pipeline,
        }
    }

    pub async fn handle(&self, task: &CallbackTask) -> AppResult<CallbackResult> {
        // At-most-once under at-least-once delivery: a replayed update id
        // is a successful no-op.
        if self.session_repo.callback_seen(task.update_id).await? {
            info!(update_id = task.update_id, "Callback replay ignored");
            self.answer_quietly(&task.callback_id).await;
            return Ok(CallbackResult::Duplicate);
        }

        let (action, job_id) = match task.data.split_once(':') {
            Some(pair @ ("keep_both", _)) | Some(pair @ ("delete_new", _)) => pair,
            _ => {
                warn!(data = %task.data, "Unrecognized callback payload");
                self.answer_quietly(&task.callback_id).await;
                return Ok(CallbackResult::Refused);
            }
        };

        let job = match self.job_repo.find_by_id(job_id).await? {
            Some(job) if job.status == JobStatus::PendingDecision => job,
            Some(job) => {
                info!(job_id = %job.id, status = %job.status, "Callback refused: job not pending");
                self.answer_quietly(&task.callback_id).await;
                return Ok(CallbackResult::Refused);
            }
            None => {
                warn!(job_id, "Callback for unknown job");
                self.answer_quietly(&task.callback_id).await;
                return Ok(CallbackResult::Refused);
            }
        };

        let lang = match self.business_repo.find_by_tenant(job.tenant_id).await {
            Ok(Some(config)) => config.language,
            _ => Language::default(),
        };

        match action {
            "delete_new" => {
                if let Some(object_path) = job.drive_file_id.as_deref() {
                    self.storage
                        .delete(&self.config.invoice_bucket, object_path)
                        .await?;
                }
                self.job_repo.mark_processed_cleared(&job.id).await?;
                self.edit_warning(task, &t(lang, "duplicate_deleted", &[])).await;
            }
            _ => {
                // keep_both: rebuild the row from the persisted extraction;
                // the LLM is never re-queried here.
                let extraction = job.stored_extraction().ok_or_else(|| {
                    crate::error::AppError::InternalError(format!(
                        "Job {} is pending decision without a stored extraction",
                        job.id
                    ))
                })?;
                let file_link = job.drive_link.clone().unwrap_or_default();
                let row_id = self
                    .pipeline
                    .append_to_sheet(&job, &extraction, &file_link)
                    .await?;
                self.job_repo.mark_processed(&job.id, Some(&row_id)).await?;
                self.edit_warning(task, &t(lang, "duplicate_kept", &[])).await;
            }
        }

        self.answer_quietly(&task.callback_id).await;

        // Dedup-write failures must not undo the resolution above.
        if let Err(e) = self.session_repo.record_callback(task.update_id).await {
            warn!(update_id = task.update_id, "Callback dedup write failed: {}", e);
        }
        Ok(CallbackResult::Resolved)
    }

    async fn edit_warning(&self, task: &CallbackTask, text: &str) {
        if let Err(e) = self
            .chat
            .edit_message_text(task.tenant_id, task.message_id, text)
            .await
        {
            warn!(message_id = task.message_id, "Editing warning message failed: {}", e);
        }
    }

    async fn answer_quietly(&self, callback_id: &str) {
        if let Err(e) = self.chat.answer_callback(callback_id).await {
            warn!("answerCallbackQuery failed: {}", e);
        }
    }
}
