use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{
    ClaimOutcome, Extraction, ExtractionUsage, IngestJob, Language, PipelineStep, TaskPayload,
};
use crate::repository::{BusinessRepository, JobRepository};
use crate::services::llm::ExtractionRouter;
use crate::services::media_service::{MediaService, NormalizedDocument, Prepared};
use crate::services::sheets_service::{
    build_admin_ingest_row, build_generated_row, build_ingest_row, SheetsService,
    ADMIN_INVOICES_HEADERS, GENERATED_TAB, INVOICES_HEADERS, INVOICES_TAB,
};
use crate::services::storage_service::invoice_object_path;
use crate::services::{ChatService, StorageService};
use crate::utils::i18n::{escape_markdown, t};

use crate::services::chat_service::InlineButton;

/// Terminal disposition of one delivery, reported back to the queue as 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
    Processed,
    AlreadyProcessed,
    InProgress,
    AwaitingDecision,
    Rejected,
    Failed,
}

impl PipelineResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineResult::Processed => "processed",
            PipelineResult::AlreadyProcessed => "already_processed",
            PipelineResult::InProgress => "in_progress",
            PipelineResult::AwaitingDecision => "pending_decision",
            PipelineResult::Rejected => "rejected",
            PipelineResult::Failed => "failed",
        }
    }
}

struct StepError {
    step: PipelineStep,
    error: AppError,
}

fn at(step: PipelineStep) -> impl FnOnce(AppError) -> StepError {
    move |error| StepError { step, error }
}

/// The ingest orchestrator: claim, download, normalize, upload, extract,
/// duplicate-check, append, acknowledge. Guarantees idempotency per
/// `(tenant, message)`, at-most-once side effects, bounded rollback of
/// uploads, and resumability via the job's progress marker.
pub struct PipelineService {
    config: Arc<Config>,
    job_repo: Arc<JobRepository>,
    business_repo: Arc<BusinessRepository>,
    chat: Arc<ChatService>,
    storage: Arc<StorageService>,
    sheets: Arc<SheetsService>,
    media: Arc<MediaService>,
    extractor: Arc<ExtractionRouter>,
}

impl PipelineService {
    pub fn new(
        config: Arc<Config>,
        job_repo: Arc<JobRepository>,
        business_repo: Arc<BusinessRepository>,
        chat: Arc<ChatService>,
        storage: Arc<StorageService>,
        sheets: Arc<SheetsService>,
        media: Arc<MediaService>,
        extractor: Arc<ExtractionRouter>,
    ) -> Self {
        Self {
            config,
            job_repo,
            business_repo,
            chat,
            storage,
            sheets,
            media,
            extractor,
        }
    }

    /// Entry point for `POST /tasks/ingest`. Transient failures transition
    /// the job to pending_retry and re-throw so the queue records a retry;
    /// everything else resolves to a 200-class outcome.
    pub async fn process(&self, payload: &TaskPayload) -> AppResult<PipelineResult> {
        let job = match self.job_repo.claim(payload).await? {
            ClaimOutcome::Claimed(job) => *job,
            ClaimOutcome::AlreadyDone(status) => {
                info!(job_id = %IngestJob::composite_id(payload.tenant_id, payload.message_id),
                      %status, "Delivery short-circuited at claim");
                return Ok(PipelineResult::AlreadyProcessed);
            }
            ClaimOutcome::InProgress => return Ok(PipelineResult::InProgress),
            ClaimOutcome::AwaitingDecision => return Ok(PipelineResult::AwaitingDecision),
        };

        info!(job_id = %job.id, attempts = job.attempts, "Pipeline claimed job");

        match self.run(&job).await {
            Ok(result) => Ok(result),
            Err(StepError { step, error }) => {
                if let Err(e) = self
                    .job_repo
                    .mark_pending_retry(&job.id, step, &error.to_string())
                    .await
                {
                    error!(job_id = %job.id, "Failed to record pending_retry: {}", e);
                }
                warn!(job_id = %job.id, %step, "Pipeline step failed: {}", error);
                Err(error)
            }
        }
    }

    async fn run(&self, job: &IngestJob) -> Result<PipelineResult, StepError> {
        let lang = self.tenant_language(job.tenant_id).await;

        // Step 1 - download and normalize
        let downloaded = self
            .chat
            .download_file(&job.file_id)
            .await
            .map_err(at(PipelineStep::Download))?;

        let prepared = self
            .media
            .prepare(&downloaded.file_path, downloaded.bytes)
            .await
            .map_err(at(PipelineStep::Download))?;

        let document = match prepared {
            Prepared::Ready(document) => document,
            Prepared::Encrypted => {
                return self
                    .fail_with_reply(job, lang, "encrypted PDF", t(lang, "pdf_encrypted", &[]))
                    .await;
            }
            Prepared::NoPages => {
                return self.fail_silent(job, "PDF has no pages").await;
            }
            Prepared::TooManyPages(pages) => {
                let text = t(
                    lang,
                    "pdf_too_many_pages",
                    &[
                        ("pages", &pages.to_string()),
                        ("max", &self.config.max_pdf_pages.to_string()),
                    ],
                );
                return self
                    .fail_with_reply(job, lang, "page count over limit", text)
                    .await;
            }
        };

        // Step 2 - upload the original. The object path is deterministic
        // per job, so redelivery overwrites rather than duplicates.
        let object_path = invoice_object_path(
            job.tenant_id,
            job.message_id,
            job.received_at,
            None,
            &document.extension,
        );
        let drive_link = self
            .storage
            .upload(
                &self.config.invoice_bucket,
                &object_path,
                document.original_bytes.clone(),
                &document.content_type,
            )
            .await
            .map_err(at(PipelineStep::Drive))?;
        self.job_repo
            .record_upload(&job.id, &object_path, &drive_link)
            .await
            .map_err(at(PipelineStep::Drive))?;

        // Step 3 - extract, unless a previous delivery already did
        let (extraction, _usage) = match job.stored_extraction() {
            Some(extraction) => {
                info!(job_id = %job.id, "Reusing stored extraction");
                (extraction, None::<ExtractionUsage>)
            }
            None => {
                let (extraction, usage) = self
                    .extractor
                    .extract(&document.images)
                    .await
                    .map_err(at(PipelineStep::Llm))?;
                self.job_repo
                    .record_extraction(&job.id, &extraction, &usage)
                    .await
                    .map_err(at(PipelineStep::Llm))?;
                (extraction, Some(usage))
            }
        };

        // Step 3a - not an invoice: roll back the upload and close
        if !extraction.is_invoice {
            self.storage
                .delete(&self.config.invoice_bucket, &object_path)
                .await
                .map_err(at(PipelineStep::Rejected))?;
            let reason = escape_markdown(
                extraction
                    .rejection_reason
                    .as_deref()
                    .unwrap_or("unrecognized document"),
            );
            let text = t(lang, "not_an_invoice", &[("reason", &reason)]);
            if let Err(e) = self
                .chat
                .send_message(job.tenant_id, &text, Some(job.message_id), None)
                .await
            {
                warn!(job_id = %job.id, "Rejection reply failed: {}", e);
            }
            self.job_repo
                .mark_rejected(&job.id, extraction.rejection_reason.as_deref().unwrap_or(""))
                .await
                .map_err(at(PipelineStep::Rejected))?;
            return Ok(PipelineResult::Rejected);
        }

        // Step 3b - duplicate detection. Lookup failures never block the
        // pipeline; they log and count as no-match.
        if let Some(duplicate) = self.detect_duplicate(job, &extraction).await {
            // warn first: a failed send leaves the job retryable, whereas a
            // job parked in pending_decision without its buttons is stuck
            self.send_duplicate_warning(job, lang, &extraction)
                .await
                .map_err(at(PipelineStep::Llm))?;
            self.job_repo
                .mark_pending_decision(&job.id, &duplicate)
                .await
                .map_err(at(PipelineStep::Llm))?;
            return Ok(PipelineResult::AwaitingDecision);
        }

        // Step 4 - spreadsheet append, transactional against the object
        // store: a failed append deletes the upload before re-throwing.
        let sheet_row_id = match self.append_to_sheet(job, &extraction, &drive_link).await {
            Ok(row_id) => row_id,
            Err(append_error) => {
                if let Err(delete_error) = self
                    .storage
                    .delete(&self.config.invoice_bucket, &object_path)
                    .await
                {
                    error!(job_id = %job.id, "Rollback delete failed: {}", delete_error);
                }
                return Err(at(PipelineStep::Sheets)(append_error));
            }
        };
        self.job_repo
            .record_step(&job.id, PipelineStep::Sheets)
            .await
            .map_err(at(PipelineStep::Sheets))?;

        // Step 5 - mark processed first, then acknowledge. If the ack send
        // fails the retry short-circuits at claim; the user misses one
        // confirmation rather than receiving two.
        self.job_repo
            .mark_processed(&job.id, Some(&sheet_row_id))
            .await
            .map_err(at(PipelineStep::Ack))?;

        let mut ack = t(
            lang,
            "invoice_saved",
            &[
                (
                    "vendor",
                    &escape_markdown(extraction.vendor_name.as_deref().unwrap_or("-")),
                ),
                (
                    "amount",
                    &extraction
                        .total_amount
                        .map(|a| a.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
                ("currency", extraction.currency.as_deref().unwrap_or("")),
                ("link", &drive_link),
            ],
        );
        if extraction.needs_review() {
            ack.push('\n');
            ack.push_str(&t(lang, "needs_review_note", &[]));
        }
        match self
            .chat
            .send_message(job.tenant_id, &ack, Some(job.message_id), None)
            .await
        {
            Ok(_) => {
                if let Err(e) = self.job_repo.record_step(&job.id, PipelineStep::Ack).await {
                    warn!(job_id = %job.id, "Recording ack step failed: {}", e);
                }
            }
            Err(e) => warn!(job_id = %job.id, "Ack send failed after processed: {}", e),
        }

        info!(job_id = %job.id, "Pipeline completed");
        Ok(PipelineResult::Processed)
    }

    async fn tenant_language(&self, tenant_id: i64) -> Language {
        match self.business_repo.find_by_tenant(tenant_id).await {
            Ok(Some(config)) => config.language,
            _ => Language::default(),
        }
    }

    async fn detect_duplicate(&self, job: &IngestJob, extraction: &Extraction) -> Option<String> {
        let vendor = extraction.vendor_name.as_deref()?;
        let amount = extraction.total_amount?;
        match self
            .job_repo
            .find_duplicate(job.tenant_id, &job.id, vendor, amount, extraction.invoice_date)
            .await
        {
            Ok(m) => m.map(|d| d.job_id),
            Err(e) => {
                warn!(job_id = %job.id, "Duplicate lookup failed, treating as no-match: {}", e);
                None
            }
        }
    }

    async fn send_duplicate_warning(
        &self,
        job: &IngestJob,
        lang: Language,
        extraction: &Extraction,
    ) -> AppResult<()> {
        let text = t(
            lang,
            "duplicate_warning",
            &[
                (
                    "vendor",
                    &escape_markdown(extraction.vendor_name.as_deref().unwrap_or("-")),
                ),
                (
                    "amount",
                    &extraction
                        .total_amount
                        .map(|a| a.to_string())
                        .unwrap_or_default(),
                ),
                ("currency", extraction.currency.as_deref().unwrap_or("")),
            ],
        );
        let buttons = vec![vec![
            InlineButton {
                text: t(lang, "btn_keep_both", &[]),
                callback_data: format!("keep_both:{}", job.id),
            },
            InlineButton {
                text: t(lang, "btn_delete_new", &[]),
                callback_data: format!("delete_new:{}", job.id),
            },
        ]];
        self.chat
            .send_message(job.tenant_id, &text, Some(job.message_id), Some(buttons))
            .await?;
        Ok(())
    }

    /// Append the extraction row to the tenant's own sheet, or to the
    /// admin sheet (wider row) when the tenant has none. Shared with the
    /// keep-both callback resolution.
    pub(crate) async fn append_to_sheet(
        &self,
        job: &IngestJob,
        extraction: &Extraction,
        file_link: &str,
    ) -> AppResult<String> {
        let config = self.business_repo.find_by_tenant(job.tenant_id).await?;
        match config.and_then(|c| c.sheet_id) {
            Some(sheet_id) => {
                self.sheets
                    .ensure_tab(&sheet_id, INVOICES_TAB, &INVOICES_HEADERS)
                    .await?;
                let row = build_ingest_row(job, extraction, file_link);
                self.sheets.append_row(&sheet_id, INVOICES_TAB, row).await
            }
            None => {
                if self.config.admin_sheet_id.is_empty() {
                    return Err(AppError::SheetsError(
                        "Tenant has no sheet and no admin sheet is configured".to_string(),
                    ));
                }
                self.sheets
                    .ensure_tab(&self.config.admin_sheet_id, INVOICES_TAB, &ADMIN_INVOICES_HEADERS)
                    .await?;
                let row =
                    build_admin_ingest_row(job, extraction, file_link, &job.cost_usd.to_string());
                self.sheets
                    .append_row(&self.config.admin_sheet_id, INVOICES_TAB, row)
                    .await
            }
        }
    }

    /// Append a generated-invoice row to the tenant's sheet.
    pub(crate) async fn append_generated_row(
        &self,
        sheet_id: &str,
        invoice: &crate::models::GeneratedInvoice,
    ) -> AppResult<String> {
        self.sheets
            .ensure_tab(sheet_id, GENERATED_TAB, &crate::services::sheets_service::GENERATED_HEADERS)
            .await?;
        self.sheets
            .append_row(sheet_id, GENERATED_TAB, build_generated_row(invoice))
            .await
    }

    async fn fail_with_reply(
        &self,
        job: &IngestJob,
        _lang: Language,
        reason: &str,
        text: String,
    ) -> Result<PipelineResult, StepError> {
        if let Err(e) = self
            .chat
            .send_message(job.tenant_id, &text, Some(job.message_id), None)
            .await
        {
            warn!(job_id = %job.id, "Policy-failure reply failed: {}", e);
        }
        self.job_repo
            .mark_failed(&job.id, PipelineStep::Download, reason)
            .await
            .map_err(at(PipelineStep::Download))?;
        Ok(PipelineResult::Failed)
    }

    async fn fail_silent(&self, job: &IngestJob, reason: &str) -> Result<PipelineResult, StepError> {
        self.job_repo
            .mark_failed(&job.id, PipelineStep::Download, reason)
            .await
            .map_err(at(PipelineStep::Download))?;
        Ok(PipelineResult::Failed)
    }

    /// The queue reports a task that exhausted its attempts; tell the user.
    pub async fn notify_exhausted(&self, tenant_id: i64, message_id: i64) -> AppResult<()> {
        let lang = self.tenant_language(tenant_id).await;
        let text = t(lang, "processing_failed", &[]);
        self.chat
            .send_message(tenant_id, &text, Some(message_id), None)
            .await?;
        Ok(())
    }
}
