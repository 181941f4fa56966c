use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::{
    duplicate_kind, ClaimOutcome, DuplicateMatch, Extraction, ExtractionUsage, IngestJob,
    JobStatus, PipelineStep, TaskPayload, DUPLICATE_WINDOW_DAYS, STALE_LEASE_MINUTES,
};

#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Transactional claim at pipeline entry. Exactly one concurrent
    /// delivery of the same `(tenant, message)` wins; the row lock
    /// serializes racing siblings.
    pub async fn claim(&self, payload: &TaskPayload) -> AppResult<ClaimOutcome> {
        let id = IngestJob::composite_id(payload.tenant_id, payload.message_id);
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, IngestJob>(
            "SELECT * FROM ingest_jobs WHERE id = $1 FOR UPDATE",
        )
        .bind(&id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match existing {
            None => {
                let job = sqlx::query_as::<_, IngestJob>(
                    r#"
                    INSERT INTO ingest_jobs (
                        id, tenant_id, message_id, status, attempts, file_id,
                        chat_title, uploader_username, uploader_first_name, received_at
                    )
                    VALUES ($1, $2, $3, 'processing', 1, $4, $5, $6, $7, $8)
                    RETURNING *
                    "#,
                )
                .bind(&id)
                .bind(payload.tenant_id)
                .bind(payload.message_id)
                .bind(&payload.file_id)
                .bind(&payload.chat_title)
                .bind(&payload.uploader_username)
                .bind(&payload.uploader_first_name)
                .bind(payload.received_at)
                .fetch_one(&mut *tx)
                .await?;
                ClaimOutcome::Claimed(Box::new(job))
            }
            Some(job) if job.status.is_terminal() => ClaimOutcome::AlreadyDone(job.status),
            Some(job) if job.status == JobStatus::PendingDecision => ClaimOutcome::AwaitingDecision,
            Some(job) => {
                let stale = Utc::now() - job.updated_at >= Duration::minutes(STALE_LEASE_MINUTES);
                if job.status == JobStatus::Processing && !stale {
                    ClaimOutcome::InProgress
                } else {
                    // pending_retry, or a stale lease left by a crashed worker
                    let job = sqlx::query_as::<_, IngestJob>(
                        r#"
                        UPDATE ingest_jobs
                        SET status = 'processing', attempts = attempts + 1, updated_at = NOW()
                        WHERE id = $1
                        RETURNING *
                        "#,
                    )
                    .bind(&id)
                    .fetch_one(&mut *tx)
                    .await?;
                    ClaimOutcome::Claimed(Box::new(job))
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<IngestJob>> {
        let job = sqlx::query_as::<_, IngestJob>("SELECT * FROM ingest_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    /// Record the progress marker after a step completes.
    pub async fn record_step(&self, id: &str, step: PipelineStep) -> AppResult<()> {
        sqlx::query("UPDATE ingest_jobs SET last_step = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(step)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_upload(
        &self,
        id: &str,
        drive_file_id: &str,
        drive_link: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE ingest_jobs
            SET drive_file_id = $2, drive_link = $3, last_step = 'drive', updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(drive_file_id)
        .bind(drive_link)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist the sanitized extraction and provider usage onto the job.
    pub async fn record_extraction(
        &self,
        id: &str,
        extraction: &Extraction,
        usage: &ExtractionUsage,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE ingest_jobs
            SET vendor_name = $2, invoice_number = $3, invoice_date = $4,
                total_amount = $5, currency = $6, vat_amount = $7,
                confidence = $8, category = $9, is_invoice = $10,
                rejection_reason = $11, provider = $12, input_tokens = $13,
                output_tokens = $14, cost_usd = $15, last_step = 'llm',
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&extraction.vendor_name)
        .bind(&extraction.invoice_number)
        .bind(extraction.invoice_date)
        .bind(extraction.total_amount)
        .bind(&extraction.currency)
        .bind(extraction.vat_amount)
        .bind(extraction.confidence)
        .bind(extraction.category.to_string())
        .bind(extraction.is_invoice)
        .bind(&extraction.rejection_reason)
        .bind(usage.provider.to_string())
        .bind(usage.input_tokens)
        .bind(usage.output_tokens)
        .bind(Decimal::try_from(usage.cost_usd).unwrap_or_default())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_processed(&self, id: &str, sheet_row_id: Option<&str>) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE ingest_jobs
            SET status = 'processed', sheet_row_id = COALESCE($2, sheet_row_id),
                last_error = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(sheet_row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The delete_new resolution: the upload is gone, the job closes with
    /// its storage pointers cleared.
    pub async fn mark_processed_cleared(&self, id: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE ingest_jobs
            SET status = 'processed', drive_file_id = NULL, drive_link = NULL,
                last_error = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(
        &self,
        id: &str,
        step: PipelineStep,
        error: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE ingest_jobs
            SET status = 'failed', last_step = $2, last_error = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(step)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_rejected(&self, id: &str, reason: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE ingest_jobs
            SET status = 'rejected', last_step = 'rejected', rejection_reason = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_pending_retry(
        &self,
        id: &str,
        step: PipelineStep,
        error: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE ingest_jobs
            SET status = 'pending_retry', last_step = $2, last_error = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(step)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_pending_decision(&self, id: &str, duplicate_of: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE ingest_jobs
            SET status = 'pending_decision', duplicate_of_job_id = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(duplicate_of)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Duplicate lookup: same tenant, processed, within the look-back
    /// window, same vendor (case-insensitive) and exact amount. Date
    /// agreement decides exact vs similar; candidates with conflicting
    /// dates are filtered by the predicate.
    pub async fn find_duplicate(
        &self,
        tenant_id: i64,
        exclude_id: &str,
        vendor_name: &str,
        total_amount: Decimal,
        invoice_date: Option<NaiveDate>,
    ) -> AppResult<Option<DuplicateMatch>> {
        let cutoff = Utc::now() - Duration::days(DUPLICATE_WINDOW_DAYS);
        let candidates = sqlx::query_as::<_, IngestJob>(
            r#"
            SELECT * FROM ingest_jobs
            WHERE tenant_id = $1
              AND id <> $2
              AND status = 'processed'
              AND created_at >= $3
              AND LOWER(TRIM(vendor_name)) = LOWER(TRIM($4))
              AND total_amount = $5
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(exclude_id)
        .bind(cutoff)
        .bind(vendor_name)
        .bind(total_amount)
        .fetch_all(&self.pool)
        .await?;

        for candidate in candidates {
            let (c_vendor, c_amount) = match (&candidate.vendor_name, candidate.total_amount) {
                (Some(v), Some(a)) => (v.clone(), a),
                _ => continue,
            };
            if let Some(kind) = duplicate_kind(
                vendor_name,
                total_amount,
                invoice_date,
                &c_vendor,
                c_amount,
                candidate.invoice_date,
            ) {
                return Ok(Some(DuplicateMatch {
                    job_id: candidate.id,
                    kind,
                }));
            }
        }
        Ok(None)
    }

    /// Job counters by status for the metrics endpoint.
    pub async fn counts_by_status(&self) -> AppResult<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM ingest_jobs GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn recent_failures(&self, limit: i64) -> AppResult<Vec<IngestJob>> {
        let jobs = sqlx::query_as::<_, IngestJob>(
            r#"
            SELECT * FROM ingest_jobs
            WHERE status IN ('failed', 'pending_retry')
            ORDER BY updated_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    /// Per-category totals over processed jobs for one tenant and month.
    pub async fn monthly_totals(
        &self,
        tenant_id: i64,
        month_start: NaiveDate,
        month_end: NaiveDate,
    ) -> AppResult<Vec<(String, i64, Decimal)>> {
        let rows: Vec<(Option<String>, i64, Option<Decimal>)> = sqlx::query_as(
            r#"
            SELECT category, COUNT(*), SUM(total_amount)
            FROM ingest_jobs
            WHERE tenant_id = $1
              AND status = 'processed'
              AND created_at >= $2
              AND created_at < $3
            GROUP BY category
            ORDER BY SUM(total_amount) DESC NULLS LAST
            "#,
        )
        .bind(tenant_id)
        .bind(month_start)
        .bind(month_end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(category, count, total)| {
                (
                    category.unwrap_or_else(|| "Miscellaneous".to_string()),
                    count,
                    total.unwrap_or_default(),
                )
            })
            .collect())
    }
}
