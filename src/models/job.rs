use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Minutes after which a `processing` claim is considered abandoned and may
/// be reclaimed by another delivery.
pub const STALE_LEASE_MINUTES: i64 = 10;

/// Look-back window for duplicate detection.
pub const DUPLICATE_WINDOW_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum JobStatus {
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "processed")]
    Processed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "pending_retry")]
    PendingRetry,
    #[serde(rename = "pending_decision")]
    PendingDecision,
    #[serde(rename = "rejected")]
    Rejected,
}

impl JobStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Processed | JobStatus::Failed | JobStatus::Rejected)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Processed => write!(f, "processed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::PendingRetry => write!(f, "pending_retry"),
            JobStatus::PendingDecision => write!(f, "pending_decision"),
            JobStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Progress marker recorded on the job as each pipeline step completes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum PipelineStep {
    #[serde(rename = "download")]
    Download,
    #[serde(rename = "drive")]
    Drive,
    #[serde(rename = "llm")]
    Llm,
    #[serde(rename = "sheets")]
    Sheets,
    #[serde(rename = "ack")]
    Ack,
    #[serde(rename = "rejected")]
    Rejected,
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStep::Download => write!(f, "download"),
            PipelineStep::Drive => write!(f, "drive"),
            PipelineStep::Llm => write!(f, "llm"),
            PipelineStep::Sheets => write!(f, "sheets"),
            PipelineStep::Ack => write!(f, "ack"),
            PipelineStep::Rejected => write!(f, "rejected"),
        }
    }
}

/// One processed inbound document. The id is `{tenant_id}_{message_id}`,
/// the natural idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IngestJob {
    pub id: String,
    pub tenant_id: i64,
    pub message_id: i64,
    pub status: JobStatus,
    pub attempts: i32,
    pub file_id: String,
    pub chat_title: String,
    pub uploader_username: String,
    pub uploader_first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_step: Option<PipelineStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_row_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_invoice: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of_job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost_usd: Decimal,
    pub received_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IngestJob {
    pub fn composite_id(tenant_id: i64, message_id: i64) -> String {
        format!("{}_{}", tenant_id, message_id)
    }

    /// Rebuild the sanitized extraction persisted on this job, if the LLM
    /// step already ran. Resumed deliveries and the keep-both resolution
    /// use this instead of re-querying a provider.
    pub fn stored_extraction(&self) -> Option<crate::models::Extraction> {
        self.is_invoice.map(|is_invoice| crate::models::Extraction {
            is_invoice,
            rejection_reason: self.rejection_reason.clone(),
            vendor_name: self.vendor_name.clone(),
            invoice_number: self.invoice_number.clone(),
            invoice_date: self.invoice_date,
            total_amount: self.total_amount,
            currency: self.currency.clone(),
            vat_amount: self.vat_amount,
            confidence: self.confidence.unwrap_or(0.0),
            category: crate::models::Category::normalize(self.category.as_deref().unwrap_or("")),
        })
    }
}

/// Result of the transactional claim at pipeline entry.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// The caller owns the job and must run the pipeline.
    Claimed(Box<IngestJob>),
    /// A terminal status exists; the delivery is a no-op.
    AlreadyDone(JobStatus),
    /// A sibling delivery holds a fresh lease.
    InProgress,
    /// The job waits on a user decision; callback resolution re-enters.
    AwaitingDecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DuplicateKind {
    /// Vendor, amount and date all matched.
    #[serde(rename = "exact")]
    Exact,
    /// Vendor and amount matched; at least one side lacks a date.
    #[serde(rename = "similar")]
    Similar,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateMatch {
    pub job_id: String,
    pub kind: DuplicateKind,
}

/// Duplicate predicate over two extractions within one tenant. Vendor names
/// compare case-insensitively after trimming; amounts compare exactly; dates
/// must agree only when both sides carry one.
pub fn duplicate_kind(
    vendor_a: &str,
    amount_a: Decimal,
    date_a: Option<NaiveDate>,
    vendor_b: &str,
    amount_b: Decimal,
    date_b: Option<NaiveDate>,
) -> Option<DuplicateKind> {
    if vendor_a.trim().to_lowercase() != vendor_b.trim().to_lowercase() {
        return None;
    }
    if amount_a != amount_b {
        return None;
    }
    match (date_a, date_b) {
        (Some(a), Some(b)) if a == b => Some(DuplicateKind::Exact),
        (Some(_), Some(_)) => None,
        _ => Some(DuplicateKind::Similar),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn composite_id_keeps_negative_tenant_ids() {
        assert_eq!(IngestJob::composite_id(-1001, 42), "-1001_42");
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Processed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Rejected.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(!JobStatus::PendingRetry.is_terminal());
        assert!(!JobStatus::PendingDecision.is_terminal());
    }

    #[test]
    fn exact_duplicate_needs_matching_dates() {
        let kind = duplicate_kind(
            "ABC Office",
            dec("100.0"),
            Some(d("2026-01-15")),
            "  abc office ",
            dec("100.0"),
            Some(d("2026-01-15")),
        );
        assert_eq!(kind, Some(DuplicateKind::Exact));
    }

    #[test]
    fn missing_date_on_either_side_still_matches_as_similar() {
        let kind = duplicate_kind("ABC", dec("100.0"), None, "abc", dec("100.0"), Some(d("2026-01-15")));
        assert_eq!(kind, Some(DuplicateKind::Similar));

        let kind = duplicate_kind("ABC", dec("100.0"), None, "abc", dec("100.0"), None);
        assert_eq!(kind, Some(DuplicateKind::Similar));
    }

    #[test]
    fn differing_dates_vendor_or_amount_do_not_match() {
        assert_eq!(
            duplicate_kind("ABC", dec("100.0"), Some(d("2026-01-15")), "abc", dec("100.0"), Some(d("2026-01-16"))),
            None
        );
        assert_eq!(duplicate_kind("ABC", dec("100.0"), None, "XYZ", dec("100.0"), None), None);
        assert_eq!(duplicate_kind("ABC", dec("100.0"), None, "abc", dec("100.5"), None), None);
    }
}
