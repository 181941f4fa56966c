use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::{Language, ReportTask};
use crate::repository::{BusinessRepository, JobRepository};
use crate::services::ChatService;
use crate::utils::i18n::t;

/// `/report` aggregation and the `GET /metrics` reader.
pub struct ReportService {
    job_repo: Arc<JobRepository>,
    business_repo: Arc<BusinessRepository>,
    chat: Arc<ChatService>,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_by_status: Vec<StatusCount>,
    pub recent_failures: Vec<FailureEntry>,
}

#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct FailureEntry {
    pub job_id: String,
    pub status: String,
    pub last_step: Option<String>,
    pub last_error: Option<String>,
    pub attempts: i32,
}

impl ReportService {
    pub fn new(
        job_repo: Arc<JobRepository>,
        business_repo: Arc<BusinessRepository>,
        chat: Arc<ChatService>,
    ) -> Self {
        Self {
            job_repo,
            business_repo,
            chat,
        }
    }

    /// Reply with the current month's processed totals, grouped by
    /// category.
    pub async fn handle(&self, task: &ReportTask) -> AppResult<()> {
        let lang = match self.business_repo.find_by_tenant(task.tenant_id).await? {
            Some(config) => config.language,
            None => Language::default(),
        };

        let now = Utc::now();
        let (start, end) = month_bounds(now.year(), now.month());
        let rows = self.job_repo.monthly_totals(task.tenant_id, start, end).await?;

        let text = if rows.is_empty() {
            t(lang, "report_empty", &[])
        } else {
            format_report(lang, &now.format("%m/%Y").to_string(), &rows)
        };
        self.chat.send_message(task.tenant_id, &text, None, None).await?;
        Ok(())
    }

    /// Job counters by status plus recent failures for the dashboard.
    pub async fn metrics(&self) -> AppResult<MetricsSnapshot> {
        let jobs_by_status = self
            .job_repo
            .counts_by_status()
            .await?
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect();
        let recent_failures = self
            .job_repo
            .recent_failures(20)
            .await?
            .into_iter()
            .map(|job| FailureEntry {
                job_id: job.id,
                status: job.status.to_string(),
                last_step: job.last_step.map(|s| s.to_string()),
                last_error: job.last_error,
                attempts: job.attempts,
            })
            .collect();
        Ok(MetricsSnapshot {
            jobs_by_status,
            recent_failures,
        })
    }
}

fn month_bounds(year: i32, month: u32) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default();
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1).unwrap_or_default();
    (start, end)
}

fn format_report(lang: Language, month: &str, rows: &[(String, i64, Decimal)]) -> String {
    let count: i64 = rows.iter().map(|(_, c, _)| c).sum();
    let total: Decimal = rows.iter().map(|(_, _, t)| *t).sum();
    let mut out = t(
        lang,
        "report_header",
        &[
            ("month", month),
            ("count", &count.to_string()),
            ("total", &total.to_string()),
        ],
    );
    for (category, _, amount) in rows {
        out.push('\n');
        out.push_str(&t(
            lang,
            "report_line",
            &[("category", category.as_str()), ("amount", &amount.to_string())],
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_handle_year_rollover() {
        let (start, end) = month_bounds(2026, 12);
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
    }

    #[test]
    fn report_formatting_sums_counts_and_totals() {
        let rows = vec![
            ("Food".to_string(), 2, "150.0".parse().unwrap()),
            ("Travel".to_string(), 1, "80.5".parse().unwrap()),
        ];
        let out = format_report(Language::En, "01/2026", &rows);
        assert!(out.contains("01/2026"));
        assert!(out.contains('3'));
        assert!(out.contains("230.5"));
        assert!(out.contains("Food: 150.0"));
        assert!(out.contains("Travel: 80.5"));
    }
}
