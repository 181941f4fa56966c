use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{Extraction, GeneratedInvoice, IngestJob};

const SHEETS_TIMEOUT_SECS: u64 = 30;

pub const INVOICES_TAB: &str = "Invoices";
pub const GENERATED_TAB: &str = "Generated Invoices";

/// Spreadsheet append service. Append-only, schema-stable rows; tabs and
/// headers are ensured before the first write.
pub struct SheetsService {
    config: Arc<Config>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct AppendReply {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
struct AppendUpdates {
    #[serde(rename = "updatedRange")]
    updated_range: Option<String>,
}

impl SheetsService {
    pub fn new(config: Arc<Config>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SHEETS_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// List tab titles. The onboarding sheet step uses this both to verify
    /// access through the service identity and to echo the tabs back.
    pub async fn list_tabs(&self, sheet_id: &str) -> AppResult<Vec<String>> {
        let url = format!("{}/spreadsheets/{}", self.config.sheets_api_url, sheet_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::SheetsError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::SheetsError(format!(
                "Spreadsheet {} not accessible: {}",
                sheet_id, error_text
            )));
        }

        let meta: SpreadsheetMeta = response
            .json()
            .await
            .map_err(|e| AppError::SheetsError(e.to_string()))?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    /// Create the tab and write its header row if it does not exist yet.
    pub async fn ensure_tab(
        &self,
        sheet_id: &str,
        tab: &str,
        headers: &[&str],
    ) -> AppResult<()> {
        let tabs = self.list_tabs(sheet_id).await?;
        if tabs.iter().any(|t| t == tab) {
            return Ok(());
        }

        let url = format!(
            "{}/spreadsheets/{}:batchUpdate",
            self.config.sheets_api_url, sheet_id
        );
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": tab } } }]
        });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::SheetsError(e.to_string()))?;
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::SheetsError(format!(
                "Creating tab {} failed: {}",
                tab, error_text
            )));
        }

        let header_row: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        self.append_row(sheet_id, tab, header_row).await?;
        Ok(())
    }

    /// Append one row; returns the updated range as the row id.
    pub async fn append_row(
        &self,
        sheet_id: &str,
        tab: &str,
        values: Vec<String>,
    ) -> AppResult<String> {
        let range = urlencoding::encode(tab);
        let url = format!(
            "{}/spreadsheets/{}/values/{}:append?valueInputOption=USER_ENTERED",
            self.config.sheets_api_url, sheet_id, range
        );
        let body = json!({ "values": [values] });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::SheetsError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::SheetsError(format!(
                "Append to {} failed: {}",
                tab, error_text
            )));
        }

        let reply: AppendReply = response
            .json()
            .await
            .map_err(|e| AppError::SheetsError(e.to_string()))?;
        Ok(reply
            .updates
            .and_then(|u| u.updated_range)
            .unwrap_or_default())
    }
}

pub const INVOICES_HEADERS: [&str; 11] = [
    "Date", "Vendor", "Invoice #", "Amount", "Currency", "VAT", "Category", "Status",
    "Uploaded By", "File", "Job Id",
];

pub const ADMIN_INVOICES_HEADERS: [&str; 14] = [
    "Date", "Tenant", "Group", "Vendor", "Invoice #", "Amount", "Currency", "VAT", "Category",
    "Status", "Uploaded By", "File", "Job Id", "Cost USD",
];

pub const GENERATED_HEADERS: [&str; 11] = [
    "Date", "Invoice #", "Type", "Customer", "Customer Tax Id", "Description", "Amount",
    "Currency", "Payment Method", "Issued By", "File",
];

/// Leading apostrophe keeps the spreadsheet from coercing dates into serial
/// numbers.
fn quoted_date(date: &str) -> String {
    format!("'{}", date)
}

fn row_status(extraction: &Extraction) -> &'static str {
    if extraction.needs_review() {
        "needs_review"
    } else {
        "processed"
    }
}

/// The 11-column row written to a tenant's own sheet.
pub fn build_ingest_row(job: &IngestJob, extraction: &Extraction, file_link: &str) -> Vec<String> {
    vec![
        quoted_date(
            &extraction
                .invoice_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        ),
        extraction.vendor_name.clone().unwrap_or_default(),
        extraction.invoice_number.clone().unwrap_or_default(),
        extraction
            .total_amount
            .map(|a| a.to_string())
            .unwrap_or_default(),
        extraction.currency.clone().unwrap_or_default(),
        extraction
            .vat_amount
            .map(|a| a.to_string())
            .unwrap_or_default(),
        extraction.category.to_string(),
        row_status(extraction).to_string(),
        job.uploader_username.clone(),
        file_link.to_string(),
        job.id.clone(),
    ]
}

/// The 14-column row written to the admin sheet when the tenant has no
/// sheet of its own: tenant metadata in front, cost at the end.
pub fn build_admin_ingest_row(
    job: &IngestJob,
    extraction: &Extraction,
    file_link: &str,
    cost_usd: &str,
) -> Vec<String> {
    let mut row = vec![
        quoted_date(
            &extraction
                .invoice_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        ),
        job.tenant_id.to_string(),
        job.chat_title.clone(),
    ];
    row.extend(build_ingest_row(job, extraction, file_link).into_iter().skip(1));
    row.push(cost_usd.to_string());
    row
}

/// The 11-column row appended to the "Generated Invoices" tab.
pub fn build_generated_row(invoice: &GeneratedInvoice) -> Vec<String> {
    vec![
        quoted_date(&invoice.invoice_date),
        invoice.invoice_number.clone(),
        invoice.document_type.to_string(),
        invoice.customer_name.clone(),
        invoice.customer_tax_id.clone().unwrap_or_default(),
        invoice.description.clone(),
        invoice.amount.to_string(),
        invoice.currency.clone(),
        invoice.payment_method.to_string(),
        invoice.generated_by_username.clone(),
        invoice.storage_url.clone(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, DocumentType, JobStatus, PaymentMethod};
    use chrono::{NaiveDate, Utc};

    fn job() -> IngestJob {
        IngestJob {
            id: "-1001_42".to_string(),
            tenant_id: -1001,
            message_id: 42,
            status: JobStatus::Processing,
            attempts: 1,
            file_id: "F1".to_string(),
            chat_title: "Acme Group".to_string(),
            uploader_username: "dana".to_string(),
            uploader_first_name: "Dana".to_string(),
            last_step: None,
            last_error: None,
            drive_file_id: None,
            drive_link: None,
            sheet_row_id: None,
            vendor_name: None,
            invoice_number: None,
            invoice_date: None,
            total_amount: None,
            currency: None,
            vat_amount: None,
            confidence: None,
            category: None,
            is_invoice: None,
            rejection_reason: None,
            duplicate_of_job_id: None,
            provider: None,
            input_tokens: 0,
            output_tokens: 0,
            cost_usd: Default::default(),
            received_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn extraction() -> Extraction {
        Extraction {
            is_invoice: true,
            rejection_reason: None,
            vendor_name: Some("ABC".to_string()),
            invoice_number: Some("INV-7".to_string()),
            invoice_date: NaiveDate::from_ymd_opt(2026, 1, 15),
            total_amount: Some("100.0".parse().unwrap()),
            currency: Some("ILS".to_string()),
            vat_amount: Some("17.0".parse().unwrap()),
            confidence: 0.9,
            category: Category::OfficeSupplies,
        }
    }

    #[test]
    fn ingest_row_has_eleven_columns_and_quoted_date() {
        let row = build_ingest_row(&job(), &extraction(), "https://files/x");
        assert_eq!(row.len(), INVOICES_HEADERS.len());
        assert_eq!(row[0], "'2026-01-15");
        assert_eq!(row[7], "processed");
        assert_eq!(row[10], "-1001_42");
    }

    #[test]
    fn low_confidence_flags_needs_review_without_blocking() {
        let mut e = extraction();
        e.confidence = 0.4;
        let row = build_ingest_row(&job(), &e, "link");
        assert_eq!(row[7], "needs_review");
    }

    #[test]
    fn admin_row_has_fourteen_columns_with_tenant_metadata() {
        let row = build_admin_ingest_row(&job(), &extraction(), "link", "0.0123");
        assert_eq!(row.len(), ADMIN_INVOICES_HEADERS.len());
        assert_eq!(row[1], "-1001");
        assert_eq!(row[2], "Acme Group");
        assert_eq!(row[12], "-1001_42");
        assert_eq!(row[13], "0.0123");
    }

    #[test]
    fn generated_row_has_eleven_columns() {
        let invoice = GeneratedInvoice {
            id: "chat_-1001_20261".to_string(),
            tenant_id: -1001,
            invoice_number: "20261".to_string(),
            document_type: DocumentType::Invoice,
            customer_name: "Acme".to_string(),
            customer_tax_id: None,
            description: "consulting".to_string(),
            amount: "350.00".parse().unwrap(),
            currency: "ILS".to_string(),
            payment_method: PaymentMethod::Bit,
            invoice_date: "15/01/2026".to_string(),
            generated_at: Utc::now(),
            generated_by_user_id: 7,
            generated_by_username: "dana".to_string(),
            storage_path: "-1001/2026/20261.pdf".to_string(),
            storage_url: "https://files/-1001/2026/20261.pdf".to_string(),
        };
        let row = build_generated_row(&invoice);
        assert_eq!(row.len(), GENERATED_HEADERS.len());
        assert_eq!(row[0], "'15/01/2026");
        assert_eq!(row[2], "invoice");
    }
}
