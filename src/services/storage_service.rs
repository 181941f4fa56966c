use chrono::{DateTime, Datelike, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppError, AppResult};

const STORAGE_TIMEOUT_SECS: u64 = 30;

/// Object-store client. The store is an external collaborator behind a
/// plain HTTP contract: PUT writes an object, DELETE removes it, GET serves
/// it at a stable public URL.
pub struct StorageService {
    config: Arc<Config>,
    client: reqwest::Client,
}

impl StorageService {
    pub fn new(config: Arc<Config>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(STORAGE_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    fn object_url(&self, bucket: &str, object_path: &str) -> String {
        let encoded: Vec<String> = object_path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!(
            "{}/{}/{}",
            self.config.storage_api_url,
            bucket,
            encoded.join("/")
        )
    }

    /// Upload raw bytes; returns the public URL.
    pub async fn upload(
        &self,
        bucket: &str,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> AppResult<String> {
        let url = self.object_url(bucket, object_path);
        let response = self
            .client
            .put(&url)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::StorageError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::StorageError(format!(
                "Upload of {} failed: {}",
                object_path, error_text
            )));
        }
        Ok(url)
    }

    /// Delete an object. Missing objects are not an error; rollback paths
    /// call this without knowing whether the upload happened.
    pub async fn delete(&self, bucket: &str, object_path: &str) -> AppResult<()> {
        let url = self.object_url(bucket, object_path);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| AppError::StorageError(e.to_string()))?;

        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::StorageError(format!(
                "Delete of {} failed: {}",
                object_path, error_text
            )));
        }
        Ok(())
    }

    pub fn public_url(&self, bucket: &str, object_path: &str) -> String {
        self.object_url(bucket, object_path)
    }
}

/// Object path for an ingested original. The per-tenant prefix is the
/// isolation invariant; no cross-tenant reads can occur under it.
pub fn invoice_object_path(
    tenant_id: i64,
    message_id: i64,
    received_at: DateTime<Utc>,
    suffix: Option<u32>,
    extension: &str,
) -> String {
    let suffix_part = suffix.map(|n| format!("_{}", n)).unwrap_or_default();
    format!(
        "invoices/{}/{:04}/{:02}/invoice_{}_{}_{}{}.{}",
        tenant_id,
        received_at.year(),
        received_at.month(),
        tenant_id,
        message_id,
        received_at.timestamp_millis(),
        suffix_part,
        extension
    )
}

/// Object path for a generated outbound invoice PDF.
pub fn generated_object_path(tenant_id: i64, year: i32, invoice_number: &str) -> String {
    format!("{}/{}/{}.pdf", tenant_id, year, invoice_number)
}

/// Object path for an onboarding logo.
pub fn logo_object_path(tenant_id: i64, filename: &str) -> String {
    format!("logos/{}/{}", tenant_id, filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn invoice_path_carries_tenant_year_month_and_epoch() {
        let received = Utc.with_ymd_and_hms(2026, 1, 15, 10, 30, 0).unwrap();
        let path = invoice_object_path(-1001, 42, received, None, "jpg");
        assert_eq!(
            path,
            format!(
                "invoices/-1001/2026/01/invoice_-1001_42_{}.jpg",
                received.timestamp_millis()
            )
        );
    }

    #[test]
    fn invoice_path_suffix_disambiguates_multiple_objects() {
        let received = Utc.with_ymd_and_hms(2026, 11, 3, 0, 0, 0).unwrap();
        let path = invoice_object_path(7, 9, received, Some(2), "pdf");
        assert!(path.starts_with("invoices/7/2026/11/invoice_7_9_"));
        assert!(path.ends_with("_2.pdf"));
    }

    #[test]
    fn generated_and_logo_paths() {
        assert_eq!(generated_object_path(-1001, 2026, "20265"), "-1001/2026/20265.pdf");
        assert_eq!(logo_object_path(-1001, "logo.png"), "logos/-1001/logo.png");
    }
}
