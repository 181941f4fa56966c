use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppError, AppResult};

const RENDERER_TIMEOUT_SECS: u64 = 60;

/// Wrapper around the external headless renderer. The renderer carries the
/// heavy codecs: it rasterizes HTML to PDF for outgoing invoices, PDF pages
/// to JPEG for the vision model, and HEIC to JPEG for compatibility.
pub struct RendererService {
    config: Arc<Config>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RasterizeReply {
    /// Base64-encoded JPEG, one entry per page.
    pages: Vec<String>,
}

impl RendererService {
    pub fn new(config: Arc<Config>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(RENDERER_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// Render an HTML document to PDF bytes.
    pub async fn html_to_pdf(&self, html: &str) -> AppResult<Vec<u8>> {
        let url = format!("{}/render/pdf", self.config.renderer_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "html": html }))
            .send()
            .await
            .map_err(|e| AppError::RendererError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::RendererError(format!(
                "HTML render failed: {}",
                error_text
            )));
        }
        Ok(response
            .bytes()
            .await
            .map_err(|e| AppError::RendererError(e.to_string()))?
            .to_vec())
    }

    /// Rasterize every page of a PDF to JPEG.
    pub async fn rasterize_pdf(&self, pdf_bytes: &[u8]) -> AppResult<Vec<Vec<u8>>> {
        let url = format!("{}/rasterize", self.config.renderer_url);
        let encoded = base64::engine::general_purpose::STANDARD.encode(pdf_bytes);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "pdf": encoded, "format": "jpeg" }))
            .send()
            .await
            .map_err(|e| AppError::RendererError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::RendererError(format!(
                "PDF rasterization failed: {}",
                error_text
            )));
        }

        let reply: RasterizeReply = response
            .json()
            .await
            .map_err(|e| AppError::RendererError(e.to_string()))?;

        reply
            .pages
            .iter()
            .map(|page| {
                base64::engine::general_purpose::STANDARD
                    .decode(page)
                    .map_err(|e| AppError::RendererError(format!("Bad page encoding: {}", e)))
            })
            .collect()
    }

    /// Convert a HEIC/HEIF image to JPEG at quality 95. The original bytes
    /// are what gets stored; the JPEG exists for model compatibility only.
    pub async fn heic_to_jpeg(&self, heic_bytes: &[u8]) -> AppResult<Vec<u8>> {
        let url = format!("{}/convert/jpeg?quality=95", self.config.renderer_url);
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "image/heic")
            .body(heic_bytes.to_vec())
            .send()
            .await
            .map_err(|e| AppError::RendererError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::RendererError(format!(
                "HEIC conversion failed: {}",
                error_text
            )));
        }
        Ok(response
            .bytes()
            .await
            .map_err(|e| AppError::RendererError(e.to_string()))?
            .to_vec())
    }
}
