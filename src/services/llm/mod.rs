pub mod anthropic;
pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{AppError, AppResult};
use crate::models::{Extraction, ExtractionUsage, RawExtraction};
use crate::services::media_service::ImagePayload;
use crate::utils::sanitizer;

pub use anthropic::AnthropicExtractor;
pub use openai::OpenAiExtractor;

/// The fixed instruction shared by both providers. Providers must answer
/// with a single JSON object and nothing else.
pub const EXTRACTION_PROMPT: &str = r#"You are given one or more images of a document a small business received. Decide whether the document is an invoice or a receipt, and extract its fields.

Respond with a single JSON object and nothing else, using exactly these keys:
{
  "is_invoice": boolean,
  "rejection_reason": string or null (why the document is not an invoice),
  "vendor_name": string or null,
  "invoice_number": string or null,
  "invoice_date": string or null (as printed on the document),
  "total_amount": number or null,
  "currency": string or null (ISO code or symbol as printed),
  "vat_amount": number or null,
  "confidence": number between 0 and 1,
  "category": one of "Food", "Transport", "Office Supplies", "Utilities", "Professional Services", "Marketing", "Technology", "Travel", "Entertainment", "Miscellaneous"
}

If several images are given they are pages of one document; produce one consolidated record. Do not wrap the JSON in code fences."#;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("provider is not configured")]
    NotConfigured,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unparseable provider output: {0}")]
    Parse(String),
}

/// The provider seam: extract a consolidated record from document images.
#[async_trait]
pub trait VisionExtractor: Send + Sync {
    async fn extract(
        &self,
        images: &[ImagePayload],
    ) -> Result<(RawExtraction, ExtractionUsage), ExtractError>;
}

/// Providers occasionally wrap their JSON in code fences despite the
/// instruction; strip one leading and one trailing fence line.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let without_close = without_open.strip_suffix("```").unwrap_or(without_open);
    without_close.trim()
}

pub fn parse_extraction(text: &str) -> Result<RawExtraction, ExtractError> {
    let cleaned = strip_code_fences(text);
    serde_json::from_str(cleaned).map_err(|e| ExtractError::Parse(e.to_string()))
}

/// Primary-with-fallback policy. Any primary error, including auth and
/// parse failures, falls through to the fallback; neither provider is
/// retried within a task. Retries come from the queue.
pub struct ExtractionRouter {
    primary: Option<Box<dyn VisionExtractor>>,
    fallback: Box<dyn VisionExtractor>,
}

impl ExtractionRouter {
    pub fn new(
        primary: Option<Box<dyn VisionExtractor>>,
        fallback: Box<dyn VisionExtractor>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Extract and sanitize. The raw provider output never leaves this
    /// module.
    pub async fn extract(
        &self,
        images: &[ImagePayload],
    ) -> AppResult<(Extraction, ExtractionUsage)> {
        if let Some(primary) = &self.primary {
            match primary.extract(images).await {
                Ok((raw, usage)) => return Ok((sanitizer::sanitize(raw), usage)),
                Err(e) => {
                    tracing::warn!("Primary extractor failed, falling back: {}", e);
                }
            }
        }

        match self.fallback.extract(images).await {
            Ok((raw, usage)) => Ok((sanitizer::sanitize(raw), usage)),
            Err(e) => Err(AppError::ExtractionError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_are_stripped_before_parsing() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn parse_extraction_accepts_fenced_provider_output() {
        let raw = parse_extraction(
            "```json\n{\"is_invoice\": true, \"vendor_name\": \"ABC\", \"total_amount\": 100.0, \"confidence\": 0.9}\n```",
        )
        .unwrap();
        assert!(raw.is_invoice);
        assert_eq!(raw.vendor_name.as_deref(), Some("ABC"));
    }

    #[test]
    fn parse_extraction_rejects_non_json() {
        assert!(parse_extraction("the invoice is from ABC").is_err());
    }
}
