use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::models::{ExtractProvider, ExtractionUsage, RawExtraction};
use crate::services::media_service::ImagePayload;

use super::{parse_extraction, ExtractError, VisionExtractor, EXTRACTION_PROMPT};

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;
const EXTRACT_TIMEOUT_SECS: u64 = 60;

// Sonnet-class pricing, USD per million tokens.
const INPUT_COST_PER_MTOK: f64 = 3.0;
const OUTPUT_COST_PER_MTOK: f64 = 15.0;

/// Primary extractor: the Anthropic Messages API with base64 image blocks.
pub struct AnthropicExtractor {
    api_key: String,
    model: String,
    api_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: i64,
    output_tokens: i64,
}

impl AnthropicExtractor {
    pub fn new(api_key: &str, model: &str, api_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(EXTRACT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl VisionExtractor for AnthropicExtractor {
    async fn extract(
        &self,
        images: &[ImagePayload],
    ) -> Result<(RawExtraction, ExtractionUsage), ExtractError> {
        if self.api_key.is_empty() {
            return Err(ExtractError::NotConfigured);
        }

        let mut content: Vec<serde_json::Value> = images
            .iter()
            .map(|image| {
                json!({
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": image.mime,
                        "data": base64::engine::general_purpose::STANDARD.encode(&image.bytes),
                    }
                })
            })
            .collect();
        content.push(json!({ "type": "text", "text": EXTRACTION_PROMPT }));

        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{ "role": "user", "content": content }],
        });

        let response = self
            .client
            .post(format!("{}/v1/messages", self.api_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let reply: MessagesReply = response
            .json()
            .await
            .map_err(|e| ExtractError::Parse(e.to_string()))?;

        let text = reply
            .content
            .iter()
            .find_map(|block| block.text.as_deref())
            .ok_or_else(|| ExtractError::Parse("response carried no text block".to_string()))?;

        let raw = parse_extraction(text)?;
        let usage = ExtractionUsage {
            provider: ExtractProvider::Primary,
            input_tokens: reply.usage.input_tokens,
            output_tokens: reply.usage.output_tokens,
            cost_usd: reply.usage.input_tokens as f64 * INPUT_COST_PER_MTOK / 1_000_000.0
                + reply.usage.output_tokens as f64 * OUTPUT_COST_PER_MTOK / 1_000_000.0,
        };
        Ok((raw, usage))
    }
}
