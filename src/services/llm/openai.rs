use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::models::{ExtractProvider, ExtractionUsage, RawExtraction};
use crate::services::media_service::ImagePayload;

use super::{parse_extraction, ExtractError, VisionExtractor, EXTRACTION_PROMPT};

pub const DEFAULT_API_URL: &str = "https://api.openai.com";
const MAX_TOKENS: u32 = 1024;
const EXTRACT_TIMEOUT_SECS: u64 = 60;

// 4o-class pricing, USD per million tokens.
const INPUT_COST_PER_MTOK: f64 = 2.5;
const OUTPUT_COST_PER_MTOK: f64 = 10.0;

/// Fallback extractor: OpenAI chat completions with data-URL images.
pub struct OpenAiExtractor {
    api_key: String,
    model: String,
    api_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CompletionsReply {
    choices: Vec<Choice>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: i64,
    completion_tokens: i64,
}

impl OpenAiExtractor {
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
impl VisionExtractor for OpenAiExtractor {
    async fn extract(
        &self,
        images: &[ImagePayload],
    ) -> Result<(RawExtraction, ExtractionUsage), ExtractError> {
        if self.api_key.is_empty() {
            return Err(ExtractError::NotConfigured);
        }

        let mut content: Vec<serde_json::Value> =
            vec![json!({ "type": "text", "text": EXTRACTION_PROMPT })];
        content.extend(images.iter().map(|image| {
            let data_url = format!(
                "data:{};base64,{}",
                image.mime,
                base64::engine::general_purpose::STANDARD.encode(&image.bytes)
            );
            json!({ "type": "image_url", "image_url": { "url": data_url } })
        }));

        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{ "role": "user", "content": content }],
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.api_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
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

        let reply: CompletionsReply = response
            .json()
            .await
            .map_err(|e| ExtractError::Parse(e.to_string()))?;

        let text = reply
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .ok_or_else(|| ExtractError::Parse("response carried no content".to_string()))?;

        let raw = parse_extraction(text)?;
        let usage = ExtractionUsage {
            provider: ExtractProvider::Fallback,
            input_tokens: reply.usage.prompt_tokens,
            output_tokens: reply.usage.completion_tokens,
            cost_usd: reply.usage.prompt_tokens as f64 * INPUT_COST_PER_MTOK / 1_000_000.0
                + reply.usage.completion_tokens as f64 * OUTPUT_COST_PER_MTOK / 1_000_000.0,
        };
        Ok((raw, usage))
    }
}
