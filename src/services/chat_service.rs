use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppError, AppResult};

const CHAT_TIMEOUT_SECS: u64 = 15;

/// Bot-API client for the chat platform: send/edit messages, answer
/// callbacks, download files by id.
pub struct ChatService {
    config: Arc<Config>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ApiReply<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
    #[serde(default)]
    file_size: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

/// A downloaded original plus the platform-reported path (its extension
/// drives classification).
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub file_path: String,
    pub bytes: Vec<u8>,
}

impl ChatService {
    pub fn new(config: Arc<Config>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CHAT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.chat_api_url, self.config.bot_token, method
        )
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> AppResult<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ChatApiError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::ChatApiError(format!(
                "{} failed: {}",
                method, error_text
            )));
        }

        let reply: ApiReply<T> = response
            .json()
            .await
            .map_err(|e| AppError::ChatApiError(e.to_string()))?;

        if !reply.ok {
            return Err(AppError::ChatApiError(
                reply.description.unwrap_or_else(|| format!("{} returned ok=false", method)),
            ));
        }
        reply
            .result
            .ok_or_else(|| AppError::ChatApiError(format!("{} returned no result", method)))
    }

    /// Send a Markdown message, optionally replying to a message and
    /// attaching an inline keyboard. Returns the sent message id.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
        buttons: Option<Vec<Vec<InlineButton>>>,
    ) -> AppResult<i64> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        if let Some(message_id) = reply_to {
            body["reply_to_message_id"] = json!(message_id);
        }
        if let Some(rows) = buttons {
            body["reply_markup"] = json!({ "inline_keyboard": rows });
        }
        let sent: SentMessage = self.call("sendMessage", body).await?;
        Ok(sent.message_id)
    }

    /// Replace the text of an already-sent message (used to resolve the
    /// duplicate warning in place). Removes any inline keyboard.
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> AppResult<()> {
        let body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        let _: serde_json::Value = self.call("editMessageText", body).await?;
        Ok(())
    }

    /// Acknowledge a button press so the client stops its spinner.
    pub async fn answer_callback(&self, callback_id: &str) -> AppResult<()> {
        let body = json!({ "callback_query_id": callback_id });
        let _: bool = self.call("answerCallbackQuery", body).await?;
        Ok(())
    }

    /// Two-step download: resolve the file path, then fetch the bytes.
    /// The platform re-reports the size; the caller revalidates the limit.
    pub async fn download_file(&self, file_id: &str) -> AppResult<DownloadedFile> {
        let info: FileInfo = self
            .call("getFile", json!({ "file_id": file_id }))
            .await?;
        let file_path = info
            .file_path
            .ok_or_else(|| AppError::ChatApiError("getFile returned no file_path".to_string()))?;

        if let Some(size) = info.file_size {
            if size > self.config.max_file_size_bytes as i64 {
                return Err(AppError::ValidationError(format!(
                    "File exceeds size limit: {} bytes",
                    size
                )));
            }
        }

        let url = format!(
            "{}/file/bot{}/{}",
            self.config.chat_api_url, self.config.bot_token, file_path
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::ChatApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::ChatApiError(format!(
                "File download failed with status {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::ChatApiError(e.to_string()))?
            .to_vec();

        if bytes.len() > self.config.max_file_size_bytes {
            return Err(AppError::ValidationError(format!(
                "File exceeds size limit: {} bytes",
                bytes.len()
            )));
        }

        Ok(DownloadedFile { file_path, bytes })
    }
}
