use base64::Engine;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppError, AppResult};

const QUEUE_TIMEOUT_SECS: u64 = 10;

/// Client for the external at-least-once task queue. Tasks are HTTP-target:
/// the queue POSTs the body back to the worker path with exponential backoff
/// up to the configured attempt cap. No ordering is guaranteed and the
/// worker does not rely on any.
pub struct QueueService {
    config: Arc<Config>,
    client: reqwest::Client,
}

impl QueueService {
    pub fn new(config: Arc<Config>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(QUEUE_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    fn create_task_url(&self) -> String {
        format!(
            "{}/projects/{}/locations/{}/queues/{}/tasks",
            self.config.queue_api_url,
            self.config.project_id,
            self.config.queue_region,
            self.config.queue_name
        )
    }

    /// Enqueue a typed task body for a worker path such as `/tasks/ingest`.
    /// Returns as soon as the queue accepts the task.
    pub async fn enqueue<T: Serialize>(&self, worker_path: &str, payload: &T) -> AppResult<()> {
        let body_bytes = serde_json::to_vec(payload)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(body_bytes);

        let task = json!({
            "task": {
                "httpRequest": {
                    "httpMethod": "POST",
                    "url": format!("{}{}", self.config.worker_url, worker_path),
                    "headers": { "Content-Type": "application/json" },
                    "body": encoded,
                },
                "dispatchDeadline": "300s",
            },
            "responseView": "BASIC",
        });

        let response = self
            .client
            .post(self.create_task_url())
            .json(&task)
            .send()
            .await
            .map_err(|e| AppError::QueueError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::QueueError(format!(
                "Enqueue to {} failed: {}",
                worker_path, error_text
            )));
        }
        Ok(())
    }
}
