use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{
    CallbackTask, CancelTask, ChatMessage, Classification, ClassifyContext, InvoiceCallbackTask,
    InvoiceCommandTask, InvoiceMessageTask, OnboardCommandTask, OnboardMessageTask,
    OnboardPhotoTask, ReportTask, TaskPayload, Update,
};
use crate::repository::{SessionRepository, TenantRepository};
use crate::services::QueueService;
use crate::utils::cache::{spawn_sweeper, TtlCache};

const CACHE_TTL_SECS: u64 = 300;

/// The ingest router: classify the update exactly once, enqueue a typed
/// task, return. Business logic never runs here; the webhook must
/// acknowledge before the chat platform starts retrying.
pub struct IngestService {
    config: Arc<Config>,
    tenant_repo: Arc<TenantRepository>,
    session_repo: Arc<SessionRepository>,
    queue: Arc<QueueService>,
    approved_cache: Arc<TtlCache<i64, bool>>,
    onboarding_cache: Arc<TtlCache<i64, bool>>,
    invoicegen_cache: Arc<TtlCache<i64, bool>>,
}

impl IngestService {
    pub fn new(
        config: Arc<Config>,
        tenant_repo: Arc<TenantRepository>,
        session_repo: Arc<SessionRepository>,
        queue: Arc<QueueService>,
    ) -> Self {
        let ttl = Duration::from_secs(CACHE_TTL_SECS);
        let approved_cache = Arc::new(TtlCache::new(ttl));
        let onboarding_cache = Arc::new(TtlCache::new(ttl));
        let invoicegen_cache = Arc::new(TtlCache::new(ttl));
        spawn_sweeper(approved_cache.clone(), ttl);
        spawn_sweeper(onboarding_cache.clone(), ttl);
        spawn_sweeper(invoicegen_cache.clone(), ttl);
        Self {
            config,
            tenant_repo,
            session_repo,
            queue,
            approved_cache,
            onboarding_cache,
            invoicegen_cache,
        }
    }

    /// Handle one webhook delivery; returns the action echoed to the
    /// platform.
    pub async fn handle_update(&self, update: &Update) -> AppResult<&'static str> {
        let tenant_id = tenant_of(update);
        let ctx = match tenant_id {
            Some(id) => self.classify_context(id).await,
            None => ClassifyContext {
                max_file_size_bytes: self.config.max_file_size_bytes,
                ..Default::default()
            },
        };

        let classification = update.classify(&ctx);
        let message = update.message.as_ref();

        match classification {
            Classification::Callback => {
                let Some(cq) = update.callback_query.as_ref() else {
                    return Ok("ignored");
                };
                let (chat_id, message_id) = cq
                    .message
                    .as_ref()
                    .map(|m| (m.chat.id, m.message_id))
                    .unwrap_or((cq.from.id, 0));
                let data = cq.data.clone().unwrap_or_default();
                if data.starts_with("inv:") {
                    let task = InvoiceCallbackTask {
                        update_id: update.update_id,
                        callback_id: cq.id.clone(),
                        tenant_id: chat_id,
                        user_id: cq.from.id,
                        message_id,
                        data,
                    };
                    self.queue.enqueue("/tasks/invoice-callback", &task).await?;
                } else {
                    let task = CallbackTask {
                        update_id: update.update_id,
                        callback_id: cq.id.clone(),
                        tenant_id: chat_id,
                        message_id,
                        user_id: cq.from.id,
                        data,
                    };
                    self.queue.enqueue("/tasks/callback", &task).await?;
                }
                Ok("callback_enqueued")
            }
            Classification::OnboardCommand { invite_code } => {
                let Some(m) = message else {
                    return Ok("ignored");
                };
                let task = OnboardCommandTask {
                    tenant_id: m.chat.id,
                    user_id: m.from.as_ref().map(|u| u.id).unwrap_or_default(),
                    chat_title: m.chat.title.clone().unwrap_or_default(),
                    invite_code,
                };
                self.queue.enqueue("/tasks/onboard", &task).await?;
                // a fresh session will exist shortly; prime the cache so the
                // step replies that follow are not classified as Ignored
                self.onboarding_cache.insert(m.chat.id, true).await;
                Ok("enqueued")
            }
            Classification::InvoiceCommand => {
                let Some(m) = message else {
                    return Ok("ignored");
                };
                let task = InvoiceCommandTask {
                    tenant_id: m.chat.id,
                    user_id: m.from.as_ref().map(|u| u.id).unwrap_or_default(),
                    username: m
                        .from
                        .as_ref()
                        .and_then(|u| u.username.clone())
                        .unwrap_or_default(),
                };
                self.queue.enqueue("/tasks/invoice-command", &task).await?;
                // a fresh session will exist shortly; prime the cache
                self.invoicegen_cache.insert(m.chat.id, true).await;
                Ok("enqueued")
            }
            Classification::ReportCommand => {
                let Some(m) = message else {
                    return Ok("ignored");
                };
                let task = ReportTask {
                    tenant_id: m.chat.id,
                    user_id: m.from.as_ref().map(|u| u.id).unwrap_or_default(),
                };
                self.queue.enqueue("/tasks/report", &task).await?;
                Ok("enqueued")
            }
            Classification::CancelCommand => {
                let Some(m) = message else {
                    return Ok("ignored");
                };
                let task = CancelTask {
                    tenant_id: m.chat.id,
                    user_id: m.from.as_ref().map(|u| u.id).unwrap_or_default(),
                };
                self.queue.enqueue("/tasks/cancel", &task).await?;
                Ok("enqueued")
            }
            Classification::OnboardingMessage => {
                let Some(m) = message else {
                    return Ok("ignored");
                };
                let task = OnboardMessageTask {
                    tenant_id: m.chat.id,
                    user_id: m.from.as_ref().map(|u| u.id).unwrap_or_default(),
                    text: m.text.clone().unwrap_or_default(),
                };
                self.queue.enqueue("/tasks/onboard-message", &task).await?;
                Ok("enqueued")
            }
            Classification::OnboardingPhoto => {
                let Some(m) = message else {
                    return Ok("ignored");
                };
                let (file_id, file_name) = photo_file(m);
                let task = OnboardPhotoTask {
                    tenant_id: m.chat.id,
                    user_id: m.from.as_ref().map(|u| u.id).unwrap_or_default(),
                    file_id,
                    file_name,
                };
                self.queue.enqueue("/tasks/onboard-photo", &task).await?;
                Ok("enqueued")
            }
            Classification::InvoiceGenMessage => {
                let Some(m) = message else {
                    return Ok("ignored");
                };
                let task = InvoiceMessageTask {
                    tenant_id: m.chat.id,
                    user_id: m.from.as_ref().map(|u| u.id).unwrap_or_default(),
                    text: m.text.clone().unwrap_or_default(),
                };
                self.queue.enqueue("/tasks/invoice-message", &task).await?;
                Ok("enqueued")
            }
            Classification::IngestPhoto | Classification::IngestPdf => {
                let Some(m) = message else {
                    return Ok("ignored");
                };
                let file_id = if classification == Classification::IngestPdf {
                    m.document.as_ref().map(|d| d.file_id.clone()).unwrap_or_default()
                } else {
                    Update::best_photo(m).map(|p| p.file_id.clone()).unwrap_or_default()
                };
                let task = TaskPayload {
                    tenant_id: m.chat.id,
                    message_id: m.message_id,
                    file_id,
                    uploader_username: m
                        .from
                        .as_ref()
                        .and_then(|u| u.username.clone())
                        .unwrap_or_default(),
                    uploader_first_name: m
                        .from
                        .as_ref()
                        .and_then(|u| u.first_name.clone())
                        .unwrap_or_default(),
                    chat_title: m.chat.title.clone().unwrap_or_default(),
                    received_at: Utc::now(),
                };
                self.queue.enqueue("/tasks/ingest", &task).await?;
                Ok("enqueued")
            }
            Classification::RejectedSizeLimit => Ok("rejected_size_limit"),
            Classification::IgnoredCommand => Ok("ignored_command"),
            Classification::Ignored => Ok("ignored"),
        }
    }

    /// Router-visible tenant facts, read through the 5-minute caches.
    /// Cache or store failures fail safe: not approved, no sessions.
    async fn classify_context(&self, tenant_id: i64) -> ClassifyContext {
        let tenant_approved = match self.approved_cache.get(&tenant_id).await {
            Some(cached) => cached,
            None => match self.tenant_repo.is_approved(tenant_id).await {
                Ok(approved) => {
                    self.approved_cache.insert(tenant_id, approved).await;
                    approved
                }
                Err(e) => {
                    warn!(tenant_id, "Approval lookup failed, assuming not approved: {}", e);
                    false
                }
            },
        };

        let onboarding_active = match self.onboarding_cache.get(&tenant_id).await {
            Some(cached) => cached,
            None => match self.session_repo.find_active_onboarding(tenant_id).await {
                Ok(session) => {
                    let active = session.is_some();
                    self.onboarding_cache.insert(tenant_id, active).await;
                    active
                }
                Err(e) => {
                    warn!(tenant_id, "Onboarding lookup failed, assuming inactive: {}", e);
                    false
                }
            },
        };

        let invoicegen_active = match self.invoicegen_cache.get(&tenant_id).await {
            Some(cached) => cached,
            None => match self.session_repo.tenant_has_invoicegen(tenant_id).await {
                Ok(active) => {
                    self.invoicegen_cache.insert(tenant_id, active).await;
                    active
                }
                Err(e) => {
                    warn!(tenant_id, "Session lookup failed, assuming inactive: {}", e);
                    false
                }
            },
        };

        ClassifyContext {
            tenant_approved,
            onboarding_active,
            invoicegen_active,
            max_file_size_bytes: self.config.max_file_size_bytes,
        }
    }
}

fn tenant_of(update: &Update) -> Option<i64> {
    if let Some(m) = &update.message {
        return Some(m.chat.id);
    }
    update
        .callback_query
        .as_ref()
        .and_then(|cq| cq.message.as_ref())
        .map(|m| m.chat.id)
}

fn photo_file(message: &ChatMessage) -> (String, Option<String>) {
    if let Some(photo) = Update::best_photo(message) {
        return (photo.file_id.clone(), None);
    }
    match &message.document {
        Some(document) => (document.file_id.clone(), document.file_name.clone()),
        None => (String::new(), None),
    }
}
