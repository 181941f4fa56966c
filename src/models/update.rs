use serde::{Deserialize, Serialize};

/// Chat-platform update envelope, parsed once at the webhook and
/// discriminated into exactly one `Classification`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<ChatUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<Vec<PhotoSize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub chat_type: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatUser {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: i64,
    pub height: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Document {
    pub file_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: ChatUser,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Box<ChatMessage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Router-visible facts about the tenant, read through the TTL caches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyContext {
    pub tenant_approved: bool,
    pub onboarding_active: bool,
    pub invoicegen_active: bool,
    pub max_file_size_bytes: usize,
}

/// What the ingest router decided to do with an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Inline-button press.
    Callback,
    /// `/onboard`, optionally followed by an invite code.
    OnboardCommand { invite_code: Option<String> },
    /// `/invoice` from an approved tenant.
    InvoiceCommand,
    /// `/report` from an approved tenant.
    ReportCommand,
    /// `/cancel` while a conversational session is active.
    CancelCommand,
    /// Free text advancing an active onboarding session.
    OnboardingMessage,
    /// A photo while the onboarding logo step may be active.
    OnboardingPhoto,
    /// Free text advancing an active invoice-generation session.
    InvoiceGenMessage,
    /// A photo to ingest.
    IngestPhoto,
    /// A PDF document to ingest.
    IngestPdf,
    /// Document or photo above the pre-normalization size limit.
    RejectedSizeLimit,
    /// A command we recognize the shape of but do not serve here.
    IgnoredCommand,
    /// Everything else.
    Ignored,
}

impl Update {
    /// Discriminate the update exactly once. Downstream code never inspects
    /// the raw envelope again.
    pub fn classify(&self, ctx: &ClassifyContext) -> Classification {
        if self.callback_query.is_some() {
            return Classification::Callback;
        }

        let message = match &self.message {
            Some(m) => m,
            None => return Classification::Ignored,
        };

        if let Some(text) = message.text.as_deref() {
            let trimmed = text.trim();
            if let Some(rest) = strip_command(trimmed, "/onboard") {
                let invite_code = rest.split_whitespace().next().map(|s| s.to_string());
                return Classification::OnboardCommand { invite_code };
            }
            if strip_command(trimmed, "/invoice").is_some() {
                if !ctx.tenant_approved {
                    return Classification::IgnoredCommand;
                }
                return Classification::InvoiceCommand;
            }
            if strip_command(trimmed, "/report").is_some() {
                if !ctx.tenant_approved {
                    return Classification::IgnoredCommand;
                }
                return Classification::ReportCommand;
            }
            if strip_command(trimmed, "/cancel").is_some() {
                if ctx.onboarding_active || ctx.invoicegen_active {
                    return Classification::CancelCommand;
                }
                return Classification::IgnoredCommand;
            }
            // /skip belongs to the onboarding logo step
            if strip_command(trimmed, "/skip").is_some() {
                if ctx.onboarding_active {
                    return Classification::OnboardingMessage;
                }
                return Classification::IgnoredCommand;
            }
            if trimmed.starts_with('/') {
                return Classification::IgnoredCommand;
            }
            if ctx.onboarding_active {
                return Classification::OnboardingMessage;
            }
            if ctx.invoicegen_active {
                return Classification::InvoiceGenMessage;
            }
            return Classification::Ignored;
        }

        if let Some(photo) = &message.photo {
            if photo.is_empty() {
                return Classification::Ignored;
            }
            if ctx.onboarding_active {
                return Classification::OnboardingPhoto;
            }
            if !ctx.tenant_approved {
                return Classification::Ignored;
            }
            let largest = photo.iter().filter_map(|p| p.file_size).max().unwrap_or(0);
            if largest > ctx.max_file_size_bytes as i64 {
                return Classification::RejectedSizeLimit;
            }
            return Classification::IngestPhoto;
        }

        if let Some(document) = &message.document {
            let mime = document.mime_type.as_deref().unwrap_or("");
            if ctx.onboarding_active && mime.starts_with("image/") {
                return Classification::OnboardingPhoto;
            }
            if mime != "application/pdf" {
                return Classification::Ignored;
            }
            if !ctx.tenant_approved {
                return Classification::Ignored;
            }
            if document.file_size.unwrap_or(0) > ctx.max_file_size_bytes as i64 {
                return Classification::RejectedSizeLimit;
            }
            return Classification::IngestPdf;
        }

        Classification::Ignored
    }

    /// The photo size the pipeline should fetch: highest resolution.
    pub fn best_photo(message: &ChatMessage) -> Option<&PhotoSize> {
        message
            .photo
            .as_ref()
            .and_then(|sizes| sizes.iter().max_by_key(|p| p.width * p.height))
    }
}

/// Matches `/cmd`, `/cmd@botname` and `/cmd args`, returning the argument
/// tail.
fn strip_command<'a>(text: &'a str, command: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(command)?;
    match rest.chars().next() {
        None => Some(""),
        Some(' ') => Some(rest.trim_start()),
        Some('@') => {
            let after_bot = rest.split_once(' ').map(|(_, tail)| tail).unwrap_or("");
            Some(after_bot.trim_start())
        }
        _ => None,
    }
}
