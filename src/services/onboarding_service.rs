use chrono::{Datelike, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{
    ApprovalMethod, CallbackTask, Language, OnboardCommandTask, OnboardMessageTask,
    OnboardPhotoTask, OnboardingSession, OnboardingStep,
};
use crate::repository::business_repository::NewBusinessConfig;
use crate::repository::tenant_repository::INVITE_ATTEMPT_LIMIT;
use crate::repository::{BusinessRepository, SessionRepository, TenantRepository};
use crate::services::chat_service::InlineButton;
use crate::services::storage_service::logo_object_path;
use crate::services::{ChatService, SheetsService, StorageService};
use crate::utils::i18n::t;
use crate::utils::validator::{is_valid_invite_code, parse_owner_details, OwnerDetailsError};

const DEFAULT_SIGNATURE_TEXT: &str = "מסמך ממוחשב חתום דיגיטלית";
const DEFAULT_GENERATED_BY_TEXT: &str = "Generated by Scribe";

/// Nine-step onboarding machine, admission-gated by invite codes. Steps
/// advance on conversational messages, photos (logo) and inline buttons;
/// invalid input repeats the step prompt with a field-specific error.
pub struct OnboardingService {
    config: Arc<Config>,
    tenant_repo: Arc<TenantRepository>,
    business_repo: Arc<BusinessRepository>,
    session_repo: Arc<SessionRepository>,
    chat: Arc<ChatService>,
    storage: Arc<StorageService>,
    sheets: Arc<SheetsService>,
}

impl OnboardingService {
    pub fn new(
        config: Arc<Config>,
        tenant_repo: Arc<TenantRepository>,
        business_repo: Arc<BusinessRepository>,
        session_repo: Arc<SessionRepository>,
        chat: Arc<ChatService>,
        storage: Arc<StorageService>,
        sheets: Arc<SheetsService>,
    ) -> Self {
        Self {
            config,
            tenant_repo,
            business_repo,
            session_repo,
            chat,
            storage,
            sheets,
        }
    }

    /// `/onboard [code]`. Unapproved tenants must present a redeemable
    /// invite code; repeated failures suppress replies for the window.
    pub async fn handle_command(&self, task: &OnboardCommandTask) -> AppResult<&'static str> {
        let approved = self.tenant_repo.is_approved(task.tenant_id).await?;

        if !approved {
            let code = match task.invite_code.as_deref() {
                Some(code) => code,
                None => {
                    self.send(task.tenant_id, &t(Language::En, "invite_required", &[]))
                        .await;
                    return Ok("invite_required");
                }
            };

            let redeemable = is_valid_invite_code(code)
                && match self.tenant_repo.find_invite_code(code).await? {
                    Some(invite) => invite.is_redeemable(Utc::now()),
                    None => false,
                };

            if !redeemable {
                let failures = self.tenant_repo.record_invite_failure(task.tenant_id).await?;
                if failures > INVITE_ATTEMPT_LIMIT {
                    info!(tenant_id = task.tenant_id, "Invite failures suppressed");
                    return Ok("suppressed");
                }
                self.send(task.tenant_id, &t(Language::En, "invite_invalid", &[]))
                    .await;
                return Ok("invite_invalid");
            }

            self.tenant_repo
                .redeem_invite_code(code, task.tenant_id, &task.chat_title)
                .await?;
            self.tenant_repo
                .approve(task.tenant_id, &task.chat_title, ApprovalMethod::InviteCode, Some(code))
                .await?;
            self.tenant_repo.clear_invite_failures(task.tenant_id).await?;
        } else if self.business_repo.find_by_tenant(task.tenant_id).await?.is_some() {
            self.send(task.tenant_id, &t(Language::En, "onboard_already", &[]))
                .await;
            return Ok("already_onboarded");
        }

        self.session_repo
            .start_onboarding(task.tenant_id, task.user_id, &task.chat_title)
            .await?;
        let text = format!(
            "{}\n{}",
            t(Language::En, "onboard_welcome", &[]),
            t(Language::En, "onboard_language_prompt", &[])
        );
        self.chat
            .send_message(task.tenant_id, &text, None, Some(language_buttons()))
            .await?;
        Ok("onboarding_started")
    }

    /// Inline-button input: language selection and the counter shortcut.
    pub async fn handle_callback(&self, task: &CallbackTask) -> AppResult<()> {
        if self.session_repo.callback_seen(task.update_id).await? {
            self.answer_quietly(&task.callback_id).await;
            return Ok(());
        }

        let mut session = match self.session_repo.find_active_onboarding(task.tenant_id).await? {
            Some(session) => session,
            None => {
                self.answer_quietly(&task.callback_id).await;
                return Ok(());
            }
        };

        match task.data.as_str() {
            "onb:lang:en" | "onb:lang:he" if session.step == OnboardingStep::Language => {
                session.language = if task.data.ends_with(":he") {
                    Language::He
                } else {
                    Language::En
                };
                session.step = OnboardingStep::BusinessName;
                self.session_repo.save_onboarding(&session).await?;
                self.send(
                    session.tenant_id,
                    &t(session.language, "onboard_business_name_prompt", &[]),
                )
                .await;
            }
            "onb:counter:start1" if session.step == OnboardingStep::Counter => {
                self.complete(&mut session, None).await?;
            }
            _ => {}
        }

        self.answer_quietly(&task.callback_id).await;
        if let Err(e) = self.session_repo.record_callback(task.update_id).await {
            warn!(update_id = task.update_id, "Callback dedup write failed: {}", e);
        }
        Ok(())
    }

    /// Conversational input for the current step.
    pub async fn handle_message(&self, task: &OnboardMessageTask) -> AppResult<()> {
        let mut session = match self.session_repo.find_active_onboarding(task.tenant_id).await? {
            Some(session) => session,
            None => return Ok(()),
        };
        let lang = session.language;
        let text = task.text.trim();

        match session.step {
            OnboardingStep::Language => match parse_language(text) {
                Some(language) => {
                    session.language = language;
                    self.advance(&mut session, OnboardingStep::BusinessName).await?;
                }
                None => {
                    self.chat
                        .send_message(
                            session.tenant_id,
                            &t(lang, "onboard_language_prompt", &[]),
                            None,
                            Some(language_buttons()),
                        )
                        .await?;
                }
            },
            OnboardingStep::BusinessName => {
                if text.is_empty() {
                    self.send(session.tenant_id, &t(lang, "onboard_business_name_prompt", &[]))
                        .await;
                } else {
                    session.business_name = Some(text.to_string());
                    self.advance(&mut session, OnboardingStep::OwnerDetails).await?;
                }
            }
            OnboardingStep::OwnerDetails => match parse_owner_details(text) {
                Ok(details) => {
                    session.owner_name = Some(details.name);
                    session.tax_id = Some(details.tax_id);
                    session.phone = Some(details.phone);
                    session.email = Some(details.email);
                    self.advance(&mut session, OnboardingStep::Address).await?;
                }
                Err(error) => {
                    let key = match error {
                        OwnerDetailsError::Format => "onboard_error_owner_format",
                        OwnerDetailsError::TaxId => "onboard_error_tax_id",
                        OwnerDetailsError::Phone => "onboard_error_phone",
                        OwnerDetailsError::Email => "onboard_error_email",
                    };
                    let reply = format!(
                        "{}\n{}",
                        t(lang, key, &[]),
                        t(lang, "onboard_owner_details_prompt", &[])
                    );
                    self.send(session.tenant_id, &reply).await;
                }
            },
            OnboardingStep::Address => {
                if text.is_empty() {
                    self.send(session.tenant_id, &t(lang, "onboard_address_prompt", &[]))
                        .await;
                } else {
                    session.address = Some(text.to_string());
                    self.advance(&mut session, OnboardingStep::TaxStatus).await?;
                }
            }
            OnboardingStep::TaxStatus => {
                if text.is_empty() {
                    self.send(session.tenant_id, &t(lang, "onboard_tax_status_prompt", &[]))
                        .await;
                } else {
                    session.tax_status = Some(text.to_string());
                    self.advance(&mut session, OnboardingStep::Logo).await?;
                }
            }
            OnboardingStep::Logo => {
                if text.eq_ignore_ascii_case("/skip") {
                    self.advance(&mut session, OnboardingStep::Sheet).await?;
                } else {
                    self.send(session.tenant_id, &t(lang, "onboard_logo_invalid", &[]))
                        .await;
                }
            }
            OnboardingStep::Sheet => {
                self.handle_sheet_id(&mut session, text).await?;
            }
            OnboardingStep::Counter => match text.parse::<i64>() {
                Ok(start) if start >= 1 => {
                    // Seed with start-1 so the first issued number is the
                    // one the user asked for.
                    self.complete(&mut session, Some(start - 1)).await?;
                }
                _ => {
                    self.chat
                        .send_message(
                            session.tenant_id,
                            &t(lang, "onboard_counter_error", &[]),
                            None,
                            Some(counter_buttons(lang)),
                        )
                        .await?;
                }
            },
            OnboardingStep::Complete => {}
        }
        Ok(())
    }

    /// A logo candidate: photo or image document during the logo step.
    pub async fn handle_photo(&self, task: &OnboardPhotoTask) -> AppResult<()> {
        let mut session = match self.session_repo.find_active_onboarding(task.tenant_id).await? {
            Some(session) => session,
            None => return Ok(()),
        };
        if session.step != OnboardingStep::Logo {
            return Ok(());
        }

        let downloaded = self.chat.download_file(&task.file_id).await?;
        let filename = task
            .file_name
            .clone()
            .unwrap_or_else(|| {
                downloaded
                    .file_path
                    .rsplit('/')
                    .next()
                    .unwrap_or("logo.jpg")
                    .to_string()
            });
        let object_path = logo_object_path(task.tenant_id, &filename);
        let logo_url = self
            .storage
            .upload(
                &self.config.logo_bucket,
                &object_path,
                downloaded.bytes,
                "image/jpeg",
            )
            .await?;

        session.logo_url = Some(logo_url);
        self.advance(&mut session, OnboardingStep::Sheet).await?;
        Ok(())
    }

    /// `/cancel` inside an active onboarding session.
    pub async fn handle_cancel(&self, tenant_id: i64) -> AppResult<bool> {
        let session = match self.session_repo.find_active_onboarding(tenant_id).await? {
            Some(session) => session,
            None => return Ok(false),
        };
        self.session_repo.delete_onboarding(tenant_id).await?;
        self.send(tenant_id, &t(session.language, "onboard_cancelled", &[]))
            .await;
        Ok(true)
    }

    /// The sheet step is required: the id must be readable through the
    /// service identity before the flow advances, and its tabs are echoed
    /// back.
    async fn handle_sheet_id(&self, session: &mut OnboardingSession, text: &str) -> AppResult<()> {
        let lang = session.language;
        let service_account = self.config.service_account_email.clone();
        if text.is_empty() {
            self.send(
                session.tenant_id,
                &t(lang, "onboard_sheet_prompt", &[("service_account", &service_account)]),
            )
            .await;
            return Ok(());
        }

        match self.sheets.list_tabs(text).await {
            Ok(tabs) => {
                session.sheet_id = Some(text.to_string());
                session.step = OnboardingStep::Counter;
                self.session_repo.save_onboarding(session).await?;
                let confirmation =
                    t(lang, "onboard_sheet_ok", &[("tabs", &tabs.join(", "))]);
                self.send(session.tenant_id, &confirmation).await;
                self.chat
                    .send_message(
                        session.tenant_id,
                        &t(lang, "onboard_counter_prompt", &[]),
                        None,
                        Some(counter_buttons(lang)),
                    )
                    .await?;
            }
            Err(e) => {
                info!(tenant_id = session.tenant_id, "Sheet verification failed: {}", e);
                self.send(
                    session.tenant_id,
                    &t(lang, "onboard_sheet_error", &[("service_account", &service_account)]),
                )
                .await;
            }
        }
        Ok(())
    }

    /// Save collected data, move the marker and send the next prompt.
    async fn advance(
        &self,
        session: &mut OnboardingSession,
        next: OnboardingStep,
    ) -> AppResult<()> {
        session.step = next;
        self.session_repo.save_onboarding(session).await?;

        let lang = session.language;
        let service_account = self.config.service_account_email.clone();
        let prompt = match next {
            OnboardingStep::BusinessName => t(lang, "onboard_business_name_prompt", &[]),
            OnboardingStep::OwnerDetails => t(lang, "onboard_owner_details_prompt", &[]),
            OnboardingStep::Address => t(lang, "onboard_address_prompt", &[]),
            OnboardingStep::TaxStatus => t(lang, "onboard_tax_status_prompt", &[]),
            OnboardingStep::Logo => t(lang, "onboard_logo_prompt", &[]),
            OnboardingStep::Sheet => {
                t(lang, "onboard_sheet_prompt", &[("service_account", &service_account)])
            }
            _ => String::new(),
        };
        if !prompt.is_empty() {
            self.send(session.tenant_id, &prompt).await;
        }
        Ok(())
    }

    /// Completion writes config, mapping and conditional counter seed in
    /// one transaction, then drops the session.
    async fn complete(
        &self,
        session: &mut OnboardingSession,
        counter_seed: Option<i64>,
    ) -> AppResult<()> {
        let year = Utc::now().year();
        self.business_repo
            .complete_onboarding(
                NewBusinessConfig {
                    tenant_id: session.tenant_id,
                    language: session.language,
                    business_name: session.business_name.as_deref().unwrap_or(""),
                    tax_id: session.tax_id.as_deref().unwrap_or(""),
                    tax_status: session.tax_status.as_deref().unwrap_or(""),
                    email: session.email.as_deref().unwrap_or(""),
                    phone: session.phone.as_deref().unwrap_or(""),
                    address: session.address.as_deref().unwrap_or(""),
                    logo_url: session.logo_url.as_deref(),
                    sheet_id: session.sheet_id.as_deref().unwrap_or(""),
                    digital_signature_text: DEFAULT_SIGNATURE_TEXT,
                    generated_by_text: DEFAULT_GENERATED_BY_TEXT,
                },
                session.user_id,
                &session.chat_title,
                counter_seed.filter(|seed| *seed > 0),
                year,
            )
            .await?;
        self.session_repo.delete_onboarding(session.tenant_id).await?;
        self.send(session.tenant_id, &t(session.language, "onboard_complete", &[]))
            .await;
        info!(tenant_id = session.tenant_id, "Onboarding completed");
        Ok(())
    }

    async fn send(&self, tenant_id: i64, text: &str) {
        if let Err(e) = self.chat.send_message(tenant_id, text, None, None).await {
            warn!(tenant_id, "Onboarding reply failed: {}", e);
        }
    }

    async fn answer_quietly(&self, callback_id: &str) {
        if let Err(e) = self.chat.answer_callback(callback_id).await {
            warn!("answerCallbackQuery failed: {}", e);
        }
    }
}

fn parse_language(text: &str) -> Option<Language> {
    match text.to_lowercase().as_str() {
        "en" | "english" => Some(Language::En),
        "he" | "hebrew" | "עברית" => Some(Language::He),
        _ => None,
    }
}

fn language_buttons() -> Vec<Vec<InlineButton>> {
    vec![vec![
        InlineButton {
            text: "English".to_string(),
            callback_data: "onb:lang:en".to_string(),
        },
        InlineButton {
            text: "עברית".to_string(),
            callback_data: "onb:lang:he".to_string(),
        },
    ]]
}

fn counter_buttons(lang: Language) -> Vec<Vec<InlineButton>> {
    vec![vec![InlineButton {
        text: t(lang, "btn_counter_start_1", &[]),
        callback_data: "onb:counter:start1".to_string(),
    }]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_parsing_accepts_both_tongues() {
        assert_eq!(parse_language("English"), Some(Language::En));
        assert_eq!(parse_language("hebrew"), Some(Language::He));
        assert_eq!(parse_language("עברית"), Some(Language::He));
        assert_eq!(parse_language("français"), None);
    }

    #[test]
    fn language_buttons_carry_callback_payloads() {
        let rows = language_buttons();
        assert_eq!(rows[0][0].callback_data, "onb:lang:en");
        assert_eq!(rows[0][1].callback_data, "onb:lang:he");
    }
}
