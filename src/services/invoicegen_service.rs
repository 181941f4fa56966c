use chrono::{Datelike, Utc};
use futures_util::future::try_join;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{
    DocumentType, InvoiceCallbackTask, InvoiceCommandTask, InvoiceGenSession, InvoiceGenStatus,
    InvoiceMessageTask, Language, PaymentMethod,
};
use crate::repository::invoice_repository::NewGeneratedInvoice;
use crate::repository::{
    BusinessRepository, CounterRepository, GeneratedInvoiceRepository, SessionRepository,
};
use crate::services::chat_service::InlineButton;
use crate::services::storage_service::generated_object_path;
use crate::services::{ChatService, PipelineService, RendererService, StorageService};
use crate::utils::html::{render_invoice_html, InvoiceTemplateData};
use crate::utils::i18n::t;
use crate::utils::validator::is_valid_tax_id;

/// Details collected from the single comma-separated message:
/// `customer name, amount, description[, customer tax id]`.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDetails {
    pub customer_name: String,
    pub amount: Decimal,
    pub description: String,
    pub customer_tax_id: Option<String>,
}

pub fn parse_invoice_details(text: &str) -> Option<InvoiceDetails> {
    let mut parts: Vec<&str> = text.split(',').map(|p| p.trim()).collect();
    if parts.len() < 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    // A trailing 9-digit part is the optional customer tax id.
    let customer_tax_id = if parts.len() >= 4 && is_valid_tax_id(parts[parts.len() - 1]) {
        parts.pop().map(|p| p.to_string())
    } else {
        None
    };

    let customer_name = parts[0].to_string();
    let amount: Decimal = parts[1].parse().ok()?;
    if amount <= Decimal::ZERO {
        return None;
    }
    let description = parts[2..].join(", ");

    Some(InvoiceDetails {
        customer_name,
        amount,
        description,
        customer_tax_id,
    })
}

/// Four-step invoice authoring: select_type, awaiting_details,
/// awaiting_payment, confirming, then the produce saga. Sessions carry a
/// one-hour TTL and are deleted on read when stale.
pub struct InvoiceGenService {
    config: Arc<Config>,
    business_repo: Arc<BusinessRepository>,
    session_repo: Arc<SessionRepository>,
    counter_repo: Arc<CounterRepository>,
    invoice_repo: Arc<GeneratedInvoiceRepository>,
    chat: Arc<ChatService>,
    storage: Arc<StorageService>,
    renderer: Arc<RendererService>,
    pipeline: Arc<PipelineService>,
}

impl InvoiceGenService {
    pub fn new(
        config: Arc<Config>,
        business_repo: Arc<BusinessRepository>,
        session_repo: Arc<SessionRepository>,
        counter_repo: Arc<CounterRepository>,
        invoice_repo: Arc<GeneratedInvoiceRepository>,
        chat: Arc<ChatService>,
        storage: Arc<StorageService>,
        renderer: Arc<RendererService>,
        pipeline: Arc<PipelineService>,
    ) -> Self {
        Self {
            config,
            business_repo,
            session_repo,
            counter_repo,
            invoice_repo,
            chat,
            storage,
            renderer,
            pipeline,
        }
    }

    /// `/invoice`: open a session at the type-selection step.
    pub async fn handle_command(&self, task: &InvoiceCommandTask) -> AppResult<()> {
        let config = match self.business_repo.find_by_tenant(task.tenant_id).await? {
            Some(config) => config,
            None => {
                self.send(task.tenant_id, &t(Language::En, "invgen_no_config", &[]))
                    .await;
                return Ok(());
            }
        };

        self.session_repo
            .start_invoicegen(task.tenant_id, task.user_id, &task.username)
            .await?;

        let lang = config.language;
        let buttons = vec![vec![
            InlineButton {
                text: t(lang, "btn_doc_invoice", &[]),
                callback_data: "inv:type:invoice".to_string(),
            },
            InlineButton {
                text: t(lang, "btn_doc_invoice_receipt", &[]),
                callback_data: "inv:type:invoice_receipt".to_string(),
            },
        ]];
        self.chat
            .send_message(task.tenant_id, &t(lang, "invgen_select_type", &[]), None, Some(buttons))
            .await?;
        Ok(())
    }

    /// Conversational input; only the details step consumes free text.
    pub async fn handle_message(&self, task: &InvoiceMessageTask) -> AppResult<()> {
        let session = match self
            .session_repo
            .find_fresh_invoicegen(task.tenant_id, task.user_id)
            .await?
        {
            Some(session) => session,
            None => return Ok(()),
        };
        let lang = self.tenant_language(task.tenant_id).await;

        match session.status {
            InvoiceGenStatus::AwaitingDetails => match parse_invoice_details(&task.text) {
                Some(details) => {
                    self.session_repo
                        .save_invoicegen(
                            &session.id,
                            InvoiceGenStatus::AwaitingPayment,
                            session.document_type,
                            Some(&details.customer_name),
                            details.customer_tax_id.as_deref(),
                            Some(&details.description),
                            Some(details.amount),
                            None,
                        )
                        .await?;
                    self.chat
                        .send_message(
                            task.tenant_id,
                            &t(lang, "invgen_payment_prompt", &[]),
                            None,
                            Some(payment_buttons(lang)),
                        )
                        .await?;
                }
                None => {
                    self.send(task.tenant_id, &t(lang, "invgen_details_error", &[]))
                        .await;
                }
            },
            InvoiceGenStatus::SelectType => {
                self.send(task.tenant_id, &t(lang, "invgen_select_type", &[]))
                    .await;
            }
            InvoiceGenStatus::AwaitingPayment => {
                self.chat
                    .send_message(
                        task.tenant_id,
                        &t(lang, "invgen_payment_prompt", &[]),
                        None,
                        Some(payment_buttons(lang)),
                    )
                    .await?;
            }
            InvoiceGenStatus::Confirming => {
                self.send_confirmation(&session, lang).await?;
            }
        }
        Ok(())
    }

    /// Inline-button input: type selection, payment method, confirm/cancel.
    pub async fn handle_callback(&self, task: &InvoiceCallbackTask) -> AppResult<()> {
        if self.session_repo.callback_seen(task.update_id).await? {
            self.answer_quietly(&task.callback_id).await;
            return Ok(());
        }

        let lang = self.tenant_language(task.tenant_id).await;

        if task.data == "inv:cancel" {
            // Cancellation clears the session only; no other side effects.
            self.session_repo
                .delete_invoicegen(task.tenant_id, task.user_id)
                .await?;
            self.send(task.tenant_id, &t(lang, "invgen_cancelled", &[])).await;
            self.finish_callback(task).await;
            return Ok(());
        }

        let session = match self
            .session_repo
            .find_fresh_invoicegen(task.tenant_id, task.user_id)
            .await?
        {
            Some(session) => session,
            None => {
                self.send(task.tenant_id, &t(lang, "invgen_expired", &[])).await;
                self.finish_callback(task).await;
                return Ok(());
            }
        };

        if let Some(type_name) = task.data.strip_prefix("inv:type:") {
            if session.status == InvoiceGenStatus::SelectType {
                if let Some(document_type) = DocumentType::parse(type_name) {
                    self.session_repo
                        .save_invoicegen(
                            &session.id,
                            InvoiceGenStatus::AwaitingDetails,
                            Some(document_type),
                            None,
                            None,
                            None,
                            None,
                            None,
                        )
                        .await?;
                    self.send(task.tenant_id, &t(lang, "invgen_details_prompt", &[]))
                        .await;
                }
            }
        } else if let Some(method_name) = task.data.strip_prefix("inv:pay:") {
            if session.status == InvoiceGenStatus::AwaitingPayment {
                if let Some(method) = PaymentMethod::parse(method_name) {
                    self.session_repo
                        .save_invoicegen(
                            &session.id,
                            InvoiceGenStatus::Confirming,
                            session.document_type,
                            session.customer_name.as_deref(),
                            session.customer_tax_id.as_deref(),
                            session.description.as_deref(),
                            session.amount,
                            Some(method),
                        )
                        .await?;
                    let mut confirmed = session.clone();
                    confirmed.payment_method = Some(method);
                    self.send_confirmation(&confirmed, lang).await?;
                }
            }
        } else if task.data == "inv:confirm" && session.status == InvoiceGenStatus::Confirming {
            self.produce(&session, lang).await?;
        }

        self.finish_callback(task).await;
        Ok(())
    }

    /// `/cancel` as a plain message.
    pub async fn handle_cancel(&self, tenant_id: i64, user_id: i64) -> AppResult<bool> {
        let session = self
            .session_repo
            .find_fresh_invoicegen(tenant_id, user_id)
            .await?;
        if session.is_none() {
            return Ok(false);
        }
        self.session_repo.delete_invoicegen(tenant_id, user_id).await?;
        let lang = self.tenant_language(tenant_id).await;
        self.send(tenant_id, &t(lang, "invgen_cancelled", &[])).await;
        Ok(true)
    }

    /// The produce saga: allocate a number, render, upload, record, append,
    /// reply, drop the session. A failure before the record write leaves
    /// the allocated number unused; numbers are monotone, not dense.
    async fn produce(&self, session: &InvoiceGenSession, lang: Language) -> AppResult<()> {
        let config = self
            .business_repo
            .find_by_tenant(session.tenant_id)
            .await?
            .ok_or_else(|| {
                AppError::InternalError(format!(
                    "Tenant {} has a session but no business config",
                    session.tenant_id
                ))
            })?;

        let document_type = session
            .document_type
            .ok_or_else(|| AppError::ValidationError("Session has no document type".to_string()))?;
        let customer_name = session
            .customer_name
            .clone()
            .ok_or_else(|| AppError::ValidationError("Session has no customer".to_string()))?;
        let amount = session
            .amount
            .ok_or_else(|| AppError::ValidationError("Session has no amount".to_string()))?;
        let payment_method = session
            .payment_method
            .ok_or_else(|| AppError::ValidationError("Session has no payment method".to_string()))?;
        let description = session.description.clone().unwrap_or_default();

        let now = Utc::now();
        let year = now.year();
        let invoice_number = self.counter_repo.next(session.tenant_id, year).await?;
        let display_date = now.format("%d/%m/%Y").to_string();

        let html = render_invoice_html(&InvoiceTemplateData {
            config: &config,
            document_type,
            invoice_number: &invoice_number,
            customer_name: &customer_name,
            customer_tax_id: session.customer_tax_id.as_deref(),
            description: &description,
            amount,
            currency: "ILS",
            payment_method,
            date: &display_date,
            logo_url: config.logo_url.as_deref(),
        });

        let pdf = self.renderer.html_to_pdf(&html).await?;
        let object_path = generated_object_path(session.tenant_id, year, &invoice_number);
        let storage_url = self
            .storage
            .upload(
                &self.config.generated_bucket,
                &object_path,
                pdf,
                "application/pdf",
            )
            .await?;

        let invoice = self
            .invoice_repo
            .create(NewGeneratedInvoice {
                tenant_id: session.tenant_id,
                invoice_number: &invoice_number,
                document_type,
                customer_name: &customer_name,
                customer_tax_id: session.customer_tax_id.as_deref(),
                description: &description,
                amount,
                currency: "ILS",
                payment_method,
                invoice_date: &display_date,
                generated_by_user_id: session.user_id,
                generated_by_username: &session.username,
                storage_path: &object_path,
                storage_url: &storage_url,
            })
            .await?;

        if let Some(sheet_id) = config.sheet_id.as_deref() {
            if let Err(e) = self.pipeline.append_generated_row(sheet_id, &invoice).await {
                warn!(tenant_id = session.tenant_id, "Generated-invoice row append failed: {}", e);
            }
        }

        let done = t(
            lang,
            "invgen_done",
            &[("number", invoice_number.as_str()), ("link", storage_url.as_str())],
        );
        let (_, _) = try_join(
            self.chat.send_message(session.tenant_id, &done, None, None),
            async {
                self.session_repo
                    .delete_invoicegen(session.tenant_id, session.user_id)
                    .await
            },
        )
        .await?;

        info!(tenant_id = session.tenant_id, %invoice_number, "Invoice issued");
        Ok(())
    }

    async fn send_confirmation(
        &self,
        session: &InvoiceGenSession,
        lang: Language,
    ) -> AppResult<()> {
        let doc_type_label = match session.document_type {
            Some(DocumentType::InvoiceReceipt) => t(lang, "btn_doc_invoice_receipt", &[]),
            _ => t(lang, "btn_doc_invoice", &[]),
        };
        let text = t(
            lang,
            "invgen_confirm",
            &[
                ("doc_type", &doc_type_label),
                ("customer", session.customer_name.as_deref().unwrap_or("-")),
                (
                    "amount",
                    &session.amount.map(|a| a.to_string()).unwrap_or_default(),
                ),
                ("currency", "ILS"),
                ("description", session.description.as_deref().unwrap_or("")),
            ],
        );
        let buttons = vec![vec![
            InlineButton {
                text: t(lang, "btn_confirm", &[]),
                callback_data: "inv:confirm".to_string(),
            },
            InlineButton {
                text: t(lang, "btn_cancel", &[]),
                callback_data: "inv:cancel".to_string(),
            },
        ]];
        self.chat
            .send_message(session.tenant_id, &text, None, Some(buttons))
            .await?;
        Ok(())
    }

    async fn tenant_language(&self, tenant_id: i64) -> Language {
        match self.business_repo.find_by_tenant(tenant_id).await {
            Ok(Some(config)) => config.language,
            _ => Language::default(),
        }
    }

    async fn finish_callback(&self, task: &InvoiceCallbackTask) {
        self.answer_quietly(&task.callback_id).await;
        if let Err(e) = self.session_repo.record_callback(task.update_id).await {
            warn!(update_id = task.update_id, "Callback dedup write failed: {}", e);
        }
    }

    async fn send(&self, tenant_id: i64, text: &str) {
        if let Err(e) = self.chat.send_message(tenant_id, text, None, None).await {
            warn!(tenant_id, "Invoice-generation reply failed: {}", e);
        }
    }

    async fn answer_quietly(&self, callback_id: &str) {
        if let Err(e) = self.chat.answer_callback(callback_id).await {
            warn!("answerCallbackQuery failed: {}", e);
        }
    }
}

fn payment_buttons(lang: Language) -> Vec<Vec<InlineButton>> {
    PaymentMethod::all()
        .chunks(3)
        .map(|row| {
            row.iter()
                .map(|method| InlineButton {
                    text: t(lang, &format!("btn_pay_{}", method), &[]),
                    callback_data: format!("inv:pay:{}", method),
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_with_optional_tax_id() {
        let details =
            parse_invoice_details("Acme Ltd, 350.50, consulting services, 123456789").unwrap();
        assert_eq!(details.customer_name, "Acme Ltd");
        assert_eq!(details.amount, "350.50".parse().unwrap());
        assert_eq!(details.description, "consulting services");
        assert_eq!(details.customer_tax_id.as_deref(), Some("123456789"));
    }

    #[test]
    fn details_without_tax_id() {
        let details = parse_invoice_details("Acme, 100, web design").unwrap();
        assert_eq!(details.customer_tax_id, None);
        assert_eq!(details.description, "web design");
    }

    #[test]
    fn commas_inside_description_are_preserved() {
        let details = parse_invoice_details("Acme, 100, design, development").unwrap();
        // the last part is not a tax id, so it belongs to the description
        assert_eq!(details.description, "design, development");
    }

    #[test]
    fn invalid_details_are_refused() {
        assert_eq!(parse_invoice_details("Acme, 100"), None);
        assert_eq!(parse_invoice_details("Acme, -5, work"), None);
        assert_eq!(parse_invoice_details("Acme, zero, work"), None);
        assert_eq!(parse_invoice_details(""), None);
    }

    #[test]
    fn payment_buttons_cover_the_closed_set() {
        let rows = payment_buttons(Language::En);
        let all: Vec<String> = rows
            .into_iter()
            .flatten()
            .map(|b| b.callback_data)
            .collect();
        assert_eq!(all.len(), PaymentMethod::all().len());
        assert!(all.contains(&"inv:pay:bank_transfer".to_string()));
    }
}
