use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{DocumentType, Language, PaymentMethod};

/// Invoice-authoring sessions go stale one hour after the last touch.
pub const INVOICEGEN_TTL_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum OnboardingStep {
    #[serde(rename = "language")]
    Language,
    #[serde(rename = "business_name")]
    BusinessName,
    #[serde(rename = "owner_details")]
    OwnerDetails,
    #[serde(rename = "address")]
    Address,
    #[serde(rename = "tax_status")]
    TaxStatus,
    #[serde(rename = "logo")]
    Logo,
    #[serde(rename = "sheet")]
    Sheet,
    #[serde(rename = "counter")]
    Counter,
    #[serde(rename = "complete")]
    Complete,
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OnboardingStep::Language => write!(f, "language"),
            OnboardingStep::BusinessName => write!(f, "business_name"),
            OnboardingStep::OwnerDetails => write!(f, "owner_details"),
            OnboardingStep::Address => write!(f, "address"),
            OnboardingStep::TaxStatus => write!(f, "tax_status"),
            OnboardingStep::Logo => write!(f, "logo"),
            OnboardingStep::Sheet => write!(f, "sheet"),
            OnboardingStep::Counter => write!(f, "counter"),
            OnboardingStep::Complete => write!(f, "complete"),
        }
    }
}

impl OnboardingStep {
    /// The fixed step order of the onboarding flow.
    pub fn next(&self) -> Option<OnboardingStep> {
        match self {
            OnboardingStep::Language => Some(OnboardingStep::BusinessName),
            OnboardingStep::BusinessName => Some(OnboardingStep::OwnerDetails),
            OnboardingStep::OwnerDetails => Some(OnboardingStep::Address),
            OnboardingStep::Address => Some(OnboardingStep::TaxStatus),
            OnboardingStep::TaxStatus => Some(OnboardingStep::Logo),
            OnboardingStep::Logo => Some(OnboardingStep::Sheet),
            OnboardingStep::Sheet => Some(OnboardingStep::Counter),
            OnboardingStep::Counter => Some(OnboardingStep::Complete),
            OnboardingStep::Complete => None,
        }
    }
}

/// Ephemeral multi-step setup state, one per tenant. Created on /onboard,
/// deleted on completion or cancellation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OnboardingSession {
    pub tenant_id: i64,
    pub user_id: i64,
    pub chat_title: String,
    pub step: OnboardingStep,
    pub language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_seed: Option<i64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum InvoiceGenStatus {
    #[serde(rename = "select_type")]
    SelectType,
    #[serde(rename = "awaiting_details")]
    AwaitingDetails,
    #[serde(rename = "awaiting_payment")]
    AwaitingPayment,
    #[serde(rename = "confirming")]
    Confirming,
}

impl std::fmt::Display for InvoiceGenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvoiceGenStatus::SelectType => write!(f, "select_type"),
            InvoiceGenStatus::AwaitingDetails => write!(f, "awaiting_details"),
            InvoiceGenStatus::AwaitingPayment => write!(f, "awaiting_payment"),
            InvoiceGenStatus::Confirming => write!(f, "confirming"),
        }
    }
}

/// Ephemeral invoice-authoring state, keyed `{tenant_id}_{user_id}`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceGenSession {
    pub id: String,
    pub tenant_id: i64,
    pub user_id: i64,
    pub username: String,
    pub status: InvoiceGenStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<DocumentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_tax_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceGenSession {
    pub fn composite_id(tenant_id: i64, user_id: i64) -> String {
        format!("{}_{}", tenant_id, user_id)
    }

    /// Stale sessions are deleted on next read rather than by a reaper.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.updated_at > Duration::minutes(INVOICEGEN_TTL_MINUTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn onboarding_steps_chain_to_complete() {
        let mut step = OnboardingStep::Language;
        let mut seen = vec![step];
        while let Some(next) = step.next() {
            seen.push(next);
            step = next;
        }
        assert_eq!(seen.len(), 9);
        assert_eq!(step, OnboardingStep::Complete);
    }

    #[test]
    fn invoicegen_session_goes_stale_after_an_hour() {
        let now = Utc::now();
        let session = InvoiceGenSession {
            id: InvoiceGenSession::composite_id(-1001, 7),
            tenant_id: -1001,
            user_id: 7,
            username: String::new(),
            status: InvoiceGenStatus::SelectType,
            document_type: None,
            customer_name: None,
            customer_tax_id: None,
            description: None,
            amount: None,
            payment_method: None,
            updated_at: now - Duration::minutes(61),
        };
        assert!(session.is_stale(now));

        let fresh = InvoiceGenSession {
            updated_at: now - Duration::minutes(59),
            ..session
        };
        assert!(!fresh.is_stale(now));
    }
}
