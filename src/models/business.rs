use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum Language {
    #[serde(rename = "en")]
    En,
    #[serde(rename = "he")]
    He,
}

impl Default for Language {
    fn default() -> Self {
        Language::En
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::En => write!(f, "en"),
            Language::He => write!(f, "he"),
        }
    }
}

impl Language {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "en" => Some(Language::En),
            "he" => Some(Language::He),
            _ => None,
        }
    }
}

/// Per-tenant business profile. Exactly one row per tenant; sheet_id, if
/// set, belongs to that tenant only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BusinessConfig {
    pub tenant_id: i64,
    pub language: Language,
    pub business_name: String,
    pub tax_id: String,
    pub tax_status: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<String>,
    pub digital_signature_text: String,
    pub generated_by_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
