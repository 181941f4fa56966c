use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum DocumentType {
    #[serde(rename = "invoice")]
    Invoice,
    #[serde(rename = "invoice_receipt")]
    InvoiceReceipt,
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentType::Invoice => write!(f, "invoice"),
            DocumentType::InvoiceReceipt => write!(f, "invoice_receipt"),
        }
    }
}

impl DocumentType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "invoice" => Some(DocumentType::Invoice),
            "invoice_receipt" => Some(DocumentType::InvoiceReceipt),
            _ => None,
        }
    }
}

/// Closed set of accepted payment methods, selected via inline buttons.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum PaymentMethod {
    #[serde(rename = "cash")]
    Cash,
    #[serde(rename = "bank_transfer")]
    BankTransfer,
    #[serde(rename = "credit_card")]
    CreditCard,
    #[serde(rename = "check")]
    Check,
    #[serde(rename = "bit")]
    Bit,
    #[serde(rename = "other")]
    Other,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::BankTransfer => write!(f, "bank_transfer"),
            PaymentMethod::CreditCard => write!(f, "credit_card"),
            PaymentMethod::Check => write!(f, "check"),
            PaymentMethod::Bit => write!(f, "bit"),
            PaymentMethod::Other => write!(f, "other"),
        }
    }
}

impl PaymentMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(PaymentMethod::Cash),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "credit_card" => Some(PaymentMethod::CreditCard),
            "check" => Some(PaymentMethod::Check),
            "bit" => Some(PaymentMethod::Bit),
            "other" => Some(PaymentMethod::Other),
            _ => None,
        }
    }

    pub fn all() -> &'static [PaymentMethod] {
        &[
            PaymentMethod::Cash,
            PaymentMethod::BankTransfer,
            PaymentMethod::CreditCard,
            PaymentMethod::Check,
            PaymentMethod::Bit,
            PaymentMethod::Other,
        ]
    }
}

/// One outbound invoice a tenant issued. The id is
/// `chat_{tenant_id}_{invoice_number}`; the number is unique per tenant per
/// year and monotone within a year.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GeneratedInvoice {
    pub id: String,
    pub tenant_id: i64,
    pub invoice_number: String,
    pub document_type: DocumentType,
    pub customer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_tax_id: Option<String>,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    /// Display date, DD/MM/YYYY.
    pub invoice_date: String,
    pub generated_at: DateTime<Utc>,
    pub generated_by_user_id: i64,
    pub generated_by_username: String,
    pub storage_path: String,
    pub storage_url: String,
}

impl GeneratedInvoice {
    pub fn composite_id(tenant_id: i64, invoice_number: &str) -> String {
        format!("chat_{}_{}", tenant_id, invoice_number)
    }
}

/// Per-tenant yearly high-water mark behind generated invoice numbers.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceCounter {
    pub id: String,
    pub tenant_id: i64,
    pub year: i32,
    pub counter: i64,
    pub last_updated: DateTime<Utc>,
}

impl InvoiceCounter {
    pub fn composite_id(tenant_id: i64, year: i32) -> String {
        format!("chat_{}_{}", tenant_id, year)
    }

    /// Wire format of an allocated number: year prefix then decimal counter,
    /// no separator.
    pub fn format_number(year: i32, counter: i64) -> String {
        format!("{}{}", year, counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_number_format_has_no_separator() {
        assert_eq!(InvoiceCounter::format_number(2026, 1), "20261");
        assert_eq!(InvoiceCounter::format_number(2026, 42), "202642");
    }

    #[test]
    fn composite_ids() {
        assert_eq!(InvoiceCounter::composite_id(-1001, 2026), "chat_-1001_2026");
        assert_eq!(GeneratedInvoice::composite_id(-1001, "20267"), "chat_-1001_20267");
    }

    #[test]
    fn payment_method_parse_round_trips_the_closed_set() {
        for m in PaymentMethod::all() {
            assert_eq!(PaymentMethod::parse(&m.to_string()), Some(*m));
        }
        assert_eq!(PaymentMethod::parse("barter"), None);
    }
}
