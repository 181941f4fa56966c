use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::{DocumentType, GeneratedInvoice, PaymentMethod};

#[derive(Clone)]
pub struct GeneratedInvoiceRepository {
    pool: PgPool,
}

pub struct NewGeneratedInvoice<'a> {
    pub tenant_id: i64,
    pub invoice_number: &'a str,
    pub document_type: DocumentType,
    pub customer_name: &'a str,
    pub customer_tax_id: Option<&'a str>,
    pub description: &'a str,
    pub amount: Decimal,
    pub currency: &'a str,
    pub payment_method: PaymentMethod,
    /// Display date, DD/MM/YYYY.
    pub invoice_date: &'a str,
    pub generated_by_user_id: i64,
    pub generated_by_username: &'a str,
    pub storage_path: &'a str,
    pub storage_url: &'a str,
}

impl GeneratedInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, invoice: NewGeneratedInvoice<'_>) -> AppResult<GeneratedInvoice> {
        let id = GeneratedInvoice::composite_id(invoice.tenant_id, invoice.invoice_number);
        let saved = sqlx::query_as::<_, GeneratedInvoice>(
            r#"
            INSERT INTO generated_invoices (
                id, tenant_id, invoice_number, document_type, customer_name,
                customer_tax_id, description, amount, currency, payment_method,
                invoice_date, generated_by_user_id, generated_by_username,
                storage_path, storage_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(invoice.tenant_id)
        .bind(invoice.invoice_number)
        .bind(invoice.document_type)
        .bind(invoice.customer_name)
        .bind(invoice.customer_tax_id)
        .bind(invoice.description)
        .bind(invoice.amount)
        .bind(invoice.currency)
        .bind(invoice.payment_method)
        .bind(invoice.invoice_date)
        .bind(invoice.generated_by_user_id)
        .bind(invoice.generated_by_username)
        .bind(invoice.storage_path)
        .bind(invoice.storage_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }
}
