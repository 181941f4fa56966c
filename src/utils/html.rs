use rust_decimal::Decimal;

use crate::models::{BusinessConfig, DocumentType, PaymentMethod};

/// Escape a value for embedding in HTML text or attribute position. Every
/// interpolation in the invoice template must pass through here.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub struct InvoiceTemplateData<'a> {
    pub config: &'a BusinessConfig,
    pub document_type: DocumentType,
    pub invoice_number: &'a str,
    pub customer_name: &'a str,
    pub customer_tax_id: Option<&'a str>,
    pub description: &'a str,
    pub amount: Decimal,
    pub currency: &'a str,
    pub payment_method: PaymentMethod,
    /// Display date, DD/MM/YYYY.
    pub date: &'a str,
    pub logo_url: Option<&'a str>,
}

fn payment_method_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "מזומן",
        PaymentMethod::BankTransfer => "העברה בנקאית",
        PaymentMethod::CreditCard => "כרטיס אשראי",
        PaymentMethod::Check => "צ'ק",
        PaymentMethod::Bit => "ביט",
        PaymentMethod::Other => "אחר",
    }
}

fn document_type_label(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Invoice => "חשבונית מס",
        DocumentType::InvoiceReceipt => "חשבונית מס / קבלה",
    }
}

/// Build the right-to-left invoice HTML handed to the headless renderer.
/// Pure string assembly; the renderer process is an external collaborator.
pub fn render_invoice_html(data: &InvoiceTemplateData<'_>) -> String {
    let logo_block = match data.logo_url {
        Some(url) => format!(
            r#"<img class="logo" src="{}" alt="logo">"#,
            escape_html(url)
        ),
        None => String::new(),
    };

    let customer_tax_row = match data.customer_tax_id {
        Some(tax_id) => format!(
            r#"<div class="row"><span class="label">ח.פ / עוסק:</span> {}</div>"#,
            escape_html(tax_id)
        ),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html dir="rtl" lang="he">
<head>
<meta charset="utf-8">
<style>
  body {{ font-family: 'David Libre', 'Arial Hebrew', Arial, sans-serif; margin: 40px; color: #1a1a1a; }}
  .header {{ display: flex; justify-content: space-between; align-items: center; border-bottom: 2px solid #2563eb; padding-bottom: 16px; }}
  .logo {{ max-height: 80px; }}
  .title {{ font-size: 28px; font-weight: bold; }}
  .number {{ font-size: 18px; color: #555; }}
  .section {{ margin-top: 24px; }}
  .row {{ margin: 4px 0; }}
  .label {{ font-weight: bold; }}
  .amount-box {{ margin-top: 32px; padding: 16px; background: #f3f4f6; font-size: 22px; font-weight: bold; }}
  .footer {{ margin-top: 48px; font-size: 12px; color: #666; border-top: 1px solid #ddd; padding-top: 12px; }}
</style>
</head>
<body>
  <div class="header">
    <div>
      <div class="title">{business_name}</div>
      <div class="row">ח.פ / עוסק: {tax_id} · {tax_status}</div>
      <div class="row">{address}</div>
      <div class="row">{email} · {phone}</div>
    </div>
    {logo_block}
  </div>
  <div class="section">
    <div class="title">{document_type}</div>
    <div class="number">מספר {invoice_number} · תאריך {date}</div>
  </div>
  <div class="section">
    <div class="row"><span class="label">לכבוד:</span> {customer_name}</div>
    {customer_tax_row}
    <div class="row"><span class="label">פירוט:</span> {description}</div>
    <div class="row"><span class="label">אמצעי תשלום:</span> {payment_method}</div>
  </div>
  <div class="amount-box">סה"כ לתשלום: {amount} {currency}</div>
  <div class="footer">
    <div>{signature_text}</div>
    <div>{generated_by_text}</div>
  </div>
</body>
</html>"#,
        business_name = escape_html(&data.config.business_name),
        tax_id = escape_html(&data.config.tax_id),
        tax_status = escape_html(&data.config.tax_status),
        address = escape_html(&data.config.address),
        email = escape_html(&data.config.email),
        phone = escape_html(&data.config.phone),
        logo_block = logo_block,
        document_type = document_type_label(data.document_type),
        invoice_number = escape_html(data.invoice_number),
        date = escape_html(data.date),
        customer_name = escape_html(data.customer_name),
        customer_tax_row = customer_tax_row,
        description = escape_html(data.description),
        payment_method = payment_method_label(data.payment_method),
        amount = data.amount,
        currency = escape_html(data.currency),
        signature_text = escape_html(&data.config.digital_signature_text),
        generated_by_text = escape_html(&data.config.generated_by_text),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::models::Language;

    fn config() -> BusinessConfig {
        BusinessConfig {
            tenant_id: -1001,
            language: Language::He,
            business_name: "עסק <בדיקה>".to_string(),
            tax_id: "123456789".to_string(),
            tax_status: "עוסק מורשה".to_string(),
            email: "owner@example.com".to_string(),
            phone: "+972501234567".to_string(),
            address: "תל אביב".to_string(),
            logo_url: None,
            sheet_id: None,
            digital_signature_text: "מסמך ממוחשב".to_string(),
            generated_by_text: "הופק על ידי Scribe".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn escape_html_covers_special_characters() {
        assert_eq!(
            escape_html(r#"<b onclick="x">&'"#),
            "&lt;b onclick=&quot;x&quot;&gt;&amp;&#39;"
        );
    }

    #[test]
    fn user_supplied_fields_are_escaped_in_the_template() {
        let cfg = config();
        let html = render_invoice_html(&InvoiceTemplateData {
            config: &cfg,
            document_type: DocumentType::Invoice,
            invoice_number: "20261",
            customer_name: "<script>alert(1)</script>",
            customer_tax_id: Some("987654321"),
            description: "ייעוץ & פיתוח",
            amount: "350.00".parse().unwrap(),
            currency: "ILS",
            payment_method: PaymentMethod::Bit,
            date: "15/01/2026",
            logo_url: None,
        });
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("ייעוץ &amp; פיתוח"));
        assert!(html.contains(r#"dir="rtl""#));
        assert!(html.contains("עסק &lt;בדיקה&gt;"));
    }

    #[test]
    fn logo_renders_only_when_present() {
        let cfg = config();
        let without = render_invoice_html(&InvoiceTemplateData {
            config: &cfg,
            document_type: DocumentType::InvoiceReceipt,
            invoice_number: "20262",
            customer_name: "Acme",
            customer_tax_id: None,
            description: "work",
            amount: "100".parse().unwrap(),
            currency: "ILS",
            payment_method: PaymentMethod::Cash,
            date: "01/02/2026",
            logo_url: None,
        });
        assert!(!without.contains("<img"));

        let with = render_invoice_html(&InvoiceTemplateData {
            config: &cfg,
            document_type: DocumentType::InvoiceReceipt,
            invoice_number: "20262",
            customer_name: "Acme",
            customer_tax_id: None,
            description: "work",
            amount: "100".parse().unwrap(),
            currency: "ILS",
            payment_method: PaymentMethod::Cash,
            date: "01/02/2026",
            logo_url: Some("https://cdn.example.com/logo.png"),
        });
        assert!(with.contains(r#"<img class="logo" src="https://cdn.example.com/logo.png""#));
    }
}
