use crate::models::Language;

/// Render a dictionary template, substituting `{param}` placeholders.
pub fn t(lang: Language, key: &str, params: &[(&str, &str)]) -> String {
    let mut out = template(lang, key).to_string();
    for (name, value) in params {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}

/// Escape model-derived or user-derived text before it is embedded in a
/// Markdown chat message. Messages go out with legacy Markdown parse mode,
/// whose reserved set is `_`, `*`, backtick and `[`.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '_' | '*' | '`' | '[' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn template(lang: Language, key: &str) -> &'static str {
    match lang {
        Language::En => template_en(key),
        Language::He => template_he(key),
    }
}

fn template_en(key: &str) -> &'static str {
    match key {
        // Ingest pipeline
        "invoice_saved" => "✅ Invoice saved\nVendor: {vendor}\nAmount: {amount} {currency}\nFile: {link}",
        "needs_review_note" => "⚠️ Low confidence — the row was flagged for review.",
        "not_an_invoice" => "This doesn't look like an invoice: {reason}",
        "pdf_encrypted" => "The PDF is password-protected and cannot be processed. Please remove the password and resend.",
        "pdf_too_many_pages" => "The PDF has {pages} pages; the maximum is {max}.",
        "processing_failed" => "Processing failed after several attempts. Please try sending the document again later.",
        "duplicate_warning" => "⚠️ This looks like a duplicate of an earlier invoice ({vendor}, {amount} {currency}). What should I do?",
        "duplicate_kept" => "Kept both. A second row was added to the sheet.",
        "duplicate_deleted" => "Deleted the new upload. The earlier record remains.",
        "btn_keep_both" => "Keep both",
        "btn_delete_new" => "Delete new",

        // Onboarding
        "onboard_welcome" => "Welcome to Scribe! Let's set up your business. First, pick a language.",
        "onboard_language_prompt" => "Please choose a language: English or Hebrew.",
        "onboard_business_name_prompt" => "What is your business name?",
        "onboard_owner_details_prompt" => "Send the owner details as: name, tax id, phone, email",
        "onboard_error_owner_format" => "Please send exactly four comma-separated values: name, tax id, phone, email.",
        "onboard_error_tax_id" => "The tax id must be 9 digits.",
        "onboard_error_phone" => "That phone number doesn't look right. Use digits, spaces, dashes or a leading +.",
        "onboard_error_email" => "That email address doesn't look right.",
        "onboard_address_prompt" => "What is the business address?",
        "onboard_tax_status_prompt" => "What is your tax status? (e.g. licensed dealer, exempt dealer, company)",
        "onboard_logo_prompt" => "Send a logo image, or /skip to continue without one.",
        "onboard_logo_invalid" => "Please send an image file, or /skip.",
        "onboard_sheet_prompt" => "Send the id of the spreadsheet to write invoices to. Share it with {service_account} first.",
        "onboard_sheet_error" => "I couldn't open that spreadsheet. Make sure it is shared with {service_account} and send the id again.",
        "onboard_sheet_ok" => "Spreadsheet connected. Tabs found: {tabs}",
        "onboard_counter_prompt" => "From which number should generated invoices start? Press the button to start from 1, or send a number.",
        "onboard_counter_error" => "Please send a positive whole number, or press the button.",
        "btn_counter_start_1" => "Start from 1",
        "onboard_complete" => "Setup complete! Send an invoice photo or PDF to get started, or /invoice to issue one.",
        "onboard_cancelled" => "Onboarding cancelled. Send /onboard to start again.",
        "onboard_already" => "This group is already set up. Send /invoice or an invoice document.",
        "invite_required" => "This group isn't approved yet. Send /onboard followed by your invite code.",
        "invite_invalid" => "That invite code is not valid.",

        // Invoice generation
        "invgen_select_type" => "What would you like to issue?",
        "btn_doc_invoice" => "Invoice",
        "btn_doc_invoice_receipt" => "Invoice-receipt",
        "invgen_details_prompt" => "Send the details as: customer name, amount, description, customer tax id (optional)",
        "invgen_details_error" => "Please send at least: customer name, amount, description. The amount must be a positive number.",
        "invgen_payment_prompt" => "How was it paid?",
        "btn_pay_cash" => "Cash",
        "btn_pay_bank_transfer" => "Bank transfer",
        "btn_pay_credit_card" => "Credit card",
        "btn_pay_check" => "Check",
        "btn_pay_bit" => "Bit",
        "btn_pay_other" => "Other",
        "invgen_confirm" => "About to issue {doc_type} for {customer}: {amount} {currency} — {description}. Confirm?",
        "btn_confirm" => "Confirm",
        "btn_cancel" => "Cancel",
        "invgen_done" => "✅ Invoice {number} issued: {link}",
        "invgen_cancelled" => "Invoice cancelled.",
        "invgen_expired" => "The invoice session expired. Send /invoice to start again.",
        "invgen_no_config" => "This group isn't set up yet. Send /onboard first.",

        // Report
        "report_header" => "📊 {month} summary: {count} invoices, {total} total",
        "report_line" => "  {category}: {amount}",
        "report_empty" => "No processed invoices this month.",

        _ => "",
    }
}

fn template_he(key: &str) -> &'static str {
    match key {
        // Ingest pipeline
        "invoice_saved" => "✅ החשבונית נשמרה\nספק: {vendor}\nסכום: {amount} {currency}\nקובץ: {link}",
        "needs_review_note" => "⚠️ ודאות נמוכה — השורה סומנה לבדיקה.",
        "not_an_invoice" => "זה לא נראה כמו חשבונית: {reason}",
        "pdf_encrypted" => "קובץ ה-PDF מוגן בסיסמה ולא ניתן לעיבוד. הסירו את הסיסמה ושלחו שוב.",
        "pdf_too_many_pages" => "בקובץ {pages} עמודים; המקסימום הוא {max}.",
        "processing_failed" => "העיבוד נכשל לאחר מספר ניסיונות. נסו לשלוח את המסמך שוב מאוחר יותר.",
        "duplicate_warning" => "⚠️ נראה שזו חשבונית כפולה ({vendor}, {amount} {currency}). מה לעשות?",
        "duplicate_kept" => "שתי החשבוניות נשמרו. נוספה שורה נוספת לגיליון.",
        "duplicate_deleted" => "ההעלאה החדשה נמחקה. הרשומה הקודמת נשארה.",
        "btn_keep_both" => "לשמור את שתיהן",
        "btn_delete_new" => "למחוק את החדשה",

        // Onboarding
        "onboard_welcome" => "ברוכים הבאים ל-Scribe! נגדיר את העסק שלכם. קודם, בחרו שפה.",
        "onboard_language_prompt" => "בחרו שפה: עברית או אנגלית.",
        "onboard_business_name_prompt" => "מה שם העסק?",
        "onboard_owner_details_prompt" => "שלחו את פרטי הבעלים כך: שם, מספר עוסק, טלפון, אימייל",
        "onboard_error_owner_format" => "נא לשלוח בדיוק ארבעה ערכים מופרדים בפסיקים: שם, מספר עוסק, טלפון, אימייל.",
        "onboard_error_tax_id" => "מספר העוסק חייב להכיל 9 ספרות.",
        "onboard_error_phone" => "מספר הטלפון לא תקין. השתמשו בספרות, רווחים, מקפים או + בתחילה.",
        "onboard_error_email" => "כתובת האימייל לא תקינה.",
        "onboard_address_prompt" => "מה כתובת העסק?",
        "onboard_tax_status_prompt" => "מה הסטטוס המיסויי? (עוסק מורשה, עוסק פטור, חברה)",
        "onboard_logo_prompt" => "שלחו תמונת לוגו, או /skip כדי להמשיך בלעדיה.",
        "onboard_logo_invalid" => "נא לשלוח קובץ תמונה, או /skip.",
        "onboard_sheet_prompt" => "שלחו את מזהה הגיליון לכתיבת חשבוניות. שתפו אותו קודם עם {service_account}.",
        "onboard_sheet_error" => "לא הצלחתי לפתוח את הגיליון. ודאו שהוא משותף עם {service_account} ושלחו את המזהה שוב.",
        "onboard_sheet_ok" => "הגיליון חובר. לשוניות: {tabs}",
        "onboard_counter_prompt" => "מאיזה מספר יתחילו חשבוניות שתנפיקו? לחצו על הכפתור כדי להתחיל מ-1, או שלחו מספר.",
        "onboard_counter_error" => "נא לשלוח מספר שלם חיובי, או ללחוץ על הכפתור.",
        "btn_counter_start_1" => "להתחיל מ-1",
        "onboard_complete" => "ההגדרה הושלמה! שלחו צילום או PDF של חשבונית, או /invoice כדי להנפיק אחת.",
        "onboard_cancelled" => "ההגדרה בוטלה. שלחו /onboard כדי להתחיל שוב.",
        "onboard_already" => "הקבוצה כבר מוגדרת. שלחו /invoice או מסמך חשבונית.",
        "invite_required" => "הקבוצה עדיין לא אושרה. שלחו /onboard ואחריו קוד הזמנה.",
        "invite_invalid" => "קוד ההזמנה אינו תקף.",

        // Invoice generation
        "invgen_select_type" => "מה תרצו להנפיק?",
        "btn_doc_invoice" => "חשבונית",
        "btn_doc_invoice_receipt" => "חשבונית-קבלה",
        "invgen_details_prompt" => "שלחו את הפרטים כך: שם לקוח, סכום, תיאור, מספר עוסק של הלקוח (לא חובה)",
        "invgen_details_error" => "נא לשלוח לפחות: שם לקוח, סכום, תיאור. הסכום חייב להיות מספר חיובי.",
        "invgen_payment_prompt" => "איך שולם?",
        "btn_pay_cash" => "מזומן",
        "btn_pay_bank_transfer" => "העברה בנקאית",
        "btn_pay_credit_card" => "כרטיס אשראי",
        "btn_pay_check" => "צ'ק",
        "btn_pay_bit" => "ביט",
        "btn_pay_other" => "אחר",
        "invgen_confirm" => "עומדים להנפיק {doc_type} עבור {customer}: {amount} {currency} — {description}. לאשר?",
        "btn_confirm" => "אישור",
        "btn_cancel" => "ביטול",
        "invgen_done" => "✅ חשבונית {number} הונפקה: {link}",
        "invgen_cancelled" => "ההנפקה בוטלה.",
        "invgen_expired" => "פג תוקף ההפעלה. שלחו /invoice כדי להתחיל שוב.",
        "invgen_no_config" => "הקבוצה עדיין לא מוגדרת. שלחו /onboard קודם.",

        // Report
        "report_header" => "📊 סיכום {month}: {count} חשבוניות, {total} סה\"כ",
        "report_line" => "  {category}: {amount}",
        "report_empty" => "אין חשבוניות מעובדות החודש.",

        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolation_replaces_every_placeholder() {
        let out = t(
            Language::En,
            "pdf_too_many_pages",
            &[("pages", "8"), ("max", "5")],
        );
        assert_eq!(out, "The PDF has 8 pages; the maximum is 5.");
    }

    #[test]
    fn hebrew_templates_exist_for_every_english_key() {
        let keys = [
            "invoice_saved", "needs_review_note", "not_an_invoice", "pdf_encrypted",
            "pdf_too_many_pages", "processing_failed", "duplicate_warning", "duplicate_kept",
            "duplicate_deleted", "btn_keep_both", "btn_delete_new", "onboard_welcome",
            "onboard_language_prompt", "onboard_business_name_prompt",
            "onboard_owner_details_prompt", "onboard_error_owner_format", "onboard_error_tax_id",
            "onboard_error_phone", "onboard_error_email", "onboard_address_prompt",
            "onboard_tax_status_prompt", "onboard_logo_prompt", "onboard_logo_invalid",
            "onboard_sheet_prompt", "onboard_sheet_error", "onboard_sheet_ok",
            "onboard_counter_prompt", "onboard_counter_error", "btn_counter_start_1",
            "onboard_complete", "onboard_cancelled", "onboard_already", "invite_required",
            "invite_invalid", "invgen_select_type", "btn_doc_invoice", "btn_doc_invoice_receipt",
            "invgen_details_prompt", "invgen_details_error", "invgen_payment_prompt",
            "btn_pay_cash", "btn_pay_bank_transfer", "btn_pay_credit_card", "btn_pay_check",
            "btn_pay_bit", "btn_pay_other", "invgen_confirm", "btn_confirm", "btn_cancel",
            "invgen_done", "invgen_cancelled", "invgen_expired", "invgen_no_config",
            "report_header", "report_line", "report_empty",
        ];
        for key in keys {
            assert!(!template_en(key).is_empty(), "missing en template: {}", key);
            assert!(!template_he(key).is_empty(), "missing he template: {}", key);
        }
    }

    #[test]
    fn markdown_escape_covers_the_reserved_set() {
        assert_eq!(escape_markdown("a_b"), "a\\_b");
        assert_eq!(escape_markdown("*bold* `code`"), "\\*bold\\* \\`code\\`");
        assert_eq!(escape_markdown("[link](http://x.y)"), "\\[link](http://x.y)");
        assert_eq!(escape_markdown("dog photo!"), "dog photo!");
    }
}
