use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Confidence below this, or a missing total, flags the spreadsheet row for
/// review. It never blocks processing.
pub const NEEDS_REVIEW_CONFIDENCE: f32 = 0.6;

/// What a vision provider returns, parsed straight from its JSON output and
/// trusted for nothing yet.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawExtraction {
    #[serde(default)]
    pub is_invoice: bool,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub invoice_date: Option<String>,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub vat_amount: Option<Decimal>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub category: Option<String>,
}

/// Provider output after the sanitizer ran: suspicious fields nullified,
/// strings truncated, date in ISO form, category closed.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub is_invoice: bool,
    pub rejection_reason: Option<String>,
    pub vendor_name: Option<String>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub total_amount: Option<Decimal>,
    pub currency: Option<String>,
    pub vat_amount: Option<Decimal>,
    pub confidence: f32,
    pub category: Category,
}

impl Extraction {
    /// Review flag for the spreadsheet row.
    pub fn needs_review(&self) -> bool {
        self.confidence < NEEDS_REVIEW_CONFIDENCE || self.total_amount.is_none()
    }
}

/// Closed expense category set. Anything unrecognized lands in
/// Miscellaneous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Food,
    Transport,
    OfficeSupplies,
    Utilities,
    ProfessionalServices,
    Marketing,
    Technology,
    Travel,
    Entertainment,
    Miscellaneous,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Food => write!(f, "Food"),
            Category::Transport => write!(f, "Transport"),
            Category::OfficeSupplies => write!(f, "Office Supplies"),
            Category::Utilities => write!(f, "Utilities"),
            Category::ProfessionalServices => write!(f, "Professional Services"),
            Category::Marketing => write!(f, "Marketing"),
            Category::Technology => write!(f, "Technology"),
            Category::Travel => write!(f, "Travel"),
            Category::Entertainment => write!(f, "Entertainment"),
            Category::Miscellaneous => write!(f, "Miscellaneous"),
        }
    }
}

impl Category {
    pub fn normalize(raw: &str) -> Category {
        match raw.trim().to_lowercase().as_str() {
            "food" => Category::Food,
            "transport" | "transportation" => Category::Transport,
            "office supplies" | "office" => Category::OfficeSupplies,
            "utilities" => Category::Utilities,
            "professional services" | "services" => Category::ProfessionalServices,
            "marketing" => Category::Marketing,
            "technology" | "tech" => Category::Technology,
            "travel" => Category::Travel,
            "entertainment" => Category::Entertainment,
            _ => Category::Miscellaneous,
        }
    }
}

/// Which provider produced an extraction and what it cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractProvider {
    #[serde(rename = "primary")]
    Primary,
    #[serde(rename = "fallback")]
    Fallback,
}

impl std::fmt::Display for ExtractProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractProvider::Primary => write!(f, "primary"),
            ExtractProvider::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionUsage {
    pub provider: ExtractProvider,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost_usd: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_review_on_low_confidence_or_missing_total() {
        let mut e = Extraction {
            is_invoice: true,
            rejection_reason: None,
            vendor_name: Some("ABC".to_string()),
            invoice_number: None,
            invoice_date: None,
            total_amount: Some("100.0".parse().unwrap()),
            currency: Some("ILS".to_string()),
            vat_amount: None,
            confidence: 0.9,
            category: Category::Food,
        };
        assert!(!e.needs_review());

        e.confidence = 0.59;
        assert!(e.needs_review());

        e.confidence = 0.9;
        e.total_amount = None;
        assert!(e.needs_review());
    }

    #[test]
    fn category_normalization_is_closed() {
        assert_eq!(Category::normalize("food"), Category::Food);
        assert_eq!(Category::normalize(" Office Supplies "), Category::OfficeSupplies);
        assert_eq!(Category::normalize("TRANSPORTATION"), Category::Transport);
        assert_eq!(Category::normalize("crypto mining"), Category::Miscellaneous);
        assert_eq!(Category::normalize(""), Category::Miscellaneous);
    }
}
