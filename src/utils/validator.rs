use once_cell::sync::Lazy;
use regex::Regex;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Validate a request struct using the validator crate
pub fn validate_request<T: Validate>(request: &T) -> AppResult<()> {
    request.validate().map_err(|e| {
        let errors: Vec<String> = e
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |err| {
                    format!(
                        "{}: {}",
                        field,
                        err.message.clone().unwrap_or_else(|| "Invalid value".into())
                    )
                })
            })
            .collect();

        AppError::ValidationError(errors.join(", "))
    })
}

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+]?[\d\s\-()]{9,15}$").unwrap());
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$").unwrap()
});
static INVITE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^INV-[ABCDEFGHJKLMNPQRSTUVWXYZ23456789]{6}$").unwrap());

/// Validate email format (RFC 5322 subset)
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Validate an Israeli tax id (9 digits)
pub fn is_valid_tax_id(tax_id: &str) -> bool {
    tax_id.len() == 9 && tax_id.chars().all(|c| c.is_ascii_digit())
}

/// Validate a phone number: optional +, then digits/spaces/dashes/parens
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

/// Validate an invite code. The alphabet excludes confusables (0/O, 1/I).
pub fn is_valid_invite_code(code: &str) -> bool {
    INVITE_CODE_RE.is_match(code)
}

/// Owner details arrive as one message: `name, taxId, phone, email`.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerDetails {
    pub name: String,
    pub tax_id: String,
    pub phone: String,
    pub email: String,
}

/// Per-field validation error for the onboarding prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerDetailsError {
    Format,
    TaxId,
    Phone,
    Email,
}

pub fn parse_owner_details(input: &str) -> Result<OwnerDetails, OwnerDetailsError> {
    let parts: Vec<&str> = input.split(',').map(|p| p.trim()).collect();
    if parts.len() != 4 || parts.iter().any(|p| p.is_empty()) {
        return Err(OwnerDetailsError::Format);
    }
    let (name, tax_id, phone, email) = (parts[0], parts[1], parts[2], parts[3]);
    if !is_valid_tax_id(tax_id) {
        return Err(OwnerDetailsError::TaxId);
    }
    if !is_valid_phone(phone) {
        return Err(OwnerDetailsError::Phone);
    }
    if !is_valid_email(email) {
        return Err(OwnerDetailsError::Email);
    }
    Ok(OwnerDetails {
        name: name.to_string(),
        tax_id: tax_id.to_string(),
        phone: phone.to_string(),
        email: email.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("owner@example.com"));
        assert!(is_valid_email("a.b+tag@sub.domain.co.il"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn tax_id_must_be_nine_digits() {
        assert!(is_valid_tax_id("123456789"));
        assert!(!is_valid_tax_id("12345678"));
        assert!(!is_valid_tax_id("1234567890"));
        assert!(!is_valid_tax_id("12345678a"));
    }

    #[test]
    fn phone_validation() {
        assert!(is_valid_phone("+972501234567"));
        assert!(is_valid_phone("050-123-4567"));
        assert!(is_valid_phone("(03) 555 1234"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("phone-number"));
    }

    #[test]
    fn invite_code_format_excludes_confusables() {
        assert!(is_valid_invite_code("INV-ABC234"));
        assert!(!is_valid_invite_code("INV-ABC23"));
        assert!(!is_valid_invite_code("INV-ABC0II"));
        assert!(!is_valid_invite_code("inv-abc234"));
        assert!(!is_valid_invite_code("XYZ-ABC234"));
    }

    #[test]
    fn owner_details_happy_path() {
        let details = parse_owner_details("Dana Levi, 123456789, +972501234567, dana@example.com")
            .unwrap();
        assert_eq!(details.name, "Dana Levi");
        assert_eq!(details.tax_id, "123456789");
        assert_eq!(details.phone, "+972501234567");
        assert_eq!(details.email, "dana@example.com");
    }

    #[test]
    fn owner_details_field_specific_errors() {
        assert_eq!(
            parse_owner_details("Dana, 123456789, +972501234567").unwrap_err(),
            OwnerDetailsError::Format
        );
        assert_eq!(
            parse_owner_details("Dana, 12345, +972501234567, d@e.com").unwrap_err(),
            OwnerDetailsError::TaxId
        );
        assert_eq!(
            parse_owner_details("Dana, 123456789, abc, d@e.com").unwrap_err(),
            OwnerDetailsError::Phone
        );
        assert_eq!(
            parse_owner_details("Dana, 123456789, +972501234567, nope").unwrap_err(),
            OwnerDetailsError::Email
        );
    }
}
