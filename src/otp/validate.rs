//! Input validation and sanitization for guest-supplied fields.

use regex::Regex;

use super::error::OtpError;
use super::phone::digits_only;

const MAX_STRING_LENGTH: usize = 500;
const MAX_EMAIL_LENGTH: usize = 254;

/// Trim, truncate, and strip control characters. Returns `None` for inputs
/// that are empty after trimming.
#[must_use]
pub fn sanitize_string(value: &str, max_length: usize) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned: String = trimmed
        .chars()
        .filter(|c| !c.is_control())
        .take(max_length)
        .collect();
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

/// Document numbers: 4..=20 characters, alphanumeric plus hyphens.
///
/// # Errors
/// Returns `OtpError::Validation` describing the first failed check.
pub fn validate_document(document: &str) -> Result<String, OtpError> {
    let document = sanitize_string(document, MAX_STRING_LENGTH)
        .ok_or_else(|| OtpError::Validation("Document number is required".to_string()))?;
    if document.len() < 4 {
        return Err(OtpError::Validation(
            "Document number is too short".to_string(),
        ));
    }
    if document.len() > 20 {
        return Err(OtpError::Validation(
            "Document number is too long".to_string(),
        ));
    }
    if !document
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(OtpError::Validation(
            "Document number contains invalid characters".to_string(),
        ));
    }
    Ok(document)
}

/// Optional email: validated format, lowercased.
///
/// # Errors
/// Returns `OtpError::Validation` when a non-empty value is malformed.
pub fn validate_email(email: &str) -> Result<Option<String>, OtpError> {
    let Some(email) = sanitize_string(email, MAX_EMAIL_LENGTH + 1) else {
        return Ok(None);
    };
    let email = email.to_lowercase();
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(OtpError::Validation("Email address is too long".to_string()));
    }
    let valid = Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}$")
        .is_ok_and(|regex| regex.is_match(&email));
    if !valid {
        return Err(OtpError::Validation("Invalid email format".to_string()));
    }
    Ok(Some(email))
}

/// Name fields: 2..=140 characters with obvious injection patterns blocked.
///
/// # Errors
/// Returns `OtpError::Validation` describing the first failed check.
pub fn validate_name(name: &str, field_label: &str) -> Result<String, OtpError> {
    let name = sanitize_string(name, MAX_STRING_LENGTH)
        .ok_or_else(|| OtpError::Validation(format!("{field_label} is required")))?;
    if name.chars().count() < 2 {
        return Err(OtpError::Validation(format!("{field_label} is too short")));
    }
    if name.chars().count() > 140 {
        return Err(OtpError::Validation(format!("{field_label} is too long")));
    }
    let lowered = name.to_lowercase();
    let blocked = ["<script", "javascript:", "select ", "insert ", "drop ", "--", ";"];
    if blocked.iter().any(|pattern| lowered.contains(pattern)) {
        return Err(OtpError::Validation(format!(
            "Invalid characters in {field_label}"
        )));
    }
    Ok(name)
}

/// Phone numbers: 7..=15 digits after stripping separators, optional
/// leading `+`. Returns the input with its original formatting preserved.
///
/// # Errors
/// Returns `OtpError::Validation` describing the first failed check.
pub fn validate_phone(phone: &str) -> Result<String, OtpError> {
    let phone = sanitize_string(phone, MAX_STRING_LENGTH)
        .ok_or_else(|| OtpError::Validation("Phone number is required".to_string()))?;
    let allowed = phone
        .chars()
        .enumerate()
        .all(|(index, c)| {
            c.is_ascii_digit()
                || matches!(c, ' ' | '-' | '(' | ')' | '.')
                || (c == '+' && index == 0)
        });
    if !allowed {
        return Err(OtpError::Validation(
            "Phone number contains invalid characters".to_string(),
        ));
    }
    let digits = digits_only(&phone);
    if digits.len() < 7 || digits.len() > 15 {
        return Err(OtpError::Validation(
            "Phone number has invalid length".to_string(),
        ));
    }
    Ok(phone)
}
