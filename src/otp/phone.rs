//! Phone number normalization, E.164 formatting, and masking.

/// Digits-only form used as the staging/rate-limit key. Formatting
/// differences (`+57 300 ...` vs `300...`) collide on purpose so one
/// physical number cannot hold several in-flight registrations.
#[must_use]
pub fn digits_only(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// Canonical international form for the delivery provider: numbers without
/// a leading `+` get the default country code prefixed.
#[must_use]
pub fn to_e164(phone: &str, default_country_code: &str) -> String {
    let trimmed = phone.trim();
    let digits = digits_only(trimmed);
    if trimmed.starts_with('+') {
        format!("+{digits}")
    } else {
        format!("+{default_country_code}{digits}")
    }
}

/// Mask a phone number for responses: keep the first 3 and last 2
/// characters. Anything 5 characters or shorter becomes an opaque mask so
/// no digits leak.
#[must_use]
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() <= 5 {
        return "****".to_string();
    }
    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[chars.len() - 2..].iter().collect();
    let masked = "*".repeat(chars.len() - 5);
    format!("{prefix}{masked}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_only_strips_formatting() {
        assert_eq!(digits_only("+57 300-123.4567"), "573001234567");
        assert_eq!(digits_only("(300) 123 4567"), "3001234567");
        assert_eq!(digits_only(""), "");
    }

    #[test]
    fn formatting_variants_collide_to_one_key() {
        assert_eq!(digits_only("+57 3001234567"), digits_only("573001234567"));
    }

    #[test]
    fn to_e164_prefixes_country_code() {
        assert_eq!(to_e164("3001234567", "57"), "+573001234567");
    }

    #[test]
    fn to_e164_keeps_existing_plus() {
        assert_eq!(to_e164("+13005551234", "57"), "+13005551234");
        assert_eq!(to_e164(" +57 300 123 4567 ", "57"), "+573001234567");
    }

    #[test]
    fn mask_preserves_prefix_and_suffix() {
        // len 10: 3 kept + 5 masked + 2 kept
        assert_eq!(mask_phone("3001234567"), "300*****67");
        assert_eq!(mask_phone("+573001234567"), "+57********67");
    }

    #[test]
    fn short_numbers_get_opaque_mask() {
        assert_eq!(mask_phone("12345"), "****");
        assert_eq!(mask_phone(""), "****");
    }

    #[test]
    fn mask_length_matches_input() {
        let phone = "3001234567";
        assert_eq!(mask_phone(phone).len(), phone.len());
        assert_eq!(
            mask_phone(phone).chars().filter(|c| *c == '*').count(),
            phone.len() - 5
        );
    }
}
