//! # Entrada (Guest Contact Registration & OTP Verification)
//!
//! `entrada` is the guest-facing authentication layer for a service portal.
//! Anonymous visitors identify themselves by a national document number,
//! verify their phone via a one-time passcode delivered over SMS or WhatsApp,
//! and receive an opaque bearer token for subsequent requests.
//!
//! ## Flows
//!
//! - **Existing contact**: `request_otp(document)` sends a code to the phone
//!   on file; `verify_otp(document, code)` exchanges the code for a bearer
//!   token. Challenge state lives on the contact record.
//! - **Registration**: the full registration form is staged in an expiring
//!   cache keyed by phone number while the code is outstanding. Only a
//!   successful verification promotes the staged form to a real contact
//!   record; the document-number unique index resolves creation races.
//!
//! ## Security model
//!
//! Raw codes and tokens are never stored; the database only holds SHA-256
//! hashes. Verification is attempt-limited with a temporary lockout, requests
//! are rate-limited per contact and per client IP, and every write endpoint
//! carries a honeypot field for bot detection. Send-then-persist ordering
//! guarantees a code that was never delivered can never verify.

pub mod api;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod otp;
pub mod rate_limit;
pub mod store;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
