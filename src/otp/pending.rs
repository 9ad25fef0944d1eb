//! Cache-backed staging area for registrations awaiting verification.
//!
//! Nothing is written to the contact store until the phone is verified, so
//! abandoned registrations leave no rows behind; the cache TTL is the
//! garbage collector. This is best-effort staging, not durable storage:
//! losing an entry to cache eviction before its TTL only forces the visitor
//! to restart registration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::error::OtpError;
use super::phone::digits_only;
use super::sender::Channel;
use super::validate::{validate_document, validate_email, validate_name, validate_phone};
use crate::cache::Cache;
use crate::store::NewContact;

const PENDING_KEY_PREFIX: &str = "pending_registration";
const LOCK_KEY_PREFIX: &str = "otp_lock";

/// Guest-submitted registration payload, staged until the phone is verified.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistrationForm {
    pub full_name: String,
    #[serde(default)]
    pub document_type: Option<String>,
    pub document: String,
    pub phone_number: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

impl RegistrationForm {
    /// Validate and normalize every field in place.
    ///
    /// # Errors
    /// Returns `OtpError::Validation` for the first field that fails.
    pub fn validate(&mut self) -> Result<(), OtpError> {
        self.full_name = validate_name(&self.full_name, "Full name")?;
        self.document = validate_document(&self.document)?;
        self.phone_number = validate_phone(&self.phone_number)?;
        self.email = match &self.email {
            Some(email) => validate_email(email)?,
            None => None,
        };
        Ok(())
    }

    #[must_use]
    pub fn into_new_contact(self) -> NewContact {
        NewContact {
            full_name: self.full_name,
            document_type: self.document_type,
            document: self.document,
            phone_number: self.phone_number,
            email: self.email,
            gender: self.gender,
        }
    }
}

/// One in-flight registration challenge, tied 1:1 to its staged form.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingRegistration {
    pub form: RegistrationForm,
    pub otp_code_hash: String,
    pub attempts: u32,
    pub channel: Channel,
    pub created_at: i64,
}

/// Staging store keyed by the digits-only phone number, so formatting
/// variants of one number share a single in-flight registration.
#[derive(Clone)]
pub struct PendingRegistrationStore {
    cache: Arc<dyn Cache>,
}

impl PendingRegistrationStore {
    #[must_use]
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    fn key(phone_digits: &str) -> String {
        format!("{PENDING_KEY_PREFIX}:{phone_digits}")
    }

    fn lock_key(phone_digits: &str) -> String {
        format!("{LOCK_KEY_PREFIX}:{phone_digits}")
    }

    /// Normalize any phone representation to the staging key.
    #[must_use]
    pub fn normalize_key(phone: &str) -> String {
        digits_only(phone)
    }

    /// # Errors
    /// Returns an error if the entry cannot be serialized.
    pub async fn put(
        &self,
        phone_digits: &str,
        record: &PendingRegistration,
        ttl: Duration,
    ) -> Result<()> {
        let value =
            serde_json::to_string(record).context("failed to serialize pending registration")?;
        self.cache.set(&Self::key(phone_digits), value, ttl).await;
        Ok(())
    }

    /// Returns `None` for missing entries and for entries that no longer
    /// deserialize (treated as absent rather than poisoning the flow).
    pub async fn get(&self, phone_digits: &str) -> Option<PendingRegistration> {
        let value = self.cache.get(&Self::key(phone_digits)).await?;
        serde_json::from_str(&value).ok()
    }

    /// Remove the entry, reporting whether one was present. The boolean is
    /// what makes concurrent verifications single-winner.
    pub async fn delete(&self, phone_digits: &str) -> bool {
        self.cache.delete(&Self::key(phone_digits)).await
    }

    /// Mark the phone locked out of registration verification. The lock
    /// lives in the cache because no contact row exists yet.
    pub async fn set_lock(&self, phone_digits: &str, locked_until: i64, ttl: Duration) {
        self.cache
            .set(&Self::lock_key(phone_digits), locked_until.to_string(), ttl)
            .await;
    }

    /// Remaining lockout seconds, if a lock is active at `now`.
    pub async fn lock_remaining(&self, phone_digits: &str, now: i64) -> Option<i64> {
        let value = self.cache.get(&Self::lock_key(phone_digits)).await?;
        let locked_until: i64 = value.parse().ok()?;
        (locked_until > now).then_some(locked_until - now)
    }
}
