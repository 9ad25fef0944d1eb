//! The OTP state machine for both authentication flows.
//!
//! Per challenge the states are
//! `NO_CHALLENGE → CHALLENGE_ACTIVE → (VERIFIED | EXPIRED | LOCKED)`;
//! terminal states collapse back to `NO_CHALLENGE` once their side effects
//! (clearing the stale code, expiring the lockout) have run.
//!
//! Delivery ordering is send-then-persist: the challenge hash is only
//! written after the provider accepted the message, so a code that was
//! never delivered can never verify. Consumption is compare-and-clear, so
//! concurrent verifications of the same code produce exactly one token.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::code::{generate_code, hash_code, normalize_code};
use super::config::OtpConfig;
use super::error::OtpError;
use super::pending::{PendingRegistration, PendingRegistrationStore, RegistrationForm};
use super::phone::{mask_phone, to_e164};
use super::sender::{Channel, OtpMessage, OtpSender};
use crate::cache::Cache;
use crate::clock::now_unix_seconds;
use crate::rate_limit::{RateLimitAction, RateLimitDecision, RateLimiter};
use crate::store::{ContactRecord, ContactStore, CreateOutcome};
use crate::token::TokenService;

const SECONDS_PER_HOUR: i64 = 3600;

/// Response data for a successfully issued challenge. Never carries the
/// plaintext code.
#[derive(Clone, Debug)]
pub struct OtpIssued {
    pub phone_masked: String,
    pub channel: Channel,
    pub expiry_minutes: i64,
}

/// Response data for a successful verification.
#[derive(Debug)]
pub struct Verified {
    pub auth_token: String,
    pub contact: ContactRecord,
}

pub struct OtpEngine {
    store: Arc<dyn ContactStore>,
    pending: PendingRegistrationStore,
    limiter: Arc<dyn RateLimiter>,
    sender: Arc<dyn OtpSender>,
    tokens: TokenService,
    config: OtpConfig,
}

impl OtpEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn ContactStore>,
        cache: Arc<dyn Cache>,
        limiter: Arc<dyn RateLimiter>,
        sender: Arc<dyn OtpSender>,
        config: OtpConfig,
    ) -> Self {
        let tokens = TokenService::new(store.clone());
        Self {
            store,
            pending: PendingRegistrationStore::new(cache),
            limiter,
            sender,
            tokens,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    fn ensure_enabled(&self) -> Result<(), OtpError> {
        if self.config.enabled() {
            Ok(())
        } else {
            Err(OtpError::Disabled)
        }
    }

    /// Lockout gate: active lock fails, elapsed lock is cleared (attempts
    /// reset) before the flow continues.
    async fn ensure_not_locked(&self, contact: &mut ContactRecord) -> Result<(), OtpError> {
        if let Some(locked_until) = contact.otp_locked_until {
            let now = now_unix_seconds();
            if now < locked_until {
                return Err(OtpError::Locked {
                    remaining_minutes: remaining_minutes(locked_until, now),
                });
            }
            self.store.clear_lockout(contact.id).await?;
            contact.otp_locked_until = None;
            contact.otp_attempts = 0;
        }
        Ok(())
    }

    async fn deliver(&self, phone: &str, code: &str, channel: Channel) -> Result<(), OtpError> {
        let message = OtpMessage {
            phone_e164: to_e164(phone, self.config.default_country_code()),
            code: code.to_string(),
            channel,
            expiry_minutes: self.config.expiry_minutes(),
        };
        if let Err(err) = self.sender.send(&message).await {
            // Provider detail stays in the logs; the caller gets a generic
            // transport failure and no challenge is persisted.
            error!(
                channel = channel.as_str(),
                "failed to deliver verification code: {err:#}"
            );
            return Err(OtpError::Transport);
        }
        Ok(())
    }

    /// Issue a challenge for an existing contact, addressed by document
    /// number.
    ///
    /// # Errors
    /// `NotFound` for unknown documents or contacts without a phone,
    /// `Locked` during an active lockout, `RateLimited` past the hourly
    /// request budget, `Transport` when delivery fails.
    pub async fn request_otp(
        &self,
        document: &str,
        channel: Channel,
    ) -> Result<OtpIssued, OtpError> {
        self.ensure_enabled()?;
        let mut contact = self
            .store
            .find_by_document(document)
            .await?
            .ok_or(OtpError::NotFound)?;
        let phone = contact
            .phone_number
            .clone()
            .filter(|phone| !phone.trim().is_empty())
            .ok_or(OtpError::NotFound)?;

        self.ensure_not_locked(&mut contact).await?;

        // Rolling hourly request budget, tracked on the contact record.
        let now = now_unix_seconds();
        let mut requests_count = contact.otp_requests_count;
        let mut requests_reset_at = contact.otp_requests_reset_at;
        if let Some(reset_at) = requests_reset_at {
            if now > reset_at {
                requests_count = 0;
                requests_reset_at = None;
            }
        }
        if requests_count >= self.config.max_requests_per_hour() {
            let retry_after_minutes =
                requests_reset_at.map_or(60, |reset_at| remaining_minutes(reset_at, now));
            return Err(OtpError::RateLimited { retry_after_minutes });
        }
        requests_count += 1;
        if requests_count == 1 {
            requests_reset_at = Some(now + SECONDS_PER_HOUR);
        }

        let code = generate_code(self.config.otp_length());
        self.deliver(&phone, &code, channel).await?;
        self.store
            .store_challenge(
                contact.id,
                &hash_code(&code),
                now,
                requests_count,
                requests_reset_at,
            )
            .await?;

        info!(
            contact = %contact.id,
            channel = channel.as_str(),
            "verification code issued"
        );
        Ok(OtpIssued {
            phone_masked: mask_phone(&phone),
            channel,
            expiry_minutes: self.config.expiry_minutes(),
        })
    }

    /// Verify a code for an existing contact and issue a bearer token.
    ///
    /// # Errors
    /// `NotFound`, `Locked`, `NoChallenge`, `Expired` (clears the stale
    /// code), `InvalidCode` with attempts remaining, `LockedOut` once the
    /// attempt budget is exhausted.
    pub async fn verify_otp(&self, document: &str, code: &str) -> Result<Verified, OtpError> {
        self.ensure_enabled()?;
        let mut contact = self
            .store
            .find_by_document(document)
            .await?
            .ok_or(OtpError::NotFound)?;

        self.ensure_not_locked(&mut contact).await?;

        let (stored_hash, created_at) = match (contact.otp_code_hash.clone(), contact.otp_created_at)
        {
            (Some(hash), Some(created_at)) => (hash, created_at),
            _ => return Err(OtpError::NoChallenge),
        };

        let now = now_unix_seconds();
        if now > created_at + self.config.expiry_seconds() {
            self.store.clear_challenge(contact.id).await?;
            return Err(OtpError::Expired);
        }

        let submitted = normalize_code(code);
        if hash_code(&submitted) != stored_hash {
            let attempts = contact.otp_attempts.saturating_add(1);
            let max_attempts = i32::try_from(self.config.max_attempts()).unwrap_or(i32::MAX);
            if attempts >= max_attempts {
                self.store
                    .lock_contact(contact.id, now + self.config.lockout_seconds())
                    .await?;
                warn!(
                    contact = %contact.id,
                    "contact locked out after repeated OTP failures"
                );
                return Err(OtpError::LockedOut {
                    lockout_minutes: self.config.lockout_minutes(),
                });
            }
            self.store
                .record_failed_attempt(contact.id, attempts)
                .await?;
            let attempts_remaining = self
                .config
                .max_attempts()
                .saturating_sub(u32::try_from(attempts).unwrap_or(0));
            return Err(OtpError::InvalidCode { attempts_remaining });
        }

        // Compare-and-clear: if a concurrent call got here first, the
        // challenge is gone and this verification loses.
        if !self.store.take_challenge(contact.id, &stored_hash).await? {
            return Err(OtpError::NoChallenge);
        }

        let auth_token = self.tokens.issue(contact.id).await?;
        info!(contact = %contact.id, "OTP verified, token issued");

        contact.otp_code_hash = None;
        contact.otp_created_at = None;
        contact.otp_attempts = 0;
        Ok(Verified {
            auth_token,
            contact,
        })
    }

    /// Stage a registration and send its verification code. No contact row
    /// is written until the code verifies.
    ///
    /// # Errors
    /// `Validation` for a malformed form, `Conflict` when the document is
    /// already registered, `Locked`/`RateLimited` per phone number,
    /// `Transport` when delivery fails.
    pub async fn request_registration_otp(
        &self,
        mut form: RegistrationForm,
        channel: Channel,
    ) -> Result<OtpIssued, OtpError> {
        self.ensure_enabled()?;
        form.validate()?;

        // Early duplicate check for fast feedback; creation re-checks via
        // the unique index, which is the one that wins races.
        if self.store.document_exists(&form.document).await? {
            return Err(OtpError::Conflict);
        }

        let phone_key = PendingRegistrationStore::normalize_key(&form.phone_number);
        let now = now_unix_seconds();
        if let Some(remaining) = self.pending.lock_remaining(&phone_key, now).await {
            return Err(OtpError::Locked {
                remaining_minutes: (remaining / 60).max(1),
            });
        }
        if let RateLimitDecision::Limited {
            retry_after_seconds,
        } = self
            .limiter
            .check_and_increment(RateLimitAction::RegisterOtp, &phone_key)
            .await
        {
            return Err(OtpError::RateLimited {
                retry_after_minutes: (i64::try_from(retry_after_seconds).unwrap_or(3600) / 60)
                    .max(1),
            });
        }

        let code = generate_code(self.config.otp_length());
        self.deliver(&form.phone_number, &code, channel).await?;

        let phone_masked = mask_phone(&form.phone_number);
        let record = PendingRegistration {
            form,
            otp_code_hash: hash_code(&code),
            attempts: 0,
            channel,
            created_at: now,
        };
        self.pending
            .put(&phone_key, &record, self.challenge_ttl())
            .await?;

        info!(channel = channel.as_str(), "registration challenge staged");
        Ok(OtpIssued {
            phone_masked,
            channel,
            expiry_minutes: self.config.expiry_minutes(),
        })
    }

    /// Verify a registration code, create the contact, and issue a token.
    ///
    /// # Errors
    /// `NoChallenge` when nothing is staged for the phone, `Expired`,
    /// `InvalidCode`, `LockedOut` after the attempt budget, `Conflict` when
    /// a contact with the same document appeared concurrently.
    pub async fn verify_registration_otp(
        &self,
        phone: &str,
        code: &str,
    ) -> Result<Verified, OtpError> {
        self.ensure_enabled()?;
        let phone_key = PendingRegistrationStore::normalize_key(phone);
        if phone_key.is_empty() {
            return Err(OtpError::Validation("Phone number is required".to_string()));
        }

        let now = now_unix_seconds();
        if let Some(remaining) = self.pending.lock_remaining(&phone_key, now).await {
            return Err(OtpError::Locked {
                remaining_minutes: (remaining / 60).max(1),
            });
        }

        let Some(mut pending) = self.pending.get(&phone_key).await else {
            return Err(OtpError::NoChallenge);
        };

        // The cache TTL already bounds the entry's life; this check also
        // covers a TTL that outlived a shortened expiry configuration.
        if now > pending.created_at + self.config.expiry_seconds() {
            self.pending.delete(&phone_key).await;
            return Err(OtpError::Expired);
        }

        let submitted = normalize_code(code);
        if hash_code(&submitted) != pending.otp_code_hash {
            let attempts = pending.attempts.saturating_add(1);
            if attempts >= self.config.max_attempts() {
                self.pending.delete(&phone_key).await;
                self.pending
                    .set_lock(
                        &phone_key,
                        now + self.config.lockout_seconds(),
                        self.lockout_ttl(),
                    )
                    .await;
                warn!("registration locked out after repeated OTP failures");
                return Err(OtpError::LockedOut {
                    lockout_minutes: self.config.lockout_minutes(),
                });
            }
            pending.attempts = attempts;
            let remaining_ttl = (pending.created_at + self.config.expiry_seconds() - now).max(1);
            self.pending
                .put(
                    &phone_key,
                    &pending,
                    Duration::from_secs(u64::try_from(remaining_ttl).unwrap_or(1)),
                )
                .await?;
            return Err(OtpError::InvalidCode {
                attempts_remaining: self.config.max_attempts() - attempts,
            });
        }

        // Take-once: the delete's return value elects a single winner among
        // concurrent verifications.
        if !self.pending.delete(&phone_key).await {
            return Err(OtpError::NoChallenge);
        }

        match self.store.create(pending.form.into_new_contact()).await? {
            CreateOutcome::Conflict => Err(OtpError::Conflict),
            CreateOutcome::Created(contact) => {
                let auth_token = self.tokens.issue(contact.id).await?;
                info!(contact = %contact.id, "registration verified, contact created");
                Ok(Verified {
                    auth_token,
                    contact,
                })
            }
        }
    }

    /// Replace the staged challenge with a fresh code. The previous code
    /// stops working immediately; there is no grace period.
    ///
    /// # Errors
    /// `NoChallenge` when nothing is staged, `Locked`/`RateLimited` per
    /// phone, `Transport` when delivery fails.
    pub async fn resend_registration_otp(
        &self,
        phone: &str,
        channel: Option<Channel>,
    ) -> Result<OtpIssued, OtpError> {
        self.ensure_enabled()?;
        let phone_key = PendingRegistrationStore::normalize_key(phone);
        if phone_key.is_empty() {
            return Err(OtpError::Validation("Phone number is required".to_string()));
        }

        let now = now_unix_seconds();
        if let Some(remaining) = self.pending.lock_remaining(&phone_key, now).await {
            return Err(OtpError::Locked {
                remaining_minutes: (remaining / 60).max(1),
            });
        }
        let Some(pending) = self.pending.get(&phone_key).await else {
            return Err(OtpError::NoChallenge);
        };
        if let RateLimitDecision::Limited {
            retry_after_seconds,
        } = self
            .limiter
            .check_and_increment(RateLimitAction::RegisterOtp, &phone_key)
            .await
        {
            return Err(OtpError::RateLimited {
                retry_after_minutes: (i64::try_from(retry_after_seconds).unwrap_or(3600) / 60)
                    .max(1),
            });
        }

        let channel = channel.unwrap_or(pending.channel);
        let code = generate_code(self.config.otp_length());
        self.deliver(&pending.form.phone_number, &code, channel)
            .await?;

        let phone_masked = mask_phone(&pending.form.phone_number);
        let record = PendingRegistration {
            form: pending.form,
            otp_code_hash: hash_code(&code),
            attempts: 0,
            channel,
            created_at: now,
        };
        self.pending
            .put(&phone_key, &record, self.challenge_ttl())
            .await?;

        info!(channel = channel.as_str(), "registration challenge replaced");
        Ok(OtpIssued {
            phone_masked,
            channel,
            expiry_minutes: self.config.expiry_minutes(),
        })
    }

    /// Drop a staged registration. Unconditional and idempotent: no identity
    /// exists yet to own the entry, so knowing the phone number is enough.
    ///
    /// # Errors
    /// `Validation` when the phone is empty.
    pub async fn cancel_registration(&self, phone: &str) -> Result<(), OtpError> {
        let phone_key = PendingRegistrationStore::normalize_key(phone);
        if phone_key.is_empty() {
            return Err(OtpError::Validation("Phone number is required".to_string()));
        }
        let removed = self.pending.delete(&phone_key).await;
        debug!(removed, "registration cancelled");
        Ok(())
    }

    fn challenge_ttl(&self) -> Duration {
        Duration::from_secs(u64::try_from(self.config.expiry_seconds()).unwrap_or(300))
    }

    fn lockout_ttl(&self) -> Duration {
        Duration::from_secs(u64::try_from(self.config.lockout_seconds()).unwrap_or(1800))
    }
}

const fn remaining_minutes(until: i64, now: i64) -> i64 {
    let seconds = until - now;
    if seconds <= 60 { 1 } else { seconds / 60 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::rate_limit::NoopRateLimiter;
    use crate::store::MemoryContactStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    /// Sender that records every message so tests can read the code back.
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<OtpMessage>>,
    }

    impl RecordingSender {
        async fn last_code(&self) -> String {
            let sent = self.sent.lock().await;
            sent.last().map(|m| m.code.clone()).unwrap_or_default()
        }

        async fn count(&self) -> usize {
            self.sent.lock().await.len()
        }
    }

    #[async_trait]
    impl OtpSender for RecordingSender {
        async fn send(&self, message: &OtpMessage) -> Result<()> {
            self.sent.lock().await.push(message.clone());
            Ok(())
        }
    }

    /// Sender that always fails, for send-then-persist ordering tests.
    struct FailingSender;

    #[async_trait]
    impl OtpSender for FailingSender {
        async fn send(&self, _message: &OtpMessage) -> Result<()> {
            Err(anyhow::anyhow!("provider unavailable"))
        }
    }

    struct Harness {
        engine: OtpEngine,
        store: Arc<MemoryContactStore>,
        sender: Arc<RecordingSender>,
    }

    fn harness_with(config: OtpConfig) -> Harness {
        let store = Arc::new(MemoryContactStore::new());
        let sender = Arc::new(RecordingSender::default());
        let engine = OtpEngine::new(
            store.clone(),
            Arc::new(MemoryCache::new()),
            Arc::new(NoopRateLimiter),
            sender.clone(),
            config,
        );
        Harness {
            engine,
            store,
            sender,
        }
    }

    fn harness() -> Harness {
        harness_with(OtpConfig::new())
    }

    fn contact(document: &str, phone: Option<&str>) -> ContactRecord {
        ContactRecord {
            id: Uuid::new_v4(),
            full_name: "Ana Maria".to_string(),
            document_type: Some("CC".to_string()),
            document: document.to_string(),
            phone_number: phone.map(str::to_string),
            email: None,
            gender: None,
            otp_code_hash: None,
            otp_created_at: None,
            otp_attempts: 0,
            otp_locked_until: None,
            otp_requests_count: 0,
            otp_requests_reset_at: None,
            auth_token_hash: None,
            token_created_at: None,
        }
    }

    #[tokio::test]
    async fn request_then_verify_succeeds_once() -> Result<()> {
        let h = harness();
        h.store.insert(contact("10203040", Some("3001234567"))).await;

        let issued = h.engine.request_otp("10203040", Channel::Sms).await?;
        assert_eq!(issued.phone_masked, "300*****67");
        assert_eq!(issued.expiry_minutes, 5);

        let code = h.sender.last_code().await;
        let verified = h.engine.verify_otp("10203040", &code).await?;
        assert!(!verified.auth_token.is_empty());

        // The code was cleared on success; replaying it finds no challenge.
        let replay = h.engine.verify_otp("10203040", &code).await;
        assert!(matches!(replay, Err(OtpError::NoChallenge)));
        Ok(())
    }

    #[tokio::test]
    async fn verify_accepts_code_with_separators() -> Result<()> {
        let h = harness();
        h.store.insert(contact("10203040", Some("3001234567"))).await;
        h.engine.request_otp("10203040", Channel::Sms).await?;
        let code = h.sender.last_code().await;
        let spaced = format!("{} {}", &code[..3], &code[3..]);
        assert!(h.engine.verify_otp("10203040", &spaced).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let h = harness();
        let result = h.engine.request_otp("99999999", Channel::Sms).await;
        assert!(matches!(result, Err(OtpError::NotFound)));
    }

    #[tokio::test]
    async fn contact_without_phone_is_not_found() {
        let h = harness();
        h.store.insert(contact("10203040", None)).await;
        let result = h.engine.request_otp("10203040", Channel::Sms).await;
        assert!(matches!(result, Err(OtpError::NotFound)));
    }

    #[tokio::test]
    async fn unknown_channel_handled_upstream_defaults_to_sms() -> Result<()> {
        let h = harness();
        h.store.insert(contact("10203040", Some("3001234567"))).await;
        let issued = h
            .engine
            .request_otp("10203040", Channel::from_param("telegram"))
            .await?;
        assert_eq!(issued.channel, Channel::Sms);
        Ok(())
    }

    #[tokio::test]
    async fn failed_send_persists_nothing() -> Result<()> {
        let store = Arc::new(MemoryContactStore::new());
        store.insert(contact("10203040", Some("3001234567"))).await;
        let engine = OtpEngine::new(
            store.clone(),
            Arc::new(MemoryCache::new()),
            Arc::new(NoopRateLimiter),
            Arc::new(FailingSender),
            OtpConfig::new(),
        );

        let result = engine.request_otp("10203040", Channel::Sms).await;
        assert!(matches!(result, Err(OtpError::Transport)));

        let record = store.find_by_document("10203040").await?.expect("contact");
        assert!(record.otp_code_hash.is_none());
        assert!(record.otp_created_at.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn wrong_codes_count_down_then_lock() -> Result<()> {
        let h = harness_with(OtpConfig::new().with_max_attempts(3));
        h.store.insert(contact("10203040", Some("3001234567"))).await;
        h.engine.request_otp("10203040", Channel::Sms).await?;
        let code = h.sender.last_code().await;
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let first = h.engine.verify_otp("10203040", wrong).await;
        assert!(matches!(
            first,
            Err(OtpError::InvalidCode {
                attempts_remaining: 2
            })
        ));
        let second = h.engine.verify_otp("10203040", wrong).await;
        assert!(matches!(
            second,
            Err(OtpError::InvalidCode {
                attempts_remaining: 1
            })
        ));
        let third = h.engine.verify_otp("10203040", wrong).await;
        assert!(matches!(third, Err(OtpError::LockedOut { .. })));

        // Even the correct code is rejected while locked.
        let locked = h.engine.verify_otp("10203040", &code).await;
        assert!(matches!(locked, Err(OtpError::Locked { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn elapsed_lockout_clears_and_flow_restarts() -> Result<()> {
        let h = harness();
        let mut record = contact("10203040", Some("3001234567"));
        record.otp_locked_until = Some(now_unix_seconds() - 10);
        record.otp_attempts = 5;
        let id = record.id;
        h.store.insert(record).await;

        h.engine.request_otp("10203040", Channel::Sms).await?;
        let refreshed = h.store.find_by_id(id).await?.expect("contact");
        assert!(refreshed.otp_locked_until.is_none());
        assert_eq!(refreshed.otp_attempts, 0);
        Ok(())
    }

    #[tokio::test]
    async fn expired_challenge_is_cleared() -> Result<()> {
        let h = harness();
        let record = contact("10203040", Some("3001234567"));
        let id = record.id;
        h.store.insert(record).await;
        h.engine.request_otp("10203040", Channel::Sms).await?;
        let code = h.sender.last_code().await;

        // Backdate the challenge past the expiry window.
        let expired_at = now_unix_seconds() - h.engine.config().expiry_seconds() - 1;
        h.store
            .store_challenge(id, &hash_code(&code), expired_at, 1, None)
            .await?;

        let result = h.engine.verify_otp("10203040", &code).await;
        assert!(matches!(result, Err(OtpError::Expired)));

        // Side effect: the stale code is gone, next verify sees no challenge.
        let again = h.engine.verify_otp("10203040", &code).await;
        assert!(matches!(again, Err(OtpError::NoChallenge)));
        Ok(())
    }

    #[tokio::test]
    async fn hourly_request_budget_enforced_and_resets() -> Result<()> {
        let h = harness();
        let record = contact("10203040", Some("3001234567"));
        let id = record.id;
        h.store.insert(record).await;

        for _ in 0..3 {
            h.engine.request_otp("10203040", Channel::Sms).await?;
        }
        let limited = h.engine.request_otp("10203040", Channel::Sms).await;
        assert!(matches!(limited, Err(OtpError::RateLimited { .. })));

        // Backdate the window so the counter resets on the next request.
        let refreshed = h.store.find_by_id(id).await?.expect("contact");
        h.store
            .store_challenge(
                id,
                refreshed.otp_code_hash.as_deref().unwrap_or_default(),
                refreshed.otp_created_at.unwrap_or_default(),
                refreshed.otp_requests_count,
                Some(now_unix_seconds() - 1),
            )
            .await?;
        assert!(h.engine.request_otp("10203040", Channel::Sms).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn resend_invalidates_previous_code() -> Result<()> {
        let h = harness();
        h.store.insert(contact("10203040", Some("3001234567"))).await;
        h.engine.request_otp("10203040", Channel::Sms).await?;
        let first_code = h.sender.last_code().await;
        h.engine.request_otp("10203040", Channel::Sms).await?;
        let second_code = h.sender.last_code().await;

        if first_code != second_code {
            let stale = h.engine.verify_otp("10203040", &first_code).await;
            assert!(matches!(stale, Err(OtpError::InvalidCode { .. })));
        }
        assert!(h.engine.verify_otp("10203040", &second_code).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn disabled_engine_rejects_everything() {
        let h = harness_with(OtpConfig::new().with_enabled(false));
        let request = h.engine.request_otp("10203040", Channel::Sms).await;
        assert!(matches!(request, Err(OtpError::Disabled)));
        let verify = h.engine.verify_otp("10203040", "123456").await;
        assert!(matches!(verify, Err(OtpError::Disabled)));
    }

    fn registration_form(document: &str, phone: &str) -> RegistrationForm {
        RegistrationForm {
            full_name: "Ana Maria".to_string(),
            document_type: Some("CC".to_string()),
            document: document.to_string(),
            phone_number: phone.to_string(),
            email: Some("ana@example.com".to_string()),
            gender: None,
        }
    }

    #[tokio::test]
    async fn registration_round_trip_creates_contact() -> Result<()> {
        let h = harness();
        let issued = h
            .engine
            .request_registration_otp(registration_form("10203040", "3001234567"), Channel::Sms)
            .await?;
        assert_eq!(issued.phone_masked, "300*****67");

        let code = h.sender.last_code().await;
        let verified = h.engine.verify_registration_otp("3001234567", &code).await?;
        assert_eq!(verified.contact.document, "10203040");
        assert!(!verified.auth_token.is_empty());

        // Staged entry was consumed.
        let replay = h.engine.verify_registration_otp("3001234567", &code).await;
        assert!(matches!(replay, Err(OtpError::NoChallenge)));

        // Contact exists; a fresh registration for the document conflicts.
        let dup = h
            .engine
            .request_registration_otp(registration_form("10203040", "3009999999"), Channel::Sms)
            .await;
        assert!(matches!(dup, Err(OtpError::Conflict)));
        Ok(())
    }

    #[tokio::test]
    async fn registration_verify_accepts_formatted_phone() -> Result<()> {
        let h = harness();
        h.engine
            .request_registration_otp(
                registration_form("10203040", "+57 300 123 4567"),
                Channel::Whatsapp,
            )
            .await?;
        let code = h.sender.last_code().await;
        // Different formatting of the same number reaches the same entry.
        let verified = h
            .engine
            .verify_registration_otp("573001234567", &code)
            .await?;
        assert_eq!(verified.contact.full_name, "Ana Maria");
        Ok(())
    }

    #[tokio::test]
    async fn registration_wrong_codes_lock_the_phone() -> Result<()> {
        let h = harness_with(OtpConfig::new().with_max_attempts(2));
        h.engine
            .request_registration_otp(registration_form("10203040", "3001234567"), Channel::Sms)
            .await?;
        let code = h.sender.last_code().await;
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let first = h.engine.verify_registration_otp("3001234567", wrong).await;
        assert!(matches!(
            first,
            Err(OtpError::InvalidCode {
                attempts_remaining: 1
            })
        ));
        let second = h.engine.verify_registration_otp("3001234567", wrong).await;
        assert!(matches!(second, Err(OtpError::LockedOut { .. })));

        // The lock also blocks a fresh registration request for the phone.
        let again = h
            .engine
            .request_registration_otp(registration_form("10203040", "3001234567"), Channel::Sms)
            .await;
        assert!(matches!(again, Err(OtpError::Locked { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn registration_resend_replaces_code_and_channel() -> Result<()> {
        let h = harness();
        h.engine
            .request_registration_otp(registration_form("10203040", "3001234567"), Channel::Sms)
            .await?;
        let first_code = h.sender.last_code().await;

        let resent = h
            .engine
            .resend_registration_otp("3001234567", Some(Channel::Whatsapp))
            .await?;
        assert_eq!(resent.channel, Channel::Whatsapp);
        assert_eq!(h.sender.count().await, 2);
        let second_code = h.sender.last_code().await;

        if first_code != second_code {
            let stale = h
                .engine
                .verify_registration_otp("3001234567", &first_code)
                .await;
            assert!(matches!(stale, Err(OtpError::InvalidCode { .. })));
        }
        assert!(
            h.engine
                .verify_registration_otp("3001234567", &second_code)
                .await
                .is_ok()
        );
        Ok(())
    }

    #[tokio::test]
    async fn resend_without_pending_entry_is_no_challenge() {
        let h = harness();
        let result = h.engine.resend_registration_otp("3001234567", None).await;
        assert!(matches!(result, Err(OtpError::NoChallenge)));
    }

    #[tokio::test]
    async fn cancel_registration_is_idempotent() -> Result<()> {
        let h = harness();
        h.engine
            .request_registration_otp(registration_form("10203040", "3001234567"), Channel::Sms)
            .await?;
        h.engine.cancel_registration("3001234567").await?;
        // Second cancel is still a success.
        h.engine.cancel_registration("3001234567").await?;
        let code = h.sender.last_code().await;
        let result = h.engine.verify_registration_otp("3001234567", &code).await;
        assert!(matches!(result, Err(OtpError::NoChallenge)));
        Ok(())
    }
}
