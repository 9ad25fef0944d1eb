//! Opaque bearer tokens for authenticated contacts.
//!
//! Tokens are 32 random bytes, handed to the client once and stored only as
//! a SHA-256 hash on the contact record. Lookup is by hash, so issuing a new
//! token implicitly invalidates the previous one (single active session per
//! contact). Comparing fixed-length hashes through an index lookup avoids
//! timing side-channels on the raw token value.

use anyhow::{Context, Result};
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::clock::now_unix_seconds;
use crate::store::{ContactRecord, ContactStore};
use uuid::Uuid;

const TOKEN_BYTES: usize = 32;
const SECONDS_PER_DAY: i64 = 24 * 60 * 60;
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;

/// Create a new bearer token. The raw value is only returned to the client;
/// the store keeps a hash.
pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate auth token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a token so raw values never touch the database.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Issues, resolves, and revokes bearer tokens against the contact store.
#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn ContactStore>,
    ttl_days: i64,
}

impl TokenService {
    #[must_use]
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self {
            store,
            ttl_days: DEFAULT_TOKEN_TTL_DAYS,
        }
    }

    #[must_use]
    pub fn with_ttl_days(mut self, days: i64) -> Self {
        self.ttl_days = days;
        self
    }

    /// Issue a fresh token for a contact, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error if token generation or the store update fails.
    pub async fn issue(&self, contact_id: Uuid) -> Result<String> {
        let token = generate_token()?;
        let token_hash = hash_token(&token);
        self.store
            .set_auth_token(contact_id, &token_hash, now_unix_seconds())
            .await?;
        Ok(token)
    }

    /// Resolve a raw token to its contact. Returns `None` for unknown or
    /// expired tokens; expired hashes are cleared as a side effect.
    ///
    /// # Errors
    /// Returns an error only on store failures, never for invalid tokens.
    pub async fn resolve(&self, token: &str) -> Result<Option<ContactRecord>> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }
        let token_hash = hash_token(token);
        let Some(record) = self.store.find_by_token_hash(&token_hash).await? else {
            return Ok(None);
        };

        if let Some(created_at) = record.token_created_at {
            let age = now_unix_seconds().saturating_sub(created_at);
            if age > self.ttl_days * SECONDS_PER_DAY {
                self.store.clear_auth_token(record.id).await?;
                return Ok(None);
            }
        }

        Ok(Some(record))
    }

    /// Drop the contact's token. Idempotent.
    ///
    /// # Errors
    /// Returns an error if the store update fails.
    pub async fn revoke(&self, contact_id: Uuid) -> Result<()> {
        self.store.clear_auth_token(contact_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryContactStore;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    async fn seeded_store() -> (Arc<MemoryContactStore>, Uuid) {
        let store = Arc::new(MemoryContactStore::new());
        let record = ContactRecord {
            id: Uuid::new_v4(),
            full_name: "Ana Maria".to_string(),
            document_type: Some("CC".to_string()),
            document: "10203040".to_string(),
            phone_number: Some("+573001234567".to_string()),
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
        };
        let id = record.id;
        store.insert(record).await;
        (store, id)
    }

    #[test]
    fn generate_token_has_enough_entropy() -> Result<()> {
        let token = generate_token()?;
        let decoded = URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .context("token should be url-safe base64")?;
        assert_eq!(decoded.len(), TOKEN_BYTES);
        Ok(())
    }

    #[test]
    fn hash_token_is_stable_and_distinct() {
        assert_eq!(hash_token("token"), hash_token("token"));
        assert_ne!(hash_token("token"), hash_token("other"));
    }

    #[tokio::test]
    async fn issue_then_resolve_round_trip() -> Result<()> {
        let (store, id) = seeded_store().await;
        let tokens = TokenService::new(store);
        let token = tokens.issue(id).await?;
        let resolved = tokens.resolve(&token).await?;
        assert_eq!(resolved.map(|record| record.id), Some(id));
        Ok(())
    }

    #[tokio::test]
    async fn new_token_invalidates_previous() -> Result<()> {
        let (store, id) = seeded_store().await;
        let tokens = TokenService::new(store);
        let first = tokens.issue(id).await?;
        let second = tokens.issue(id).await?;
        assert!(tokens.resolve(&first).await?.is_none());
        assert!(tokens.resolve(&second).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn expired_token_is_cleared() -> Result<()> {
        let (store, id) = seeded_store().await;
        let tokens = TokenService::new(store.clone());
        let token = tokens.issue(id).await?;
        // Backdate the issue timestamp past the 30-day window.
        let hash = hash_token(&token);
        store
            .set_auth_token(id, &hash, now_unix_seconds() - 31 * SECONDS_PER_DAY)
            .await?;
        assert!(tokens.resolve(&token).await?.is_none());
        // Side effect: the stale hash is gone from the record.
        let record = store.find_by_id(id).await?.expect("contact");
        assert!(record.auth_token_hash.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn revoke_is_idempotent() -> Result<()> {
        let (store, id) = seeded_store().await;
        let tokens = TokenService::new(store);
        let token = tokens.issue(id).await?;
        tokens.revoke(id).await?;
        tokens.revoke(id).await?;
        assert!(tokens.resolve(&token).await?.is_none());
        Ok(())
    }
}
