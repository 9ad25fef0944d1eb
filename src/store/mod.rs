//! Contact record store collaborator.
//!
//! The OTP engine and token service talk to contact records exclusively
//! through [`ContactStore`]. [`PgContactStore`] is the production backend;
//! [`MemoryContactStore`] backs tests and local development without a
//! database.

mod memory;
mod postgres;

pub use memory::MemoryContactStore;
pub use postgres::PgContactStore;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// A portal contact with its transient OTP challenge and bearer-session
/// state. Timestamps are unix seconds.
#[derive(Clone, Debug)]
pub struct ContactRecord {
    pub id: Uuid,
    pub full_name: String,
    pub document_type: Option<String>,
    pub document: String,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub otp_code_hash: Option<String>,
    pub otp_created_at: Option<i64>,
    pub otp_attempts: i32,
    pub otp_locked_until: Option<i64>,
    pub otp_requests_count: i32,
    pub otp_requests_reset_at: Option<i64>,
    pub auth_token_hash: Option<String>,
    pub token_created_at: Option<i64>,
}

/// Fields required to create a contact from a verified registration.
#[derive(Clone, Debug)]
pub struct NewContact {
    pub full_name: String,
    pub document_type: Option<String>,
    pub document: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub gender: Option<String>,
}

/// Outcome of a contact creation attempt. `Conflict` means another record
/// with the same document number already exists; the unique index is the
/// authority, so two racing creations resolve to one `Created` and one
/// `Conflict`.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(ContactRecord),
    Conflict,
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn find_by_document(&self, document: &str) -> Result<Option<ContactRecord>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ContactRecord>>;

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<ContactRecord>>;

    async fn document_exists(&self, document: &str) -> Result<bool>;

    async fn create(&self, contact: NewContact) -> Result<CreateOutcome>;

    /// Persist a freshly issued challenge: code hash, creation time, the
    /// updated hourly request counter, and attempts reset to zero. A new
    /// challenge always replaces whatever was outstanding.
    async fn store_challenge(
        &self,
        id: Uuid,
        code_hash: &str,
        created_at: i64,
        requests_count: i32,
        requests_reset_at: Option<i64>,
    ) -> Result<()>;

    /// Drop an expired or stale challenge (hash + creation time).
    async fn clear_challenge(&self, id: Uuid) -> Result<()>;

    async fn record_failed_attempt(&self, id: Uuid, attempts: i32) -> Result<()>;

    /// Lock the contact out of verification until `locked_until` and clear
    /// the outstanding challenge.
    async fn lock_contact(&self, id: Uuid, locked_until: i64) -> Result<()>;

    /// Clear an elapsed lockout and reset the attempt counter.
    async fn clear_lockout(&self, id: Uuid) -> Result<()>;

    /// Compare-and-clear consumption of a challenge: atomically clears the
    /// stored state iff the stored hash still equals `code_hash`. Returns
    /// `false` when another call already consumed it, so concurrent
    /// verifications of the same code yield exactly one winner.
    async fn take_challenge(&self, id: Uuid, code_hash: &str) -> Result<bool>;

    async fn set_auth_token(&self, id: Uuid, token_hash: &str, created_at: i64) -> Result<()>;

    async fn clear_auth_token(&self, id: Uuid) -> Result<()>;
}
