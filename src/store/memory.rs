//! In-process contact store for tests and local development.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ContactRecord, ContactStore, CreateOutcome, NewContact};

/// Mutex-guarded map of contact records. Every mutation holds the lock for
/// its full read-modify-write, so the compare-and-clear semantics match the
/// conditional UPDATE of the Postgres store.
#[derive(Default)]
pub struct MemoryContactStore {
    contacts: Mutex<HashMap<Uuid, ContactRecord>>,
}

impl MemoryContactStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            contacts: Mutex::new(HashMap::new()),
        }
    }

    /// Seed a contact directly, bypassing registration. Test helper.
    pub async fn insert(&self, record: ContactRecord) {
        let mut contacts = self.contacts.lock().await;
        contacts.insert(record.id, record);
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn find_by_document(&self, document: &str) -> Result<Option<ContactRecord>> {
        let contacts = self.contacts.lock().await;
        Ok(contacts
            .values()
            .find(|record| record.document == document)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ContactRecord>> {
        let contacts = self.contacts.lock().await;
        Ok(contacts.get(&id).cloned())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<ContactRecord>> {
        let contacts = self.contacts.lock().await;
        Ok(contacts
            .values()
            .find(|record| record.auth_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn document_exists(&self, document: &str) -> Result<bool> {
        let contacts = self.contacts.lock().await;
        Ok(contacts
            .values()
            .any(|record| record.document == document))
    }

    async fn create(&self, contact: NewContact) -> Result<CreateOutcome> {
        let mut contacts = self.contacts.lock().await;
        if contacts
            .values()
            .any(|record| record.document == contact.document)
        {
            return Ok(CreateOutcome::Conflict);
        }
        let record = ContactRecord {
            id: Uuid::new_v4(),
            full_name: contact.full_name,
            document_type: contact.document_type,
            document: contact.document,
            phone_number: Some(contact.phone_number),
            email: contact.email,
            gender: contact.gender,
            otp_code_hash: None,
            otp_created_at: None,
            otp_attempts: 0,
            otp_locked_until: None,
            otp_requests_count: 0,
            otp_requests_reset_at: None,
            auth_token_hash: None,
            token_created_at: None,
        };
        contacts.insert(record.id, record.clone());
        Ok(CreateOutcome::Created(record))
    }

    async fn store_challenge(
        &self,
        id: Uuid,
        code_hash: &str,
        created_at: i64,
        requests_count: i32,
        requests_reset_at: Option<i64>,
    ) -> Result<()> {
        let mut contacts = self.contacts.lock().await;
        if let Some(record) = contacts.get_mut(&id) {
            record.otp_code_hash = Some(code_hash.to_string());
            record.otp_created_at = Some(created_at);
            record.otp_attempts = 0;
            record.otp_requests_count = requests_count;
            record.otp_requests_reset_at = requests_reset_at;
        }
        Ok(())
    }

    async fn clear_challenge(&self, id: Uuid) -> Result<()> {
        let mut contacts = self.contacts.lock().await;
        if let Some(record) = contacts.get_mut(&id) {
            record.otp_code_hash = None;
            record.otp_created_at = None;
        }
        Ok(())
    }

    async fn record_failed_attempt(&self, id: Uuid, attempts: i32) -> Result<()> {
        let mut contacts = self.contacts.lock().await;
        if let Some(record) = contacts.get_mut(&id) {
            record.otp_attempts = attempts;
        }
        Ok(())
    }

    async fn lock_contact(&self, id: Uuid, locked_until: i64) -> Result<()> {
        let mut contacts = self.contacts.lock().await;
        if let Some(record) = contacts.get_mut(&id) {
            record.otp_locked_until = Some(locked_until);
            record.otp_code_hash = None;
            record.otp_created_at = None;
        }
        Ok(())
    }

    async fn clear_lockout(&self, id: Uuid) -> Result<()> {
        let mut contacts = self.contacts.lock().await;
        if let Some(record) = contacts.get_mut(&id) {
            record.otp_locked_until = None;
            record.otp_attempts = 0;
        }
        Ok(())
    }

    async fn take_challenge(&self, id: Uuid, code_hash: &str) -> Result<bool> {
        let mut contacts = self.contacts.lock().await;
        let Some(record) = contacts.get_mut(&id) else {
            return Ok(false);
        };
        if record.otp_code_hash.as_deref() != Some(code_hash) {
            return Ok(false);
        }
        record.otp_code_hash = None;
        record.otp_created_at = None;
        record.otp_attempts = 0;
        Ok(true)
    }

    async fn set_auth_token(&self, id: Uuid, token_hash: &str, created_at: i64) -> Result<()> {
        let mut contacts = self.contacts.lock().await;
        if let Some(record) = contacts.get_mut(&id) {
            record.auth_token_hash = Some(token_hash.to_string());
            record.token_created_at = Some(created_at);
        }
        Ok(())
    }

    async fn clear_auth_token(&self, id: Uuid) -> Result<()> {
        let mut contacts = self.contacts.lock().await;
        if let Some(record) = contacts.get_mut(&id) {
            record.auth_token_hash = None;
            record.token_created_at = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_contact(document: &str) -> NewContact {
        NewContact {
            full_name: "Ana Maria".to_string(),
            document_type: Some("CC".to_string()),
            document: document.to_string(),
            phone_number: "+573001234567".to_string(),
            email: None,
            gender: None,
        }
    }

    #[tokio::test]
    async fn create_then_find_by_document() -> Result<()> {
        let store = MemoryContactStore::new();
        let outcome = store.create(new_contact("10203040")).await?;
        assert!(matches!(outcome, CreateOutcome::Created(_)));
        let found = store.find_by_document("10203040").await?;
        assert!(found.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_document_is_conflict() -> Result<()> {
        let store = MemoryContactStore::new();
        store.create(new_contact("10203040")).await?;
        let outcome = store.create(new_contact("10203040")).await?;
        assert!(matches!(outcome, CreateOutcome::Conflict));
        Ok(())
    }

    #[tokio::test]
    async fn take_challenge_consumes_once() -> Result<()> {
        let store = MemoryContactStore::new();
        let CreateOutcome::Created(record) = store.create(new_contact("10203040")).await? else {
            panic!("expected creation");
        };
        store
            .store_challenge(record.id, "hash", 1_700_000_000, 1, None)
            .await?;
        assert!(store.take_challenge(record.id, "hash").await?);
        assert!(!store.take_challenge(record.id, "hash").await?);
        Ok(())
    }

    #[tokio::test]
    async fn take_challenge_rejects_wrong_hash() -> Result<()> {
        let store = MemoryContactStore::new();
        let CreateOutcome::Created(record) = store.create(new_contact("10203040")).await? else {
            panic!("expected creation");
        };
        store
            .store_challenge(record.id, "hash", 1_700_000_000, 1, None)
            .await?;
        assert!(!store.take_challenge(record.id, "other").await?);
        let found = store.find_by_id(record.id).await?.expect("contact");
        assert_eq!(found.otp_code_hash.as_deref(), Some("hash"));
        Ok(())
    }
}
