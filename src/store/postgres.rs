//! Postgres-backed contact store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

use super::{ContactRecord, ContactStore, CreateOutcome, NewContact};

const CONTACT_COLUMNS: &str = r"
    id, full_name, document_type, document, phone_number, email, gender,
    otp_code_hash, otp_created_at, otp_attempts, otp_locked_until,
    otp_requests_count, otp_requests_reset_at, auth_token_hash, token_created_at
";

#[derive(Clone)]
pub struct PgContactStore {
    pool: PgPool,
}

impl PgContactStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &PgRow) -> ContactRecord {
    ContactRecord {
        id: row.get("id"),
        full_name: row.get("full_name"),
        document_type: row.get("document_type"),
        document: row.get("document"),
        phone_number: row.get("phone_number"),
        email: row.get("email"),
        gender: row.get("gender"),
        otp_code_hash: row.get("otp_code_hash"),
        otp_created_at: row.get("otp_created_at"),
        otp_attempts: row.get("otp_attempts"),
        otp_locked_until: row.get("otp_locked_until"),
        otp_requests_count: row.get("otp_requests_count"),
        otp_requests_reset_at: row.get("otp_requests_reset_at"),
        auth_token_hash: row.get("auth_token_hash"),
        token_created_at: row.get("token_created_at"),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn query_span(operation: &'static str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

#[async_trait]
impl ContactStore for PgContactStore {
    async fn find_by_document(&self, document: &str) -> Result<Option<ContactRecord>> {
        let query = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE document = $1 LIMIT 1");
        let row = sqlx::query(&query)
            .bind(document)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup contact by document")?;
        Ok(row.as_ref().map(record_from_row))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ContactRecord>> {
        let query = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1 LIMIT 1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup contact by id")?;
        Ok(row.as_ref().map(record_from_row))
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<ContactRecord>> {
        let query =
            format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE auth_token_hash = $1 LIMIT 1");
        let row = sqlx::query(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup contact by token hash")?;
        Ok(row.as_ref().map(record_from_row))
    }

    async fn document_exists(&self, document: &str) -> Result<bool> {
        let query = "SELECT 1 FROM contacts WHERE document = $1 LIMIT 1";
        let row = sqlx::query(query)
            .bind(document)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to check document existence")?;
        Ok(row.is_some())
    }

    async fn create(&self, contact: NewContact) -> Result<CreateOutcome> {
        let query = format!(
            r"
            INSERT INTO contacts
                (full_name, document_type, document, phone_number, email, gender)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CONTACT_COLUMNS}
        "
        );
        let row = sqlx::query(&query)
            .bind(&contact.full_name)
            .bind(&contact.document_type)
            .bind(&contact.document)
            .bind(&contact.phone_number)
            .bind(&contact.email)
            .bind(&contact.gender)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await;

        match row {
            Ok(row) => Ok(CreateOutcome::Created(record_from_row(&row))),
            Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::Conflict),
            Err(err) => Err(err).context("failed to create contact"),
        }
    }

    async fn store_challenge(
        &self,
        id: Uuid,
        code_hash: &str,
        created_at: i64,
        requests_count: i32,
        requests_reset_at: Option<i64>,
    ) -> Result<()> {
        let query = r"
            UPDATE contacts
            SET otp_code_hash = $2,
                otp_created_at = $3,
                otp_attempts = 0,
                otp_requests_count = $4,
                otp_requests_reset_at = $5,
                updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .bind(code_hash)
            .bind(created_at)
            .bind(requests_count)
            .bind(requests_reset_at)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to store OTP challenge")?;
        Ok(())
    }

    async fn clear_challenge(&self, id: Uuid) -> Result<()> {
        let query = r"
            UPDATE contacts
            SET otp_code_hash = NULL,
                otp_created_at = NULL,
                updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to clear OTP challenge")?;
        Ok(())
    }

    async fn record_failed_attempt(&self, id: Uuid, attempts: i32) -> Result<()> {
        let query = r"
            UPDATE contacts
            SET otp_attempts = $2,
                updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .bind(attempts)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to record OTP attempt")?;
        Ok(())
    }

    async fn lock_contact(&self, id: Uuid, locked_until: i64) -> Result<()> {
        let query = r"
            UPDATE contacts
            SET otp_locked_until = $2,
                otp_code_hash = NULL,
                otp_created_at = NULL,
                updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .bind(locked_until)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to lock contact")?;
        Ok(())
    }

    async fn clear_lockout(&self, id: Uuid) -> Result<()> {
        let query = r"
            UPDATE contacts
            SET otp_locked_until = NULL,
                otp_attempts = 0,
                updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to clear lockout")?;
        Ok(())
    }

    async fn take_challenge(&self, id: Uuid, code_hash: &str) -> Result<bool> {
        // Single conditional update: the row is only cleared when the stored
        // hash still matches, so concurrent verifications cannot both win.
        let query = r"
            UPDATE contacts
            SET otp_code_hash = NULL,
                otp_created_at = NULL,
                otp_attempts = 0,
                updated_at = NOW()
            WHERE id = $1
              AND otp_code_hash = $2
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(code_hash)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to consume OTP challenge")?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_auth_token(&self, id: Uuid, token_hash: &str, created_at: i64) -> Result<()> {
        let query = r"
            UPDATE contacts
            SET auth_token_hash = $2,
                token_created_at = $3,
                updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .bind(token_hash)
            .bind(created_at)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to store auth token")?;
        Ok(())
    }

    async fn clear_auth_token(&self, id: Uuid) -> Result<()> {
        let query = r"
            UPDATE contacts
            SET auth_token_hash = NULL,
                token_created_at = NULL,
                updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to clear auth token")?;
        Ok(())
    }
}
