//! # SQLite Storage
//!
//! Shares identities, challenges and sessions between any number of server
//! processes pointed at the same database file.
//!
//! ## Atomicity
//! Challenge consumption is a single conditional `UPDATE`: only the caller
//! whose statement flips `consumed` from 0 to 1 succeeds. When it matches no
//! row, a follow-up `SELECT` only decides which error to report.

use super::{Challenge, ChallengeBackend, Identity, IdentityStore, SessionBackend, SessionRecord};
use crate::error::{AuthError, AuthResult, ChallengeError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    handle: String,
    id: String,
    public_key: Vec<u8>,
    algorithm: String,
    created_at: String,
}

#[derive(sqlx::FromRow)]
struct ChallengeStateRow {
    nonce: Vec<u8>,
    consumed: bool,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    token_hash: String,
    handle: String,
    issued_at: String,
    expires_at: String,
}

fn decode_error(what: &str, detail: impl std::fmt::Display) -> AuthError {
    AuthError::Storage(sqlx::Error::Decode(format!("{}: {}", what, detail).into()))
}

fn parse_timestamp(value: &str) -> AuthResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| decode_error("invalid timestamp", e))
}

impl TryFrom<IdentityRow> for Identity {
    type Error = AuthError;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        Ok(Identity {
            id: Uuid::parse_str(&row.id).map_err(|e| decode_error("invalid identity id", e))?,
            handle: row.handle,
            public_key: row.public_key,
            algorithm: row
                .algorithm
                .parse()
                .map_err(|e| decode_error("invalid algorithm", e))?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl TryFrom<SessionRow> for SessionRecord {
    type Error = AuthError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(SessionRecord {
            token_hash: row.token_hash,
            handle: row.handle,
            issued_at: parse_timestamp(&row.issued_at)?,
            expires_at: parse_timestamp(&row.expires_at)?,
        })
    }
}

impl SqliteStore {
    /// Wrap an existing pool. Migrations must already have run.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePool::connect(database_url).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl IdentityStore for SqliteStore {
    async fn insert_identity(&self, identity: &Identity) -> AuthResult<()> {
        sqlx::query(
            "INSERT INTO identities (handle, id, public_key, algorithm, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&identity.handle)
        .bind(identity.id.to_string())
        .bind(&identity.public_key)
        .bind(identity.algorithm.as_str())
        .bind(identity.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AuthError::DuplicateHandle,
            _ => AuthError::Storage(e),
        })?;

        Ok(())
    }

    async fn get_identity(&self, handle: &str) -> AuthResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT handle, id, public_key, algorithm, created_at
             FROM identities WHERE handle = ?",
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Identity::try_from).transpose()
    }
}

#[async_trait]
impl ChallengeBackend for SqliteStore {
    async fn put_challenge(&self, challenge: &Challenge) -> AuthResult<()> {
        sqlx::query(
            "INSERT INTO challenges (handle, nonce, issued_at, expires_at, expires_at_ms, consumed)
             VALUES (?, ?, ?, ?, ?, 0)
             ON CONFLICT(handle) DO UPDATE SET
                nonce = excluded.nonce,
                issued_at = excluded.issued_at,
                expires_at = excluded.expires_at,
                expires_at_ms = excluded.expires_at_ms,
                consumed = 0",
        )
        .bind(&challenge.handle)
        .bind(&challenge.nonce)
        .bind(challenge.issued_at.to_rfc3339())
        .bind(challenge.expires_at.to_rfc3339())
        .bind(challenge.expires_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn consume_challenge(
        &self,
        handle: &str,
        nonce: &[u8],
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        let now_ms = now.timestamp_millis();

        let result = sqlx::query(
            "UPDATE challenges SET consumed = 1
             WHERE handle = ? AND nonce = ? AND consumed = 0 AND expires_at_ms > ?",
        )
        .bind(handle)
        .bind(nonce)
        .bind(now_ms)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let state = sqlx::query_as::<_, ChallengeStateRow>(
            "SELECT nonce, consumed FROM challenges WHERE handle = ?",
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;

        let reason = match state {
            None => ChallengeError::NotFound,
            Some(row) if row.nonce != nonce => ChallengeError::NonceMismatch,
            Some(row) if row.consumed => ChallengeError::AlreadyConsumed,
            Some(_) => ChallengeError::Expired,
        };
        Err(reason.into())
    }

    async fn purge_expired_challenges(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let result = sqlx::query("DELETE FROM challenges WHERE expires_at_ms <= ?")
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionBackend for SqliteStore {
    async fn insert_session(&self, record: &SessionRecord) -> AuthResult<()> {
        sqlx::query(
            "INSERT INTO auth_sessions (token_hash, handle, issued_at, expires_at, expires_at_ms)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.token_hash)
        .bind(&record.handle)
        .bind(record.issued_at.to_rfc3339())
        .bind(record.expires_at.to_rfc3339())
        .bind(record.expires_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_session(&self, token_hash: &str) -> AuthResult<Option<SessionRecord>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT token_hash, handle, issued_at, expires_at
             FROM auth_sessions WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SessionRecord::try_from).transpose()
    }

    async fn remove_session(&self, token_hash: &str) -> AuthResult<bool> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE expires_at_ms <= ?")
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
