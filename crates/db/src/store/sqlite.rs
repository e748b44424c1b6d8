//! Embedded SQLite session store — the local fallback backend.
//!
//! Used when PostgreSQL is unreachable at startup so the process can still
//! serve traffic in development. Ids are stored as TEXT and timestamps are
//! bound from Rust (RFC 3339 text), keeping the column comparisons the
//! store relies on well-defined.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::models::session::{decode_status, NewSession, Session};
use crate::store::{BackendKind, SessionStore};

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS tryon_sessions (
        id TEXT PRIMARY KEY,
        user_token TEXT NOT NULL,
        user_image_ref TEXT NOT NULL,
        garment_image_ref TEXT NOT NULL,
        output_image_ref TEXT,
        status TEXT NOT NULL DEFAULT 'created',
        error_reason TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        expires_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_tryon_sessions_user_token ON tryon_sessions (user_token)",
    "CREATE INDEX IF NOT EXISTS idx_tryon_sessions_status ON tryon_sessions (status)",
    "CREATE INDEX IF NOT EXISTS idx_tryon_sessions_expires_at ON tryon_sessions (expires_at)",
];

const COLUMNS: &str = "id, user_token, user_image_ref, garment_image_ref, output_image_ref, \
                       status, error_reason, created_at, updated_at, expires_at";

#[derive(Debug, FromRow)]
struct SessionRow {
    id: String,
    user_token: String,
    user_image_ref: String,
    garment_image_ref: String,
    output_image_ref: Option<String>,
    status: String,
    error_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> Result<Session, sqlx::Error> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| sqlx::Error::Decode(format!("invalid session id: {e}").into()))?;
        Ok(Session {
            id,
            user_token: self.user_token,
            user_image_ref: self.user_image_ref,
            garment_image_ref: self.garment_image_ref,
            output_image_ref: self.output_image_ref,
            status: decode_status(&self.status)?,
            error_reason: self.error_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at,
        })
    }
}

pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (creating the file if needed) and bootstrap the schema.
    ///
    /// The pool is capped at one connection: SQLite serializes writes
    /// anyway, and a single connection makes `sqlite::memory:` databases
    /// behave in tests.
    pub async fn connect(database_url: &str, timeout: Duration) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self { pool })
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn create(&self, new: &NewSession) -> Result<Session, sqlx::Error> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO tryon_sessions
                (id, user_token, user_image_ref, garment_image_ref, status,
                 created_at, updated_at, expires_at)
             VALUES ($1, $2, $3, $4, 'created', $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SessionRow>(&query)
            .bind(new.id.to_string())
            .bind(&new.user_token)
            .bind(&new.user_image_ref)
            .bind(&new.garment_image_ref)
            .bind(now)
            .bind(now)
            .bind(new.expires_at)
            .fetch_one(&self.pool)
            .await?
            .into_session()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tryon_sessions WHERE id = $1");
        sqlx::query_as::<_, SessionRow>(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(SessionRow::into_session)
            .transpose()
    }

    async fn list_by_user(&self, token: &str, limit: i64) -> Result<Vec<Session>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tryon_sessions
             WHERE user_token = $1
             ORDER BY created_at DESC
             LIMIT $2"
        );
        sqlx::query_as::<_, SessionRow>(&query)
            .bind(token)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(SessionRow::into_session)
            .collect()
    }

    async fn mark_processing(&self, id: Uuid) -> Result<Option<Session>, sqlx::Error> {
        let query = format!(
            "UPDATE tryon_sessions
             SET status = 'processing', updated_at = $2
             WHERE id = $1 AND status = 'created'
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SessionRow>(&query)
            .bind(id.to_string())
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .map(SessionRow::into_session)
            .transpose()
    }

    async fn complete(&self, id: Uuid, output_ref: &str) -> Result<Option<Session>, sqlx::Error> {
        let query = format!(
            "UPDATE tryon_sessions
             SET status = 'completed', output_image_ref = $2, updated_at = $3
             WHERE id = $1 AND status = 'processing'
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SessionRow>(&query)
            .bind(id.to_string())
            .bind(output_ref)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .map(SessionRow::into_session)
            .transpose()
    }

    async fn fail(&self, id: Uuid, reason: &str) -> Result<Option<Session>, sqlx::Error> {
        let query = format!(
            "UPDATE tryon_sessions
             SET status = 'failed', error_reason = $2, updated_at = $3
             WHERE id = $1 AND status = 'processing'
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SessionRow>(&query)
            .bind(id.to_string())
            .bind(reason)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .map(SessionRow::into_session)
            .transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tryon_sessions WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_expired(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Session>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tryon_sessions
             WHERE expires_at < $1
             ORDER BY expires_at ASC
             LIMIT $2"
        );
        sqlx::query_as::<_, SessionRow>(&query)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(SessionRow::into_session)
            .collect()
    }
}
