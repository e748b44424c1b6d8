//! The session store abstraction.
//!
//! Exactly one store is selected at process start (see
//! [`crate::connect_store`]); everything downstream holds it as
//! `Arc<dyn SessionStore>` and never learns which engine is behind it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::session::{NewSession, Session};

pub mod postgres;
pub mod sqlite;

/// Which persistence engine backs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Postgres,
    Sqlite,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Postgres => "postgres",
            BackendKind::Sqlite => "sqlite",
        }
    }
}

/// Row-level operations on try-on sessions.
///
/// Status transitions are guarded in SQL: `mark_processing` only matches a
/// `created` row, `complete`/`fail` only match a `processing` row. A guard
/// miss returns `Ok(None)` — callers treat that as "someone else already
/// moved this session" and do not overwrite.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The engine serving this store.
    fn backend_kind(&self) -> BackendKind;

    /// Lightweight connectivity probe for the health endpoint.
    async fn ping(&self) -> bool;

    /// Insert a new `created` row and return it.
    async fn create(&self, new: &NewSession) -> Result<Session, sqlx::Error>;

    /// Fetch a session by id.
    async fn get(&self, id: Uuid) -> Result<Option<Session>, sqlx::Error>;

    /// Most recent sessions for a user token, newest first.
    async fn list_by_user(&self, token: &str, limit: i64) -> Result<Vec<Session>, sqlx::Error>;

    /// `created -> processing`. Returns the updated row, or `None` if the
    /// session is missing or not in `created`.
    async fn mark_processing(&self, id: Uuid) -> Result<Option<Session>, sqlx::Error>;

    /// `processing -> completed`, recording the output reference. One
    /// atomic terminal write.
    async fn complete(&self, id: Uuid, output_ref: &str) -> Result<Option<Session>, sqlx::Error>;

    /// `processing -> failed`, recording the failure reason. One atomic
    /// terminal write.
    async fn fail(&self, id: Uuid, reason: &str) -> Result<Option<Session>, sqlx::Error>;

    /// Delete a row. Returns `true` if a row was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error>;

    /// Sessions whose `expires_at` is before `now`, oldest-expiring first.
    async fn list_expired(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Session>, sqlx::Error>;
}
