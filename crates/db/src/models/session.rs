//! Session entity model and DTOs.
//!
//! One table, `tryon_sessions`. The row is written by exactly three
//! actors: the lifecycle manager creates it, the processing worker moves
//! it through the status machine, and the cleanup reaper deletes it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tryon_core::session::SessionStatus;
use uuid::Uuid;

/// A row from the `tryon_sessions` table, in domain form.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub user_token: String,
    /// Relative reference to the stored user photo (`/uploads/users/...`).
    pub user_image_ref: String,
    /// Relative reference to the stored garment image.
    pub garment_image_ref: String,
    /// Set iff `status` is `completed`.
    pub output_image_ref: Option<String>,
    pub status: SessionStatus,
    /// Set iff `status` is `failed`.
    pub error_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `created_at + TTL`, fixed at creation. Past this instant the reaper
    /// may delete the row and its assets.
    pub expires_at: DateTime<Utc>,
}

/// DTO for inserting a new session.
///
/// The caller (lifecycle manager) generates the id and computes
/// `expires_at`; `created_at`/`updated_at` are set by the store.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: Uuid,
    pub user_token: String,
    pub user_image_ref: String,
    pub garment_image_ref: String,
    pub expires_at: DateTime<Utc>,
}

/// Decode a `status` column value, surfacing unknown values as a decode
/// error instead of panicking. An unknown status means the schema and the
/// code disagree.
pub(crate) fn decode_status(raw: &str) -> Result<SessionStatus, sqlx::Error> {
    SessionStatus::parse(raw)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown session status: {raw}").into()))
}
