//! Session status machine and failure taxonomy.
//!
//! A session moves along exactly one path:
//! `created -> processing -> {completed, failed}`. Terminal states never
//! change again; there is no retry. The store enforces the same guards in
//! SQL, so a stray out-of-order write is a no-op rather than a corruption.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a try-on session.
///
/// Serialized in lowercase both over the wire and in the `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Created,
    Processing,
    Completed,
    Failed,
}

impl SessionStatus {
    /// Lowercase form used in the database `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "created",
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    /// Parse the database representation. Unknown values are a schema bug.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(SessionStatus::Created),
            "processing" => Some(SessionStatus::Processing),
            "completed" => Some(SessionStatus::Completed),
            "failed" => Some(SessionStatus::Failed),
            _ => None,
        }
    }

    /// Whether moving from `self` to `next` follows the status machine.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Created, SessionStatus::Processing)
                | (SessionStatus::Processing, SessionStatus::Completed)
                | (SessionStatus::Processing, SessionStatus::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    /// Fixed user-facing progress line for this status.
    ///
    /// Exactly four strings exist; the message depends on nothing but the
    /// status value.
    pub fn progress_message(&self) -> &'static str {
        match self {
            SessionStatus::Created => "Session created, queued for processing…",
            SessionStatus::Processing => {
                "AI model is generating your try-on — this takes 1–2 minutes…"
            }
            SessionStatus::Completed => "Try-on completed successfully!",
            SessionStatus::Failed => "Processing failed. Please try again.",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain failure reasons the reference transform may emit.
///
/// Real transform implementations replace this set with their own, but the
/// reasons stored in `error_reason` always come from a fixed, enumerable
/// list — never free-form internal detail.
pub const DOMAIN_FAILURE_REASONS: [&str; 4] = [
    "Unable to detect person in image",
    "Image quality too low",
    "Processing timeout",
    "Invalid pose detected",
];

/// Generic reason recorded when processing fails on storage I/O. The real
/// error is logged server-side only.
pub const STORAGE_FAILURE_REASON: &str = "Internal error while saving the result";

/// Failure modes of a transform run.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// Disk or write failure while producing/saving the output. The session
    /// is failed with [`STORAGE_FAILURE_REASON`]; the detail stays in logs.
    #[error("transient storage failure: {0}")]
    Storage(String),

    /// A domain-level failure, e.g. "subject not detected". The reason is
    /// one of [`DOMAIN_FAILURE_REASONS`] and is shown to the caller.
    #[error("{0}")]
    Domain(&'static str),
}

impl TransformError {
    /// The `error_reason` value recorded for this failure.
    pub fn public_reason(&self) -> &'static str {
        match self {
            TransformError::Storage(_) => STORAGE_FAILURE_REASON,
            TransformError::Domain(reason) => reason,
        }
    }
}
