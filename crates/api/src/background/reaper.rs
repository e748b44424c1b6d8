//! Periodic cleanup of expired sessions and their assets.
//!
//! Runs on a fixed interval. Each sweep deletes expired rows and every
//! asset they reference, best-effort per session: one bad file does not
//! abort the batch, and a crash mid-sweep is safe because the next sweep
//! simply skips whatever is already gone.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tryon_core::session::SessionStatus;
use tryon_db::SessionStore;

use crate::storage::StorageService;

/// How many expired sessions one sweep will handle.
const SWEEP_BATCH_SIZE: i64 = 100;

/// Outcome of one sweep, for logging and tests.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub deleted: usize,
    /// Expired but still `processing`; deferred to a later sweep so the
    /// reaper never races a worker that is mid-transform.
    pub skipped_processing: usize,
    pub errors: usize,
}

/// Run the cleanup loop until `cancel` is triggered.
pub async fn run(
    store: Arc<dyn SessionStore>,
    storage: Arc<StorageService>,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Cleanup reaper started");
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; skip it so a sweep never races
    // startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Cleanup reaper stopping");
                break;
            }
            _ = ticker.tick() => {
                let stats = sweep(store.as_ref(), &storage).await;
                if stats.deleted > 0 || stats.errors > 0 {
                    tracing::info!(
                        deleted = stats.deleted,
                        skipped_processing = stats.skipped_processing,
                        errors = stats.errors,
                        "Cleanup sweep finished"
                    );
                }
            }
        }
    }
}

/// One sweep: delete every expired session (files first, then the row).
///
/// Sessions still `processing` are skipped — their TTL (hours) dwarfs
/// processing latency (seconds), so they will be terminal well before the
/// next sweep. Idempotent: running twice over the same set is a no-op the
/// second time.
pub async fn sweep(store: &dyn SessionStore, storage: &StorageService) -> SweepStats {
    let mut stats = SweepStats::default();

    let expired = match store.list_expired(Utc::now(), SWEEP_BATCH_SIZE).await {
        Ok(sessions) => sessions,
        Err(e) => {
            tracing::error!(error = %e, "Cleanup sweep could not query expired sessions");
            stats.errors += 1;
            return stats;
        }
    };

    for session in expired {
        if session.status == SessionStatus::Processing {
            tracing::debug!(session_id = %session.id, "Expired session still processing, deferred");
            stats.skipped_processing += 1;
            continue;
        }

        storage
            .delete_session_files(&[
                Some(session.user_image_ref.as_str()),
                Some(session.garment_image_ref.as_str()),
                session.output_image_ref.as_deref(),
            ])
            .await;

        match store.delete(session.id).await {
            Ok(true) => {
                tracing::info!(session_id = %session.id, "Expired session deleted");
                stats.deleted += 1;
            }
            // Already gone, e.g. a concurrent sweep got there first.
            Ok(false) => {}
            Err(e) => {
                tracing::error!(session_id = %session.id, error = %e, "Failed to delete expired session");
                stats.errors += 1;
            }
        }
    }

    stats
}
