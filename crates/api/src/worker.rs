//! The session processing worker.
//!
//! One invocation per session, dispatched fire-and-forget at creation
//! time. Drives the row through `created -> processing -> terminal` with
//! guarded writes; the transform itself is pluggable. There is no retry —
//! a failed session stays failed and the caller creates a new one.

use tryon_core::session::TransformError;
use tryon_db::SessionStore;
use uuid::Uuid;

use crate::state::AppState;
use crate::storage::AssetRole;
use crate::transform::{Transform, TransformInput};

/// Dispatch a session to the worker. The join handle is intentionally
/// discarded: the create request must not wait on processing, and the
/// caller observes the outcome only by polling.
pub fn dispatch(state: AppState, session_id: Uuid) {
    tokio::spawn(process_session(state, session_id));
}

/// Process one session to its terminal state.
///
/// Concurrency is bounded by the state's semaphore; the permit is held for
/// the whole run, so at most `max_concurrent_sessions` transforms are in
/// flight. All errors end in the row, in logs, or both — this function
/// never propagates.
pub async fn process_session(state: AppState, session_id: Uuid) {
    let _permit = match state.worker_permits.clone().acquire_owned().await {
        Ok(permit) => permit,
        // Only happens at shutdown, when the semaphore is closed.
        Err(_) => return,
    };

    let session = match state.store.mark_processing(session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            tracing::warn!(%session_id, "Session not in created state, skipping dispatch");
            return;
        }
        Err(e) => {
            tracing::error!(%session_id, error = %e, "Failed to mark session processing");
            return;
        }
    };
    tracing::info!(%session_id, "Session processing started");

    let (user_path, garment_path) = match (
        state.storage.resolve(&session.user_image_ref),
        state.storage.resolve(&session.garment_image_ref),
    ) {
        (Some(user), Some(garment)) => (user, garment),
        _ => {
            fail(&state, session_id, TransformError::Storage("input asset reference does not resolve".into())).await;
            return;
        }
    };

    let result = state
        .transform
        .run(TransformInput {
            session_id,
            user_image: &user_path,
            garment_image: &garment_path,
        })
        .await;

    match result {
        Ok(output) => {
            let saved = state
                .storage
                .save(session_id, AssetRole::Output, &output.bytes, &output.ext)
                .await;
            match saved {
                Ok(output_ref) => complete(&state, session_id, &output_ref).await,
                Err(e) => {
                    fail(&state, session_id, TransformError::Storage(format!("saving output: {e}"))).await;
                }
            }
        }
        Err(e) => fail(&state, session_id, e).await,
    }
}

/// Terminal success: one atomic write of status + output reference.
async fn complete(state: &AppState, session_id: Uuid, output_ref: &str) {
    match state.store.complete(session_id, output_ref).await {
        Ok(Some(_)) => tracing::info!(%session_id, output_ref, "Session completed"),
        Ok(None) => {
            tracing::warn!(%session_id, "Session no longer processing, completion dropped");
        }
        Err(e) => tracing::error!(%session_id, error = %e, "Failed to write completion"),
    }
}

/// Terminal failure: record the public reason; storage detail stays in
/// the logs only.
async fn fail(state: &AppState, session_id: Uuid, error: TransformError) {
    match &error {
        TransformError::Storage(detail) => {
            tracing::error!(%session_id, %detail, "Transform failed on storage");
        }
        TransformError::Domain(reason) => {
            tracing::warn!(%session_id, %reason, "Transform failed");
        }
    }

    match state.store.fail(session_id, error.public_reason()).await {
        Ok(Some(_)) => {}
        Ok(None) => tracing::warn!(%session_id, "Session no longer processing, failure dropped"),
        Err(e) => tracing::error!(%session_id, error = %e, "Failed to write failure"),
    }
}
