//! Try-on session endpoints: create, poll status, full details.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tryon_core::error::CoreError;
use tryon_core::session::SessionStatus;
use tryon_core::validation::{validate_image_upload, validate_user_token};
use tryon_db::{NewSession, Session, SessionStore};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::storage::AssetRole;
use crate::worker;

/// Response for session creation.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub session_id: Uuid,
    pub status: &'static str,
    pub message: &'static str,
}

/// Response for the status poll.
#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub id: Uuid,
    pub status: SessionStatus,
    pub user_image_url: String,
    pub garment_image_url: String,
    pub output_image_url: Option<String>,
    pub error_reason: Option<String>,
    pub progress_message: &'static str,
}

impl From<Session> for SessionStatusResponse {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            status: session.status,
            user_image_url: session.user_image_ref,
            garment_image_url: session.garment_image_ref,
            output_image_url: session.output_image_ref,
            error_reason: session.error_reason,
            progress_message: session.status.progress_message(),
        }
    }
}

/// One uploaded image field, captured before validation.
struct UploadedImage {
    filename: Option<String>,
    bytes: axum::body::Bytes,
}

/// POST /api/v1/tryon/sessions
///
/// Multipart upload: `user_image` and `garment_image` files plus a
/// `user_token` text field. Everything is validated synchronously before a
/// row exists; on success the session id is handed to the worker
/// fire-and-forget and the response returns immediately.
pub async fn create_session(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let mut user_image: Option<UploadedImage> = None;
    let mut garment_image: Option<UploadedImage> = None;
    let mut user_token: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("user_image") | Some("garment_image") => {
                let image = UploadedImage {
                    filename: field.file_name().map(str::to_string),
                    bytes: field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?,
                };
                if name.as_deref() == Some("user_image") {
                    user_image = Some(image);
                } else {
                    garment_image = Some(image);
                }
            }
            Some("user_token") => {
                user_token = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?,
                );
            }
            // Unknown fields are ignored.
            _ => {}
        }
    }

    // --- Synchronous validation: nothing is persisted past this block. ---
    let token = user_token
        .ok_or_else(|| CoreError::Validation("user_token is required".into()))?;
    validate_user_token(&token)?;

    let user_image = user_image
        .ok_or_else(|| CoreError::Validation("user_image is required".into()))?;
    let garment_image = garment_image
        .ok_or_else(|| CoreError::Validation("garment_image is required".into()))?;

    let max_bytes = state.config.max_file_size_bytes();
    let user_ext =
        validate_image_upload(user_image.filename.as_deref(), &user_image.bytes, max_bytes)?;
    let garment_ext = validate_image_upload(
        garment_image.filename.as_deref(),
        &garment_image.bytes,
        max_bytes,
    )?;

    // --- Persist: tentative row first, then the assets. ---
    let session_id = Uuid::new_v4();
    let new = NewSession {
        id: session_id,
        user_token: token.clone(),
        user_image_ref: state
            .storage
            .reference_for(session_id, AssetRole::User, &user_ext),
        garment_image_ref: state.storage.reference_for(
            session_id,
            AssetRole::Garment,
            &garment_ext,
        ),
        expires_at: Utc::now() + chrono::Duration::hours(state.config.session_expiry_hours),
    };
    let session = state.store.create(&new).await?;

    let saved = async {
        state
            .storage
            .save(session_id, AssetRole::User, &user_image.bytes, &user_ext)
            .await?;
        state
            .storage
            .save(
                session_id,
                AssetRole::Garment,
                &garment_image.bytes,
                &garment_ext,
            )
            .await
    }
    .await;

    if let Err(e) = saved {
        // No orphan `created` row without backing files.
        tracing::error!(%session_id, error = %e, "Failed to store session images, rolling back row");
        state
            .storage
            .delete_session_files(&[
                Some(session.user_image_ref.as_str()),
                Some(session.garment_image_ref.as_str()),
            ])
            .await;
        if let Err(e) = state.store.delete(session_id).await {
            tracing::error!(%session_id, error = %e, "Failed to roll back session row");
        }
        return Err(AppError::InternalError(
            "Failed to store session images".into(),
        ));
    }

    worker::dispatch(state.clone(), session_id);
    tracing::info!(%session_id, user_token = %token, "Session created");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            session_id,
            status: "created",
            message: "Session created. Processing started.",
        }),
    ))
}

/// GET /api/v1/tryon/sessions/{id}
///
/// Poll the current status. The progress message is a fixed string per
/// status, independent of everything else.
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<SessionStatusResponse>> {
    let session = state
        .store
        .get(session_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "session",
            id: session_id,
        })?;
    Ok(Json(session.into()))
}

/// GET /api/v1/tryon/sessions/{id}/details
///
/// Full session row, including token and timestamps (debugging aid).
pub async fn get_session_details(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<Session>> {
    let session = state
        .store
        .get(session_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "session",
            id: session_id,
        })?;
    Ok(Json(session))
}
