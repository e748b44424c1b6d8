use axum::routing::{get, post};
use axum::Router;

use crate::handlers::tryon;
use crate::state::AppState;

/// Try-on session routes, mounted under `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tryon/sessions", post(tryon::create_session))
        .route("/tryon/sessions/{session_id}", get(tryon::get_session_status))
        .route(
            "/tryon/sessions/{session_id}/details",
            get(tryon::get_session_details),
        )
}
