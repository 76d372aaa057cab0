use super::error_response;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

/// `GET /images/{reference}`; the reference may carry host and namespace.
pub async fn handle(State(state): State<AppState>, Path(reference): Path<String>) -> Response {
    let reference = reference.trim_start_matches('/');
    match state.cache.search(reference) {
        Ok(metadata) => Json(metadata).into_response(),
        Err(e) => {
            tracing::debug!(reference, error = %e, "Image lookup failed");
            error_response(&e)
        }
    }
}
