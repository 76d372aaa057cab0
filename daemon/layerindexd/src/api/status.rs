use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use layerindex_sync::WatcherStatus;

/// `GET /status`: what the background watcher is doing and how fresh the index is.
pub async fn handle(State(state): State<AppState>) -> Json<WatcherStatus> {
    Json(state.status.borrow().clone())
}
