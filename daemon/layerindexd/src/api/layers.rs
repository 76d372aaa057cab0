use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unique: bool,
}

/// `GET /layers/{digest}`
pub async fn handle(State(state): State<AppState>, Path(digest): Path<String>) -> Response {
    match state.cache.search_layer(&digest) {
        Some(size) => Json(json!({ "layer": digest, "size": size })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": format!("Layer not in metadata cache: {}", digest), "code": "CACHE_NOT_FOUND" })),
        )
            .into_response(),
    }
}

/// `GET /layers`: one entry per (image, layer), shared layers repeated.
/// `?unique=true` lists each digest once with the bytes they add up to.
pub async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    if query.unique {
        let layers = state.cache.unique_layers();
        let total: i64 = layers.iter().map(|l| l.size_bytes).sum();
        Json(json!({ "layers": layers, "total_size": total })).into_response()
    } else {
        Json(state.cache.all_known_layers()).into_response()
    }
}
