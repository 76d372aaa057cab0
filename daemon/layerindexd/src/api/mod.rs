pub mod images;
pub mod layers;
pub mod middleware;
pub mod status;

use crate::state::AppState;
use axum::{http::StatusCode, response::IntoResponse, response::Response, routing::get, Json, Router};
use layerindex_common::diagnostic::Error;
use layerindex_domain::image::ReferenceError;
use layerindex_sync::CacheError;
use serde_json::json;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/images/*reference", get(images::handle))
        .route("/layers", get(layers::list))
        .route("/layers/:digest", get(layers::handle))
        .route("/status", get(status::handle))
        .layer(axum::middleware::from_fn(middleware::trace_request))
        .with_state(state)
}

pub(crate) fn error_response(err: &Error) -> Response {
    let status = match err.code() {
        CacheError::NOT_FOUND => StatusCode::NOT_FOUND,
        _ if err.downcast_ref::<ReferenceError>().is_some() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = json!({
        "message": err.message(),
        "code": err.code(),
        "suggestion": err.suggestion(),
    });
    (status, Json(body)).into_response()
}
