//! Health check handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::web::state::SharedState;

pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "ok",
        "ws_connections": state.registry.connection_count(),
    });
    (StatusCode::OK, axum::Json(body))
}
