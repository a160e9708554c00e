//! Conversation listing and read-marker handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::store::now_ms;
use crate::web::state::SharedState;
use crate::web::utils::{conversation_to_json, error_response};

pub async fn list_conversations_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Response {
    match state.messaging.conversations_for(&user_id).await {
        Ok(conversations) => {
            let json: Vec<serde_json::Value> =
                conversations.iter().map(conversation_to_json).collect();
            (StatusCode::OK, axum::Json(serde_json::json!(json))).into_response()
        }
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize, Default)]
pub struct MarkReadPayload {
    /// Advance the marker up to this point; defaults to now.
    pub up_to_epoch_ms: Option<i64>,
}

pub async fn mark_read_handler(
    State(state): State<SharedState>,
    Path((user_id, peer_id)): Path<(String, String)>,
    payload: Option<axum::Json<MarkReadPayload>>,
) -> Response {
    let up_to = payload
        .and_then(|axum::Json(p)| p.up_to_epoch_ms)
        .unwrap_or_else(now_ms);

    match state.messaging.mark_read(&user_id, &peer_id, up_to).await {
        Ok(()) => (StatusCode::OK, axum::Json(serde_json::json!({"ok": true}))).into_response(),
        Err(e) => error_response(e),
    }
}
