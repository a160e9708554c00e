//! Message send and history handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::realtime::ServerEvent;
use crate::web::state::SharedState;
use crate::web::utils::{error_response, message_to_json};

#[derive(Deserialize)]
pub struct SendMessagePayload {
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
}

/// Durably persist a message, then push it into the recipient's room.
///
/// The push is best-effort on top of the durable write: if the recipient
/// holds no live connection the message is simply picked up by their next
/// history fetch. Nothing is pushed to the sender, whose client already
/// rendered the local echo.
pub async fn send_message_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<SendMessagePayload>,
) -> Response {
    match state
        .messaging
        .send(&req.sender_id, &req.recipient_id, &req.content)
        .await
    {
        Ok(message) => {
            state.registry.route_to(
                &message.recipient_id,
                ServerEvent::ReceiveMessage {
                    message: message.clone(),
                },
            );
            (StatusCode::CREATED, axum::Json(message_to_json(&message))).into_response()
        }
        Err(e) => error_response(e),
    }
}

pub async fn history_handler(
    State(state): State<SharedState>,
    Path((user_a, user_b)): Path<(String, String)>,
) -> Response {
    match state.messaging.history(&user_a, &user_b).await {
        Ok(messages) => {
            let json: Vec<serde_json::Value> = messages.iter().map(message_to_json).collect();
            (StatusCode::OK, axum::Json(serde_json::json!(json))).into_response()
        }
        Err(e) => error_response(e),
    }
}
