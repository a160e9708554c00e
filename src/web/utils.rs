//! Shared utility functions for the web layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::CoreError;
use crate::store::{ConversationRecord, MessageRecord, SuggestionCandidate, UserRecord};

/// Build a standard JSON error response.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    (status, axum::Json(body)).into_response()
}

/// Map a service error onto the HTTP surface.
///
/// `Conflict` keeps its "already ..." phrasing so callers can present it
/// as already-in-desired-state.
pub fn error_response(err: CoreError) -> Response {
    let status = match &err {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Conflict(_) => StatusCode::CONFLICT,
        CoreError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    api_error(status, err.to_string())
}

pub fn user_to_json(u: &UserRecord) -> serde_json::Value {
    serde_json::json!({
        "id": u.id,
        "name": u.name,
        "username": u.username,
        "avatar": u.avatar,
        "status": u.status,
    })
}

pub fn message_to_json(m: &MessageRecord) -> serde_json::Value {
    serde_json::json!({
        "sender_id": m.sender_id,
        "recipient_id": m.recipient_id,
        "content": m.content,
        "sent_at": m.sent_at,
        "epoch_ms": m.epoch_ms,
    })
}

pub fn conversation_to_json(c: &ConversationRecord) -> serde_json::Value {
    serde_json::json!({
        "peer": user_to_json(&c.peer),
        "last_message": message_to_json(&c.last_message),
        "unread_count": c.unread_count,
    })
}

pub fn candidate_to_json(s: &SuggestionCandidate) -> serde_json::Value {
    serde_json::json!({
        "user": user_to_json(&s.user),
        "mutual_friends": s.mutual_friends,
    })
}
