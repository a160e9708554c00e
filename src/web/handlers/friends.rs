//! Friendship state-machine handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::web::state::SharedState;
use crate::web::utils::{error_response, user_to_json};

#[derive(Deserialize)]
pub struct RequestPairPayload {
    pub from_id: String,
    pub to_id: String,
}

#[derive(Deserialize)]
pub struct RemoveFriendPayload {
    pub user_id: String,
    pub friend_id: String,
}

fn ok() -> Response {
    (StatusCode::OK, axum::Json(serde_json::json!({"ok": true}))).into_response()
}

pub async fn send_request_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<RequestPairPayload>,
) -> Response {
    match state.friendship.send_request(&req.from_id, &req.to_id).await {
        Ok(()) => ok(),
        Err(e) => error_response(e),
    }
}

pub async fn accept_request_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<RequestPairPayload>,
) -> Response {
    match state
        .friendship
        .accept_request(&req.from_id, &req.to_id)
        .await
    {
        Ok(()) => ok(),
        Err(e) => error_response(e),
    }
}

pub async fn reject_request_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<RequestPairPayload>,
) -> Response {
    match state
        .friendship
        .reject_request(&req.from_id, &req.to_id)
        .await
    {
        Ok(()) => ok(),
        Err(e) => error_response(e),
    }
}

pub async fn remove_friend_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<RemoveFriendPayload>,
) -> Response {
    match state
        .friendship
        .remove_friend(&req.user_id, &req.friend_id)
        .await
    {
        Ok(()) => ok(),
        Err(e) => error_response(e),
    }
}

pub async fn list_friends_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Response {
    match state.friendship.list_friends(&user_id).await {
        Ok(friends) => {
            let json: Vec<serde_json::Value> = friends.iter().map(user_to_json).collect();
            (StatusCode::OK, axum::Json(serde_json::json!(json))).into_response()
        }
        Err(e) => error_response(e),
    }
}

pub async fn list_pending_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Response {
    match state.friendship.list_pending_requests(&user_id).await {
        Ok(requesters) => {
            let json: Vec<serde_json::Value> = requesters.iter().map(user_to_json).collect();
            (StatusCode::OK, axum::Json(serde_json::json!(json))).into_response()
        }
        Err(e) => error_response(e),
    }
}
