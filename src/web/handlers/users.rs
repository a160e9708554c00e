//! User node handlers: the registration collaborator's write path and a
//! plain lookup.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::store::{validate_id, UserRecord};
use crate::web::state::SharedState;
use crate::web::utils::{api_error, error_response, user_to_json};

#[derive(Deserialize)]
pub struct CreateUserPayload {
    pub id: String,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub status: String,
}

pub async fn create_user_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<CreateUserPayload>,
) -> Response {
    if let Err(e) = validate_id(&req.id, "user id") {
        return error_response(e);
    }
    if req.username.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "username cannot be empty");
    }

    let user = UserRecord {
        id: req.id,
        name: req.name,
        username: req.username,
        avatar: req.avatar,
        status: req.status,
    };
    match state.store.create_user(&user).await {
        Ok(()) => (StatusCode::CREATED, axum::Json(user_to_json(&user))).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_user_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Response {
    match state.store.get_user(&user_id).await {
        Ok(Some(user)) => (StatusCode::OK, axum::Json(user_to_json(&user))).into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "user not found"),
        Err(e) => error_response(e),
    }
}
