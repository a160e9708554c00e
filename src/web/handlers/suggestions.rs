//! Friend suggestion handler.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::web::config::{DEFAULT_SUGGESTION_LIMIT, MAX_SUGGESTION_LIMIT};
use crate::web::state::SharedState;
use crate::web::utils::{candidate_to_json, error_response};

#[derive(Deserialize)]
pub struct SuggestQuery {
    limit: Option<usize>,
}

pub async fn suggest_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    Query(params): Query<SuggestQuery>,
) -> Response {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SUGGESTION_LIMIT)
        .min(MAX_SUGGESTION_LIMIT);

    match state.suggestions.suggest(&user_id, limit).await {
        Ok(candidates) => {
            let json: Vec<serde_json::Value> = candidates.iter().map(candidate_to_json).collect();
            (StatusCode::OK, axum::Json(serde_json::json!(json))).into_response()
        }
        Err(e) => error_response(e),
    }
}
