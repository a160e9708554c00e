//! Axum router construction.

use axum::routing::{get, post};
use axum::Router;

use crate::web::handlers;
use crate::web::state::SharedState;

/// Build the complete Axum router with all API routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        // Health
        .route("/api/health", get(handlers::health::health_handler))
        // Users API (registration collaborator write path + lookup)
        .route("/api/users", post(handlers::users::create_user_handler))
        .route("/api/users/:user_id", get(handlers::users::get_user_handler))
        // Friendship API
        .route(
            "/api/friends/request",
            post(handlers::friends::send_request_handler),
        )
        .route(
            "/api/friends/accept",
            post(handlers::friends::accept_request_handler),
        )
        .route(
            "/api/friends/reject",
            post(handlers::friends::reject_request_handler),
        )
        .route(
            "/api/friends/remove",
            post(handlers::friends::remove_friend_handler),
        )
        .route(
            "/api/friends/:user_id",
            get(handlers::friends::list_friends_handler),
        )
        .route(
            "/api/friends/:user_id/requests",
            get(handlers::friends::list_pending_handler),
        )
        .route(
            "/api/friends/:user_id/suggestions",
            get(handlers::suggestions::suggest_handler),
        )
        // Messages API
        .route(
            "/api/messages",
            post(handlers::messages::send_message_handler),
        )
        .route(
            "/api/messages/history/:user_a/:user_b",
            get(handlers::messages::history_handler),
        )
        // Conversations API
        .route(
            "/api/conversations/:user_id",
            get(handlers::conversations::list_conversations_handler),
        )
        .route(
            "/api/conversations/:user_id/:peer_id/read",
            post(handlers::conversations::mark_read_handler),
        )
        // WebSocket
        .route("/api/ws", get(handlers::websocket::ws_handler))
        .with_state(state)
}
