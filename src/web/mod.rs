//! quad-web: HTTP + WebSocket surface over the graph core.
//!
//! Exposes the friendship, suggestion, messaging, and conversation
//! operations as a JSON API, plus the per-user-room push channel.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod utils;

use std::sync::Arc;

use clap::Parser;

use crate::store::memory::MemoryStore;
use crate::store::neo4j::Neo4jStore;
use crate::store::GraphStore;

use config::{Cli, Config};
use state::{AppState, SharedState};

/// Entry point: parse CLI, connect the store, start the server.
pub async fn run() {
    let cli = Cli::parse();
    let config = Config::from_cli_and_env(cli);

    crate::logging::init();

    crate::qlog!("quad-web starting");

    let store: Arc<dyn GraphStore> = if config.memory {
        crate::qlog!("  store: in-memory (volatile, for development and tests)");
        Arc::new(MemoryStore::new())
    } else {
        crate::qlog!("  store: neo4j at {}", config.neo4j_uri);
        let store = Neo4jStore::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_pass)
            .await
            .expect("failed to connect to graph store");
        Arc::new(store)
    };

    let state: SharedState = Arc::new(AppState::new(store));
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    crate::qlog!("quad-web listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await.expect("server error");
}
