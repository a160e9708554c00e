//! Configuration types and constants for the quad-web server.

use clap::Parser;

/// Hard cap on simultaneous WebSocket connections.
pub(crate) const MAX_WS_CONNECTIONS: usize = 64;
/// Default and maximum number of friend suggestions per request.
pub(crate) const DEFAULT_SUGGESTION_LIMIT: usize = 10;
pub(crate) const MAX_SUGGESTION_LIMIT: usize = 50;

/// Web server for the quad social graph and messaging core.
///
/// Exposes the REST API and the WebSocket push channel, backed by a
/// Neo4j graph store (or an in-memory store with `--memory`).
///
/// Configuration can be set via CLI arguments or environment variables.
/// CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(name = "quad-web", version, about)]
pub struct Cli {
    /// HTTP server bind address [env: QUAD_WEB_BIND] [default: 127.0.0.1:3000]
    #[arg(long, short = 'b')]
    pub bind: Option<String>,

    /// Bolt URI of the graph database [env: QUAD_NEO4J_URI] [default: 127.0.0.1:7687]
    #[arg(long)]
    pub neo4j_uri: Option<String>,

    /// Graph database user [env: QUAD_NEO4J_USER] [default: neo4j]
    #[arg(long)]
    pub neo4j_user: Option<String>,

    /// Graph database password [env: QUAD_NEO4J_PASS]
    #[arg(long)]
    pub neo4j_pass: Option<String>,

    /// Use a volatile in-memory store instead of a graph database
    #[arg(long)]
    pub memory: bool,
}

pub struct Config {
    pub bind_addr: String,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_pass: String,
    pub memory: bool,
}

impl Config {
    pub fn from_cli_and_env(cli: Cli) -> Self {
        let bind_addr = cli
            .bind
            .or_else(|| std::env::var("QUAD_WEB_BIND").ok())
            .unwrap_or_else(|| "127.0.0.1:3000".to_string());

        let neo4j_uri = cli
            .neo4j_uri
            .or_else(|| std::env::var("QUAD_NEO4J_URI").ok())
            .unwrap_or_else(|| "127.0.0.1:7687".to_string());

        let neo4j_user = cli
            .neo4j_user
            .or_else(|| std::env::var("QUAD_NEO4J_USER").ok())
            .unwrap_or_else(|| "neo4j".to_string());

        let neo4j_pass = cli
            .neo4j_pass
            .or_else(|| std::env::var("QUAD_NEO4J_PASS").ok())
            .unwrap_or_default();

        Self {
            bind_addr,
            neo4j_uri,
            neo4j_user,
            neo4j_pass,
            memory: cli.memory,
        }
    }
}
