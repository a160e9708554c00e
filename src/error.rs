//! Error types shared by the graph store and the services built on it.

/// Error kinds surfaced by every service operation.
///
/// `Validation` and `NotFound` are terminal and returned to the caller
/// as-is.  `Conflict` is surfaced but callers may treat it as
/// already-in-desired-state where that is semantically equivalent.
/// `Transient` covers store connectivity/timeout failures; read paths
/// retry these with backoff, non-idempotent writes never do.
#[derive(Debug)]
pub enum CoreError {
    Validation(String),
    NotFound(String),
    Conflict(String),
    Transient(String),
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::Validation(msg) => write!(f, "validation error: {msg}"),
            CoreError::NotFound(msg) => write!(f, "not found: {msg}"),
            CoreError::Conflict(msg) => write!(f, "conflict: {msg}"),
            CoreError::Transient(msg) => write!(f, "transient store error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<neo4rs::Error> for CoreError {
    fn from(e: neo4rs::Error) -> Self {
        CoreError::Transient(e.to_string())
    }
}
