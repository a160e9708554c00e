//! Graph store boundary: typed result records and the [`GraphStore`] trait.
//!
//! Every method on the trait corresponds to one parametrized graph query
//! (pattern match, create, or merge) and is the smallest atomic unit that
//! preserves the relationship invariants: the pending-request existence
//! check and its create run as one statement, accept deletes the pending
//! edge and creates both friendship directions in one statement, and
//! unfriend removes both directions in one statement.
//!
//! Two implementations exist: [`neo4j::Neo4jStore`] speaking Cypher over
//! Bolt, and [`memory::MemoryStore`] for tests and database-less runs.

pub mod memory;
pub mod neo4j;

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Attempts made for retryable read operations before giving up.
pub const READ_RETRIES: u32 = 3;
/// Base delay for read-retry backoff; doubled per attempt.
pub const RETRY_BASE_MS: u64 = 50;

/// A user node as returned by graph queries.
///
/// Users are created by registration, which lives outside this core; the
/// store exposes [`GraphStore::create_user`] as the write path for that
/// collaborator. `avatar` and `status` may be empty. `status` is a coarse
/// presence hint and never authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub username: String,
    pub avatar: String,
    pub status: String,
}

/// A message edge between two user nodes.
///
/// `sent_at` is advisory wall-clock seconds; `epoch_ms` is the
/// authoritative sort key and is assigned monotonically per process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub sent_at: i64,
    pub epoch_ms: i64,
}

/// One entry in a user's conversation list: the peer, the most recent
/// message exchanged with them, and how many of their messages are newer
/// than the persisted last-read marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub peer: UserRecord,
    pub last_message: MessageRecord,
    pub unread_count: u32,
}

/// A ranked friend suggestion. Ephemeral; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionCandidate {
    pub user: UserRecord,
    pub mutual_friends: u32,
}

/// Reject empty or whitespace-containing ids before they reach a query.
pub fn validate_id(id: &str, what: &str) -> Result<(), CoreError> {
    if id.is_empty() || id.chars().any(char::is_whitespace) {
        return Err(CoreError::Validation(format!("malformed {what}: {id:?}")));
    }
    Ok(())
}

/// Current time as seconds since UNIX epoch.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Current time as milliseconds since UNIX epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Retry a read-only store call on `Transient` errors with doubling
/// backoff.  Write operations must not go through this: they are not
/// provably idempotent and blind retries can create duplicate edges.
///
/// ```ignore
/// let friends = retry_read!(self.store.friends_of(user).await)?;
/// ```
#[macro_export]
macro_rules! retry_read {
    ($call:expr) => {{
        let mut attempt: u32 = 0;
        loop {
            match $call {
                Err($crate::error::CoreError::Transient(e))
                    if attempt + 1 < $crate::store::READ_RETRIES =>
                {
                    attempt += 1;
                    let delay = $crate::store::RETRY_BASE_MS << attempt;
                    $crate::qlog!(
                        "store: transient error (attempt {attempt}), retrying in {delay}ms: {e}"
                    );
                    ::tokio::time::sleep(::std::time::Duration::from_millis(delay)).await;
                }
                other => break other,
            }
        }
    }};
}

/// Parametrized graph queries against the property graph.
///
/// All id arguments are assumed pre-validated by the services; the store
/// guarantees atomicity and the edge-kind invariants, nothing more.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create a user node. Fails `Conflict` when the id or username is
    /// already taken.
    async fn create_user(&self, user: &UserRecord) -> Result<(), CoreError>;

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, CoreError>;

    /// Create a pending friend-request edge `from -> to`.
    ///
    /// The existence check (no friendship and no pending request between
    /// the pair, in either direction) and the create are one atomic unit,
    /// so a concurrent or retried call can never produce a second pending
    /// edge for the same pair. Fails `Conflict` when the check rejects.
    async fn create_friend_request(
        &self,
        from: &str,
        to: &str,
        created_at: i64,
    ) -> Result<(), CoreError>;

    /// Atomically delete the pending request `from -> to` and create both
    /// directions of the friendship. Fails `NotFound` when no such pending
    /// request exists.
    async fn accept_friend_request(
        &self,
        from: &str,
        to: &str,
        since: i64,
    ) -> Result<(), CoreError>;

    /// Delete the pending request `from -> to`. Returns whether an edge
    /// was actually removed.
    async fn delete_friend_request(&self, from: &str, to: &str) -> Result<bool, CoreError>;

    /// Delete both directions of the friendship between the pair in one
    /// atomic unit. Returns whether any edge was removed.
    async fn delete_friendship(&self, a: &str, b: &str) -> Result<bool, CoreError>;

    /// Users one friendship edge away, de-duplicated by id.
    async fn friends_of(&self, user: &str) -> Result<Vec<UserRecord>, CoreError>;

    /// Users with a pending request edge directed at `user`.
    async fn pending_requests_for(&self, user: &str) -> Result<Vec<UserRecord>, CoreError>;

    /// Ids of users with a pending request to or from `user`.
    async fn pending_peer_ids(&self, user: &str) -> Result<Vec<String>, CoreError>;

    /// Users at friendship distance exactly two from `user`.
    async fn friends_of_friends(&self, user: &str) -> Result<Vec<UserRecord>, CoreError>;

    /// For each candidate id, the number of users friendship-adjacent to
    /// both `user` and the candidate. Candidates with zero mutual friends
    /// may be absent from the map.
    async fn mutual_friend_counts(
        &self,
        user: &str,
        candidates: &[String],
    ) -> Result<HashMap<String, u32>, CoreError>;

    /// Merge an enrollment edge `user -> course`. Idempotent.
    async fn enroll(&self, user: &str, course: &str) -> Result<(), CoreError>;

    async fn is_enrolled(&self, user: &str, course: &str) -> Result<bool, CoreError>;

    /// Users sharing at least one course enrollment with `user`.
    async fn shared_enrollment_peers(&self, user: &str) -> Result<Vec<UserRecord>, CoreError>;

    /// Append a message edge. Messages are write-once; there is no update
    /// or delete path.
    async fn insert_message(&self, msg: &MessageRecord) -> Result<(), CoreError>;

    /// Every message between the pair, both directions, ascending by
    /// `epoch_ms`.
    async fn messages_between(&self, a: &str, b: &str) -> Result<Vec<MessageRecord>, CoreError>;

    /// Conversation summaries for `user`, most recent first.
    async fn conversations_for(&self, user: &str)
        -> Result<Vec<ConversationRecord>, CoreError>;

    /// Merge the last-read marker `user -> peer` forward to `epoch_ms`.
    /// Never moves the marker backward.
    async fn advance_last_read(
        &self,
        user: &str,
        peer: &str,
        epoch_ms: i64,
    ) -> Result<(), CoreError>;

    async fn last_read(&self, user: &str, peer: &str) -> Result<Option<i64>, CoreError>;
}
