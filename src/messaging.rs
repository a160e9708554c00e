//! Message persistence and retrieval.
//!
//! Messages are write-once edges between two user nodes. The wall-clock
//! `sent_at` is advisory; ordering is carried entirely by `epoch_ms`,
//! which this service assigns from a process-monotonic clock so that
//! wall-clock skew between service instances can never reorder a
//! conversation retroactively.

use std::sync::{Arc, Mutex};

use crate::error::CoreError;
use crate::logging;
use crate::retry_read;
use crate::store::{now_ms, now_secs, validate_id, ConversationRecord, GraphStore, MessageRecord};

/// Maximum accepted message length in bytes.
pub const MAX_CONTENT_LEN: usize = 4096;

/// Hands out strictly increasing epoch-millisecond values.
///
/// Tracks the last issued value and never repeats or goes backward, even
/// when the wall clock stalls within a millisecond or steps backward.
pub struct MonotonicMillis {
    last: Mutex<i64>,
}

impl MonotonicMillis {
    pub fn new() -> Self {
        Self { last: Mutex::new(0) }
    }

    pub fn next(&self) -> i64 {
        let now = now_ms();
        let mut last = self.last.lock().unwrap();
        *last = if now > *last { now } else { *last + 1 };
        *last
    }
}

impl Default for MonotonicMillis {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct MessagingService {
    store: Arc<dyn GraphStore>,
    clock: Arc<MonotonicMillis>,
}

impl MessagingService {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            clock: Arc::new(MonotonicMillis::new()),
        }
    }

    /// Persist one message and return it with its assigned timestamps.
    ///
    /// This is the durable write path: delivery over the push channel is
    /// layered on top by the caller, so a message sent while the channel
    /// is down still lands here and shows up on the next history fetch.
    pub async fn send(
        &self,
        from: &str,
        to: &str,
        content: &str,
    ) -> Result<MessageRecord, CoreError> {
        validate_id(from, "sender id")?;
        validate_id(to, "recipient id")?;
        if from == to {
            return Err(CoreError::Validation(
                "cannot message yourself".to_string(),
            ));
        }
        if content.trim().is_empty() {
            return Err(CoreError::Validation("content cannot be empty".to_string()));
        }
        if content.len() > MAX_CONTENT_LEN {
            return Err(CoreError::Validation(format!(
                "content exceeds {MAX_CONTENT_LEN} bytes"
            )));
        }
        for id in [from, to] {
            if self.store.get_user(id).await?.is_none() {
                return Err(CoreError::NotFound(format!("user {id} does not exist")));
            }
        }

        let msg = MessageRecord {
            sender_id: from.to_string(),
            recipient_id: to.to_string(),
            content: content.to_string(),
            sent_at: now_secs(),
            epoch_ms: self.clock.next(),
        };
        self.store.insert_message(&msg).await?;
        crate::qlog!(
            "messages: {} -> {} ({} bytes, epoch {})",
            logging::user_id(from),
            logging::user_id(to),
            msg.content.len(),
            msg.epoch_ms
        );
        Ok(msg)
    }

    /// Every message between the pair, ascending by `epoch_ms`.
    ///
    /// Re-sorted here so the ordering guarantee never depends on what the
    /// store happens to return.
    pub async fn history(&self, a: &str, b: &str) -> Result<Vec<MessageRecord>, CoreError> {
        validate_id(a, "user id")?;
        validate_id(b, "user id")?;

        let mut messages = retry_read!(self.store.messages_between(a, b).await)?;
        messages.sort_by_key(|m| m.epoch_ms);
        Ok(messages)
    }

    /// Conversation summaries for `user`: each distinct peer with the most
    /// recent message and the count of their messages newer than the
    /// persisted last-read marker.
    pub async fn conversations_for(
        &self,
        user: &str,
    ) -> Result<Vec<ConversationRecord>, CoreError> {
        validate_id(user, "user id")?;
        retry_read!(self.store.conversations_for(user).await)
    }

    /// Advance the persisted last-read marker for (`user`, `peer`) up to
    /// `up_to_epoch_ms`. The marker only ever moves forward.
    pub async fn mark_read(
        &self,
        user: &str,
        peer: &str,
        up_to_epoch_ms: i64,
    ) -> Result<(), CoreError> {
        validate_id(user, "user id")?;
        validate_id(peer, "user id")?;
        self.store.advance_last_read(user, peer, up_to_epoch_ms).await
    }
}
