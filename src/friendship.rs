//! Friendship state machine: request, accept, reject, unfriend.
//!
//! A pending request edge and a friendship between the same pair are
//! mutually exclusive; the store enforces that by running each transition
//! as one atomic unit. No notification is sent on any transition; the
//! peer observes changes by polling [`FriendshipService::list_friends`]
//! and [`FriendshipService::list_pending_requests`].

use std::sync::Arc;

use crate::error::CoreError;
use crate::logging;
use crate::retry_read;
use crate::store::{now_secs, validate_id, GraphStore, UserRecord};

#[derive(Clone)]
pub struct FriendshipService {
    store: Arc<dyn GraphStore>,
}

impl FriendshipService {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    async fn require_user(&self, id: &str) -> Result<UserRecord, CoreError> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("user {id} does not exist")))
    }

    /// Create a pending request `from -> to`.
    ///
    /// Fails `Conflict` when a friendship or a pending request already
    /// exists between the pair in either direction. Safe to retry: the
    /// store's check+create is atomic, so a retried call can only ever
    /// observe `Conflict`, never create a second pending edge.
    pub async fn send_request(&self, from: &str, to: &str) -> Result<(), CoreError> {
        validate_id(from, "user id")?;
        validate_id(to, "user id")?;
        if from == to {
            return Err(CoreError::Validation(
                "cannot send a friend request to yourself".to_string(),
            ));
        }
        self.require_user(from).await?;
        self.require_user(to).await?;

        self.store
            .create_friend_request(from, to, now_secs())
            .await?;
        crate::qlog!(
            "friends: request {} -> {}",
            logging::user_id(from),
            logging::user_id(to)
        );
        Ok(())
    }

    /// Resolve the pending request `from -> to` into a friendship.
    ///
    /// Deliberately not idempotent: a second call fails `NotFound` because
    /// the pending edge no longer exists. Callers treat that as
    /// already-applied.
    pub async fn accept_request(&self, from: &str, to: &str) -> Result<(), CoreError> {
        validate_id(from, "user id")?;
        validate_id(to, "user id")?;

        self.store.accept_friend_request(from, to, now_secs()).await?;
        crate::qlog!(
            "friends: {} accepted request from {}",
            logging::user_id(to),
            logging::user_id(from)
        );
        Ok(())
    }

    /// Delete the pending request `from -> to` if present. Idempotent:
    /// rejecting an absent request is a no-op, not an error.
    pub async fn reject_request(&self, from: &str, to: &str) -> Result<(), CoreError> {
        validate_id(from, "user id")?;
        validate_id(to, "user id")?;

        if self.store.delete_friend_request(from, to).await? {
            crate::qlog!(
                "friends: {} rejected request from {}",
                logging::user_id(to),
                logging::user_id(from)
            );
        }
        Ok(())
    }

    /// Remove the friendship between the pair; both directions go
    /// atomically. No-op if they are not friends.
    pub async fn remove_friend(&self, user: &str, friend: &str) -> Result<(), CoreError> {
        validate_id(user, "user id")?;
        validate_id(friend, "user id")?;

        if self.store.delete_friendship(user, friend).await? {
            crate::qlog!(
                "friends: {} unfriended {}",
                logging::user_id(user),
                logging::user_id(friend)
            );
        }
        Ok(())
    }

    /// All users one friendship edge from `user`, de-duplicated by id.
    pub async fn list_friends(&self, user: &str) -> Result<Vec<UserRecord>, CoreError> {
        validate_id(user, "user id")?;
        retry_read!(self.store.friends_of(user).await)
    }

    /// All users with a pending request directed at `user`.
    pub async fn list_pending_requests(&self, user: &str) -> Result<Vec<UserRecord>, CoreError> {
        validate_id(user, "user id")?;
        retry_read!(self.store.pending_requests_for(user).await)
    }
}
