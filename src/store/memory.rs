//! In-memory [`GraphStore`] implementation over `RwLock`ed collections.
//!
//! Backs the test suite and the server's `--memory` mode, where the
//! process runs without a graph database and all state is volatile.
//!
//! Lock discipline: when two collections must be held together to keep a
//! mutation atomic (`requests` and `friendships`), they are always taken
//! in that order. Everything else takes one lock at a time and copies out.

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::store::{ConversationRecord, GraphStore, MessageRecord, UserRecord};

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserRecord>>,
    /// Pending request edges as ordered (from, to) pairs.
    requests: RwLock<HashSet<(String, String)>>,
    /// Friendship edges; both directions are stored.
    friendships: RwLock<HashSet<(String, String)>>,
    /// Course code -> enrolled user ids.
    enrollments: RwLock<HashMap<String, HashSet<String>>>,
    messages: RwLock<Vec<MessageRecord>>,
    /// (user, peer) -> last-read epoch_ms.
    read_marks: RwLock<HashMap<(String, String), i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn users_by_ids(&self, ids: &BTreeSet<String>) -> Vec<UserRecord> {
        let users = self.users.read().await;
        ids.iter().filter_map(|id| users.get(id).cloned()).collect()
    }

    async fn friend_ids(&self, user: &str) -> BTreeSet<String> {
        let friendships = self.friendships.read().await;
        friendships
            .iter()
            .filter(|(a, _)| a == user)
            .map(|(_, b)| b.clone())
            .collect()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn create_user(&self, user: &UserRecord) -> Result<(), CoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(CoreError::Conflict(format!(
                "user {} already exists",
                user.id
            )));
        }
        if users.values().any(|u| u.username == user.username) {
            return Err(CoreError::Conflict(format!(
                "username {} already taken",
                user.username
            )));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, CoreError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn create_friend_request(
        &self,
        from: &str,
        to: &str,
        _created_at: i64,
    ) -> Result<(), CoreError> {
        // Both locks held so the existence check and the insert are one
        // atomic unit; a concurrent call for the same pair serializes here.
        let mut requests = self.requests.write().await;
        let friendships = self.friendships.read().await;

        if friendships.contains(&(from.to_string(), to.to_string()))
            || friendships.contains(&(to.to_string(), from.to_string()))
        {
            return Err(CoreError::Conflict(format!(
                "{from} and {to} are already friends"
            )));
        }
        if requests.contains(&(from.to_string(), to.to_string()))
            || requests.contains(&(to.to_string(), from.to_string()))
        {
            return Err(CoreError::Conflict(format!(
                "a friend request between {from} and {to} is already pending"
            )));
        }
        requests.insert((from.to_string(), to.to_string()));
        Ok(())
    }

    async fn accept_friend_request(
        &self,
        from: &str,
        to: &str,
        _since: i64,
    ) -> Result<(), CoreError> {
        let mut requests = self.requests.write().await;
        let mut friendships = self.friendships.write().await;

        if !requests.remove(&(from.to_string(), to.to_string())) {
            return Err(CoreError::NotFound(format!(
                "no pending friend request from {from} to {to}"
            )));
        }
        friendships.insert((from.to_string(), to.to_string()));
        friendships.insert((to.to_string(), from.to_string()));
        Ok(())
    }

    async fn delete_friend_request(&self, from: &str, to: &str) -> Result<bool, CoreError> {
        let mut requests = self.requests.write().await;
        Ok(requests.remove(&(from.to_string(), to.to_string())))
    }

    async fn delete_friendship(&self, a: &str, b: &str) -> Result<bool, CoreError> {
        let mut friendships = self.friendships.write().await;
        let fwd = friendships.remove(&(a.to_string(), b.to_string()));
        let rev = friendships.remove(&(b.to_string(), a.to_string()));
        Ok(fwd || rev)
    }

    async fn friends_of(&self, user: &str) -> Result<Vec<UserRecord>, CoreError> {
        let ids = self.friend_ids(user).await;
        Ok(self.users_by_ids(&ids).await)
    }

    async fn pending_requests_for(&self, user: &str) -> Result<Vec<UserRecord>, CoreError> {
        let ids: BTreeSet<String> = {
            let requests = self.requests.read().await;
            requests
                .iter()
                .filter(|(_, to)| to == user)
                .map(|(from, _)| from.clone())
                .collect()
        };
        Ok(self.users_by_ids(&ids).await)
    }

    async fn pending_peer_ids(&self, user: &str) -> Result<Vec<String>, CoreError> {
        let requests = self.requests.read().await;
        let ids: BTreeSet<String> = requests
            .iter()
            .filter_map(|(from, to)| {
                if from == user {
                    Some(to.clone())
                } else if to == user {
                    Some(from.clone())
                } else {
                    None
                }
            })
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn friends_of_friends(&self, user: &str) -> Result<Vec<UserRecord>, CoreError> {
        let direct = self.friend_ids(user).await;
        let mut two_hop = BTreeSet::new();
        {
            let friendships = self.friendships.read().await;
            for f in &direct {
                for (a, b) in friendships.iter() {
                    if a == f && b != user && !direct.contains(b) {
                        two_hop.insert(b.clone());
                    }
                }
            }
        }
        Ok(self.users_by_ids(&two_hop).await)
    }

    async fn mutual_friend_counts(
        &self,
        user: &str,
        candidates: &[String],
    ) -> Result<HashMap<String, u32>, CoreError> {
        let mine = self.friend_ids(user).await;
        let mut counts = HashMap::new();
        for candidate in candidates {
            let theirs = self.friend_ids(candidate).await;
            let mutual = mine.intersection(&theirs).count() as u32;
            if mutual > 0 {
                counts.insert(candidate.clone(), mutual);
            }
        }
        Ok(counts)
    }

    async fn enroll(&self, user: &str, course: &str) -> Result<(), CoreError> {
        let known = self.users.read().await.contains_key(user);
        if !known {
            return Err(CoreError::NotFound(format!("user {user} does not exist")));
        }
        let mut enrollments = self.enrollments.write().await;
        enrollments
            .entry(course.to_string())
            .or_default()
            .insert(user.to_string());
        Ok(())
    }

    async fn is_enrolled(&self, user: &str, course: &str) -> Result<bool, CoreError> {
        let enrollments = self.enrollments.read().await;
        Ok(enrollments
            .get(course)
            .is_some_and(|members| members.contains(user)))
    }

    async fn shared_enrollment_peers(&self, user: &str) -> Result<Vec<UserRecord>, CoreError> {
        let ids: BTreeSet<String> = {
            let enrollments = self.enrollments.read().await;
            enrollments
                .values()
                .filter(|members| members.contains(user))
                .flat_map(|members| members.iter().cloned())
                .filter(|id| id != user)
                .collect()
        };
        Ok(self.users_by_ids(&ids).await)
    }

    async fn insert_message(&self, msg: &MessageRecord) -> Result<(), CoreError> {
        {
            let users = self.users.read().await;
            for id in [&msg.sender_id, &msg.recipient_id] {
                if !users.contains_key(id.as_str()) {
                    return Err(CoreError::NotFound(format!("user {id} does not exist")));
                }
            }
        }
        self.messages.write().await.push(msg.clone());
        Ok(())
    }

    async fn messages_between(&self, a: &str, b: &str) -> Result<Vec<MessageRecord>, CoreError> {
        let mut msgs: Vec<MessageRecord> = {
            let messages = self.messages.read().await;
            messages
                .iter()
                .filter(|m| {
                    (m.sender_id == a && m.recipient_id == b)
                        || (m.sender_id == b && m.recipient_id == a)
                })
                .cloned()
                .collect()
        };
        msgs.sort_by_key(|m| m.epoch_ms);
        Ok(msgs)
    }

    async fn conversations_for(
        &self,
        user: &str,
    ) -> Result<Vec<ConversationRecord>, CoreError> {
        let mut by_peer: HashMap<String, Vec<MessageRecord>> = HashMap::new();
        {
            let messages = self.messages.read().await;
            for m in messages.iter() {
                let peer = if m.sender_id == user {
                    &m.recipient_id
                } else if m.recipient_id == user {
                    &m.sender_id
                } else {
                    continue;
                };
                by_peer.entry(peer.clone()).or_default().push(m.clone());
            }
        }

        let marks = self.read_marks.read().await.clone();
        let users = self.users.read().await;

        let mut result = Vec::new();
        for (peer_id, mut msgs) in by_peer {
            let Some(peer) = users.get(&peer_id).cloned() else {
                continue;
            };
            msgs.sort_by_key(|m| m.epoch_ms);
            let Some(last_message) = msgs.last().cloned() else {
                continue;
            };
            let read_ms = marks
                .get(&(user.to_string(), peer_id.clone()))
                .copied()
                .unwrap_or(0);
            let unread_count = msgs
                .iter()
                .filter(|m| m.sender_id == peer_id && m.epoch_ms > read_ms)
                .count() as u32;
            result.push(ConversationRecord {
                peer,
                last_message,
                unread_count,
            });
        }
        result.sort_by_key(|c| std::cmp::Reverse(c.last_message.epoch_ms));
        Ok(result)
    }

    async fn advance_last_read(
        &self,
        user: &str,
        peer: &str,
        epoch_ms: i64,
    ) -> Result<(), CoreError> {
        let mut marks = self.read_marks.write().await;
        let entry = marks
            .entry((user.to_string(), peer.to_string()))
            .or_insert(epoch_ms);
        if *entry < epoch_ms {
            *entry = epoch_ms;
        }
        Ok(())
    }

    async fn last_read(&self, user: &str, peer: &str) -> Result<Option<i64>, CoreError> {
        let marks = self.read_marks.read().await;
        Ok(marks.get(&(user.to_string(), peer.to_string())).copied())
    }
}
