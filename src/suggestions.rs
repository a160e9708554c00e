//! Friend suggestions: two-hop traversal plus shared enrollments, ranked
//! by mutual-friend count.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::enrollment::EnrollmentDirectory;
use crate::error::CoreError;
use crate::retry_read;
use crate::store::{validate_id, GraphStore, SuggestionCandidate, UserRecord};

pub struct SuggestionEngine {
    store: Arc<dyn GraphStore>,
    enrollment: EnrollmentDirectory,
}

impl SuggestionEngine {
    pub fn new(store: Arc<dyn GraphStore>, enrollment: EnrollmentDirectory) -> Self {
        Self { store, enrollment }
    }

    /// Compute up to `limit` ranked suggestions for `user`.
    ///
    /// Candidates are the union of friends-of-friends (distance exactly
    /// two) and users sharing a course enrollment, minus the user, their
    /// friends, and anyone with a pending request in either direction.
    /// Ranking is by mutual-friend count descending with candidate id as
    /// the stable tie-break. Read-only; a user with no friends and no
    /// enrollments simply gets an empty result.
    pub async fn suggest(
        &self,
        user: &str,
        limit: usize,
    ) -> Result<Vec<SuggestionCandidate>, CoreError> {
        validate_id(user, "user id")?;
        if self.store.get_user(user).await?.is_none() {
            return Err(CoreError::NotFound(format!("user {user} does not exist")));
        }

        let two_hop = retry_read!(self.store.friends_of_friends(user).await)?;
        let classmates = self.enrollment.shared_classmates(user).await?;

        // Union keyed by id; BTreeMap keeps candidate order deterministic.
        let mut candidates: BTreeMap<String, UserRecord> = BTreeMap::new();
        for c in two_hop.into_iter().chain(classmates) {
            candidates.entry(c.id.clone()).or_insert(c);
        }
        candidates.remove(user);

        let friends = retry_read!(self.store.friends_of(user).await)?;
        let pending = retry_read!(self.store.pending_peer_ids(user).await)?;
        let excluded: HashSet<String> = friends
            .into_iter()
            .map(|f| f.id)
            .chain(pending)
            .collect();
        candidates.retain(|id, _| !excluded.contains(id));

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = candidates.keys().cloned().collect();
        let mutuals = retry_read!(self.store.mutual_friend_counts(user, &ids).await)?;

        let mut ranked: Vec<SuggestionCandidate> = candidates
            .into_values()
            .map(|u| {
                let mutual_friends = mutuals.get(&u.id).copied().unwrap_or(0);
                SuggestionCandidate {
                    user: u,
                    mutual_friends,
                }
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.mutual_friends
                .cmp(&a.mutual_friends)
                .then_with(|| a.user.id.cmp(&b.user.id))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }
}
