//! Cypher-over-Bolt implementation of [`GraphStore`].
//!
//! Every mutation is a single parametrized statement so the store's own
//! transaction guarantees make it atomic: the pending-request uniqueness
//! check runs in the same statement as the create, accept deletes the
//! pending edge and writes both friendship directions together, and
//! unfriend removes both directions with one undirected match.

use std::collections::HashMap;

use async_trait::async_trait;
use neo4rs::{query, Graph, Query, Row};

use crate::error::CoreError;
use crate::store::{ConversationRecord, GraphStore, MessageRecord, UserRecord};

pub struct Neo4jStore {
    graph: Graph,
}

/// Decode one named column off a row.
fn col<T: serde::de::DeserializeOwned>(row: &Row, name: &str) -> Result<T, CoreError> {
    row.get::<T>(name)
        .map_err(|e| CoreError::Transient(format!("row decode for {name}: {e}")))
}

/// RETURN fragment projecting a user node bound to `var` into the columns
/// [`user_from_row`] expects.
fn user_columns(var: &str) -> String {
    format!(
        "{var}.id AS id, {var}.name AS name, {var}.username AS username, \
         coalesce({var}.avatar, '') AS avatar, coalesce({var}.status, '') AS status"
    )
}

fn user_from_row(row: &Row) -> Result<UserRecord, CoreError> {
    Ok(UserRecord {
        id: col(row, "id")?,
        name: col(row, "name")?,
        username: col(row, "username")?,
        avatar: col(row, "avatar")?,
        status: col(row, "status")?,
    })
}

fn message_from_row(row: &Row) -> Result<MessageRecord, CoreError> {
    Ok(MessageRecord {
        sender_id: col(row, "sender_id")?,
        recipient_id: col(row, "recipient_id")?,
        content: col(row, "content")?,
        sent_at: col(row, "sent_at")?,
        epoch_ms: col(row, "epoch_ms")?,
    })
}

impl Neo4jStore {
    /// Connect and create the uniqueness constraints and indexes the edge
    /// invariants rely on.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, CoreError> {
        let graph = Graph::new(uri, user, password).await?;
        let store = Self { graph };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), CoreError> {
        let statements = [
            "CREATE CONSTRAINT user_id IF NOT EXISTS FOR (u:User) REQUIRE u.id IS UNIQUE",
            "CREATE CONSTRAINT user_username IF NOT EXISTS FOR (u:User) REQUIRE u.username IS UNIQUE",
            "CREATE CONSTRAINT course_code IF NOT EXISTS FOR (c:Course) REQUIRE c.code IS UNIQUE",
            "CREATE INDEX sent_epoch IF NOT EXISTS FOR ()-[m:SENT]-() ON (m.epoch_ms)",
        ];
        for stmt in statements {
            self.graph.run(query(stmt)).await?;
        }
        Ok(())
    }

    /// Run a query whose single row carries one integer column; an empty
    /// stream counts as zero.
    async fn single_count(&self, q: Query, name: &str) -> Result<i64, CoreError> {
        let mut result = self.graph.execute(q).await?;
        match result.next().await? {
            Some(row) => col(&row, name),
            None => Ok(0),
        }
    }

    async fn query_users(&self, q: Query) -> Result<Vec<UserRecord>, CoreError> {
        let mut result = self.graph.execute(q).await?;
        let mut users = Vec::new();
        while let Some(row) = result.next().await? {
            users.push(user_from_row(&row)?);
        }
        Ok(users)
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn create_user(&self, user: &UserRecord) -> Result<(), CoreError> {
        let q = query(
            "OPTIONAL MATCH (e:User) WHERE e.id = $id OR e.username = $username
             WITH count(e) AS existing
             WHERE existing = 0
             CREATE (u:User {id: $id, name: $name, username: $username,
                             avatar: $avatar, status: $status})
             RETURN count(u) AS created",
        )
        .param("id", user.id.clone())
        .param("name", user.name.clone())
        .param("username", user.username.clone())
        .param("avatar", user.avatar.clone())
        .param("status", user.status.clone());
        if self.single_count(q, "created").await? == 0 {
            return Err(CoreError::Conflict(format!(
                "user id {} or username {} already taken",
                user.id, user.username
            )));
        }
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, CoreError> {
        let cypher = format!("MATCH (u:User {{id: $id}}) RETURN {}", user_columns("u"));
        let q = query(&cypher).param("id", id.to_string());
        let mut result = self.graph.execute(q).await?;
        match result.next().await? {
            Some(row) => Ok(Some(user_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn create_friend_request(
        &self,
        from: &str,
        to: &str,
        created_at: i64,
    ) -> Result<(), CoreError> {
        let q = query(
            "MATCH (a:User {id: $from}), (b:User {id: $to})
             WHERE NOT (a)-[:FRIENDS_WITH]-(b) AND NOT (a)-[:FRIEND_REQUEST]-(b)
             CREATE (a)-[r:FRIEND_REQUEST {created_at: $created_at}]->(b)
             RETURN count(r) AS created",
        )
        .param("from", from.to_string())
        .param("to", to.to_string())
        .param("created_at", created_at);
        if self.single_count(q, "created").await? == 0 {
            return Err(CoreError::Conflict(format!(
                "a friendship or pending request between {from} and {to} already exists"
            )));
        }
        Ok(())
    }

    async fn accept_friend_request(
        &self,
        from: &str,
        to: &str,
        since: i64,
    ) -> Result<(), CoreError> {
        let q = query(
            "MATCH (a:User {id: $from})-[r:FRIEND_REQUEST]->(b:User {id: $to})
             DELETE r
             CREATE (a)-[:FRIENDS_WITH {since: $since}]->(b)
             CREATE (b)-[:FRIENDS_WITH {since: $since}]->(a)
             RETURN count(*) AS accepted",
        )
        .param("from", from.to_string())
        .param("to", to.to_string())
        .param("since", since);
        if self.single_count(q, "accepted").await? == 0 {
            return Err(CoreError::NotFound(format!(
                "no pending friend request from {from} to {to}"
            )));
        }
        Ok(())
    }

    async fn delete_friend_request(&self, from: &str, to: &str) -> Result<bool, CoreError> {
        let q = query(
            "MATCH (a:User {id: $from})-[r:FRIEND_REQUEST]->(b:User {id: $to})
             DELETE r
             RETURN count(*) AS deleted",
        )
        .param("from", from.to_string())
        .param("to", to.to_string());
        Ok(self.single_count(q, "deleted").await? > 0)
    }

    async fn delete_friendship(&self, a: &str, b: &str) -> Result<bool, CoreError> {
        // The undirected match hits both directed edges; deleting them in
        // one statement keeps the pair atomic.
        let q = query(
            "MATCH (a:User {id: $a})-[r:FRIENDS_WITH]-(b:User {id: $b})
             DELETE r
             RETURN count(*) AS deleted",
        )
        .param("a", a.to_string())
        .param("b", b.to_string());
        Ok(self.single_count(q, "deleted").await? > 0)
    }

    async fn friends_of(&self, user: &str) -> Result<Vec<UserRecord>, CoreError> {
        let cypher = format!(
            "MATCH (u:User {{id: $id}})-[:FRIENDS_WITH]->(f:User)
             RETURN DISTINCT {}
             ORDER BY id",
            user_columns("f")
        );
        self.query_users(query(&cypher).param("id", user.to_string()))
            .await
    }

    async fn pending_requests_for(&self, user: &str) -> Result<Vec<UserRecord>, CoreError> {
        let cypher = format!(
            "MATCH (p:User)-[:FRIEND_REQUEST]->(u:User {{id: $id}})
             RETURN DISTINCT {}
             ORDER BY id",
            user_columns("p")
        );
        self.query_users(query(&cypher).param("id", user.to_string()))
            .await
    }

    async fn pending_peer_ids(&self, user: &str) -> Result<Vec<String>, CoreError> {
        let q = query(
            "MATCH (u:User {id: $id})-[:FRIEND_REQUEST]-(p:User)
             RETURN DISTINCT p.id AS id
             ORDER BY id",
        )
        .param("id", user.to_string());
        let mut result = self.graph.execute(q).await?;
        let mut ids = Vec::new();
        while let Some(row) = result.next().await? {
            ids.push(col(&row, "id")?);
        }
        Ok(ids)
    }

    async fn friends_of_friends(&self, user: &str) -> Result<Vec<UserRecord>, CoreError> {
        let cypher = format!(
            "MATCH (u:User {{id: $id}})-[:FRIENDS_WITH]->(:User)-[:FRIENDS_WITH]->(f:User)
             WHERE f.id <> $id AND NOT (u)-[:FRIENDS_WITH]->(f)
             RETURN DISTINCT {}
             ORDER BY id",
            user_columns("f")
        );
        self.query_users(query(&cypher).param("id", user.to_string()))
            .await
    }

    async fn mutual_friend_counts(
        &self,
        user: &str,
        candidates: &[String],
    ) -> Result<HashMap<String, u32>, CoreError> {
        if candidates.is_empty() {
            return Ok(HashMap::new());
        }
        let q = query(
            "UNWIND $ids AS cid
             MATCH (u:User {id: $id})-[:FRIENDS_WITH]->(m:User)-[:FRIENDS_WITH]->(c:User {id: cid})
             RETURN cid AS id, count(DISTINCT m) AS mutuals",
        )
        .param("id", user.to_string())
        .param("ids", candidates.to_vec());
        let mut result = self.graph.execute(q).await?;
        let mut counts = HashMap::new();
        while let Some(row) = result.next().await? {
            let id: String = col(&row, "id")?;
            let mutuals: i64 = col(&row, "mutuals")?;
            counts.insert(id, mutuals as u32);
        }
        Ok(counts)
    }

    async fn enroll(&self, user: &str, course: &str) -> Result<(), CoreError> {
        let q = query(
            "MATCH (u:User {id: $user})
             MERGE (c:Course {code: $course})
             MERGE (u)-[:ENROLLED_IN]->(c)
             RETURN count(u) AS matched",
        )
        .param("user", user.to_string())
        .param("course", course.to_string());
        if self.single_count(q, "matched").await? == 0 {
            return Err(CoreError::NotFound(format!("user {user} does not exist")));
        }
        Ok(())
    }

    async fn is_enrolled(&self, user: &str, course: &str) -> Result<bool, CoreError> {
        let q = query(
            "MATCH (u:User {id: $user})-[:ENROLLED_IN]->(c:Course {code: $course})
             RETURN count(*) AS n",
        )
        .param("user", user.to_string())
        .param("course", course.to_string());
        Ok(self.single_count(q, "n").await? > 0)
    }

    async fn shared_enrollment_peers(&self, user: &str) -> Result<Vec<UserRecord>, CoreError> {
        let cypher = format!(
            "MATCH (u:User {{id: $id}})-[:ENROLLED_IN]->(:Course)<-[:ENROLLED_IN]-(p:User)
             WHERE p.id <> $id
             RETURN DISTINCT {}
             ORDER BY id",
            user_columns("p")
        );
        self.query_users(query(&cypher).param("id", user.to_string()))
            .await
    }

    async fn insert_message(&self, msg: &MessageRecord) -> Result<(), CoreError> {
        let q = query(
            "MATCH (a:User {id: $from}), (b:User {id: $to})
             CREATE (a)-[m:SENT {content: $content, sent_at: $sent_at, epoch_ms: $epoch_ms}]->(b)
             RETURN count(m) AS created",
        )
        .param("from", msg.sender_id.clone())
        .param("to", msg.recipient_id.clone())
        .param("content", msg.content.clone())
        .param("sent_at", msg.sent_at)
        .param("epoch_ms", msg.epoch_ms);
        if self.single_count(q, "created").await? == 0 {
            return Err(CoreError::NotFound(
                "sender or recipient does not exist".to_string(),
            ));
        }
        Ok(())
    }

    async fn messages_between(&self, a: &str, b: &str) -> Result<Vec<MessageRecord>, CoreError> {
        let q = query(
            "MATCH (a:User {id: $a})-[m:SENT]-(b:User {id: $b})
             RETURN startNode(m).id AS sender_id, endNode(m).id AS recipient_id,
                    m.content AS content, m.sent_at AS sent_at, m.epoch_ms AS epoch_ms
             ORDER BY m.epoch_ms ASC",
        )
        .param("a", a.to_string())
        .param("b", b.to_string());
        let mut result = self.graph.execute(q).await?;
        let mut messages = Vec::new();
        while let Some(row) = result.next().await? {
            messages.push(message_from_row(&row)?);
        }
        Ok(messages)
    }

    async fn conversations_for(
        &self,
        user: &str,
    ) -> Result<Vec<ConversationRecord>, CoreError> {
        let cypher = format!(
            "MATCH (u:User {{id: $id}})-[m:SENT]-(p:User)
             WITH u, p, m ORDER BY m.epoch_ms DESC
             WITH u, p, collect(m)[0] AS last
             OPTIONAL MATCH (u)-[rm:LAST_READ]->(p)
             WITH u, p, last, coalesce(rm.epoch_ms, 0) AS read_ms
             OPTIONAL MATCH (p)-[inc:SENT]->(u) WHERE inc.epoch_ms > read_ms
             RETURN {}, startNode(last).id AS sender_id, endNode(last).id AS recipient_id,
                    last.content AS content, last.sent_at AS sent_at,
                    last.epoch_ms AS epoch_ms, count(inc) AS unread
             ORDER BY epoch_ms DESC",
            user_columns("p")
        );
        let q = query(&cypher).param("id", user.to_string());
        let mut result = self.graph.execute(q).await?;
        let mut conversations = Vec::new();
        while let Some(row) = result.next().await? {
            let unread: i64 = col(&row, "unread")?;
            conversations.push(ConversationRecord {
                peer: user_from_row(&row)?,
                last_message: message_from_row(&row)?,
                unread_count: unread as u32,
            });
        }
        Ok(conversations)
    }

    async fn advance_last_read(
        &self,
        user: &str,
        peer: &str,
        epoch_ms: i64,
    ) -> Result<(), CoreError> {
        let q = query(
            "MATCH (u:User {id: $user}), (p:User {id: $peer})
             MERGE (u)-[r:LAST_READ]->(p)
             ON CREATE SET r.epoch_ms = $ms
             ON MATCH SET r.epoch_ms =
                 CASE WHEN r.epoch_ms < $ms THEN $ms ELSE r.epoch_ms END",
        )
        .param("user", user.to_string())
        .param("peer", peer.to_string())
        .param("ms", epoch_ms);
        self.graph.run(q).await?;
        Ok(())
    }

    async fn last_read(&self, user: &str, peer: &str) -> Result<Option<i64>, CoreError> {
        let q = query(
            "MATCH (u:User {id: $user})-[r:LAST_READ]->(p:User {id: $peer})
             RETURN r.epoch_ms AS epoch_ms",
        )
        .param("user", user.to_string())
        .param("peer", peer.to_string());
        let mut result = self.graph.execute(q).await?;
        match result.next().await? {
            Some(row) => Ok(Some(col(&row, "epoch_ms")?)),
            None => Ok(None),
        }
    }
}
