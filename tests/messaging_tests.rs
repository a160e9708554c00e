//! Integration tests for message persistence: validation, history
//! ordering, conversation summaries, and the read marker.

use std::sync::Arc;

use quad::error::CoreError;
use quad::messaging::{MessagingService, MAX_CONTENT_LEN};
use quad::store::memory::MemoryStore;
use quad::store::{GraphStore, MessageRecord, UserRecord};

fn user(id: &str) -> UserRecord {
    UserRecord {
        id: id.to_string(),
        name: id.to_uppercase(),
        username: format!("@{id}"),
        avatar: String::new(),
        status: String::new(),
    }
}

async fn service_with_users(ids: &[&str]) -> (MessagingService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    for id in ids {
        store.create_user(&user(id)).await.unwrap();
    }
    (MessagingService::new(store.clone()), store)
}

#[tokio::test]
async fn send_assigns_timestamps_and_returns_the_record() {
    let (svc, _) = service_with_users(&["alice", "bob"]).await;

    let msg = svc.send("alice", "bob", "hi").await.unwrap();
    assert_eq!(msg.sender_id, "alice");
    assert_eq!(msg.recipient_id, "bob");
    assert_eq!(msg.content, "hi");
    assert!(msg.epoch_ms > 0);
    assert!(msg.sent_at > 0);
}

#[tokio::test]
async fn send_rejects_bad_input() {
    let (svc, _) = service_with_users(&["alice", "bob"]).await;

    assert!(matches!(
        svc.send("alice", "bob", "").await,
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        svc.send("alice", "bob", "   \n\t").await,
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        svc.send("alice", "alice", "hi").await,
        Err(CoreError::Validation(_))
    ));
    let oversized = "x".repeat(MAX_CONTENT_LEN + 1);
    assert!(matches!(
        svc.send("alice", "bob", &oversized).await,
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        svc.send("alice", "ghost", "hi").await,
        Err(CoreError::NotFound(_))
    ));
    assert!(matches!(
        svc.send("ghost", "bob", "hi").await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn epoch_values_are_strictly_increasing_across_sends() {
    let (svc, _) = service_with_users(&["alice", "bob"]).await;

    let mut prev = 0;
    for i in 0..50 {
        let msg = svc.send("alice", "bob", &format!("m{i}")).await.unwrap();
        assert!(msg.epoch_ms > prev);
        prev = msg.epoch_ms;
    }
}

#[tokio::test]
async fn history_is_sorted_by_epoch_regardless_of_write_order() {
    let (svc, store) = service_with_users(&["alice", "bob"]).await;

    // Simulate skewed writers by inserting records out of order at the
    // store level, the way a second service instance with a fast clock
    // might.
    for (content, epoch_ms) in [("third", 3_000), ("first", 1_000), ("second", 2_000)] {
        store
            .insert_message(&MessageRecord {
                sender_id: "alice".to_string(),
                recipient_id: "bob".to_string(),
                content: content.to_string(),
                sent_at: 99, // wall clock is advisory and deliberately bogus
                epoch_ms,
            })
            .await
            .unwrap();
    }

    let history = svc.history("alice", "bob").await.unwrap();
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second", "third"]);

    // Both argument orders see the identical conversation.
    let reversed = svc.history("bob", "alice").await.unwrap();
    assert_eq!(history, reversed);
}

#[tokio::test]
async fn history_covers_both_directions() {
    let (svc, _) = service_with_users(&["alice", "bob", "carol"]).await;

    svc.send("alice", "bob", "hi").await.unwrap();
    svc.send("bob", "alice", "hello").await.unwrap();
    svc.send("alice", "carol", "elsewhere").await.unwrap();

    let history = svc.history("alice", "bob").await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.windows(2).all(|w| w[0].epoch_ms <= w[1].epoch_ms));
}

#[tokio::test]
async fn conversations_track_unread_until_marked_read() {
    let (svc, _) = service_with_users(&["alice", "bob"]).await;

    // Example scenario: bob messages alice while her view is closed.
    svc.send("alice", "bob", "hi").await.unwrap();
    let last = svc.send("bob", "alice", "hello").await.unwrap();

    let convs = svc.conversations_for("alice").await.unwrap();
    assert_eq!(convs.len(), 1);
    assert_eq!(convs[0].peer.id, "bob");
    assert_eq!(convs[0].last_message.content, "hello");
    assert_eq!(convs[0].unread_count, 1);

    // Opening the conversation advances the marker.
    svc.mark_read("alice", "bob", last.epoch_ms).await.unwrap();
    let convs = svc.conversations_for("alice").await.unwrap();
    assert_eq!(convs[0].unread_count, 0);

    // The marker survives a stale (smaller) update.
    svc.mark_read("alice", "bob", last.epoch_ms - 1000).await.unwrap();
    let convs = svc.conversations_for("alice").await.unwrap();
    assert_eq!(convs[0].unread_count, 0);
}

#[tokio::test]
async fn conversations_list_distinct_peers_most_recent_first() {
    let (svc, _) = service_with_users(&["alice", "bob", "carol"]).await;

    svc.send("alice", "bob", "to bob").await.unwrap();
    svc.send("carol", "alice", "from carol").await.unwrap();

    let convs = svc.conversations_for("alice").await.unwrap();
    let peers: Vec<&str> = convs.iter().map(|c| c.peer.id.as_str()).collect();
    assert_eq!(peers, vec!["carol", "bob"]);

    // Reading bob's side: one conversation with alice, nothing unread for
    // what bob himself sent.
    let bob_convs = svc.conversations_for("bob").await.unwrap();
    assert_eq!(bob_convs.len(), 1);
    assert_eq!(bob_convs[0].peer.id, "alice");
    assert_eq!(bob_convs[0].unread_count, 1);
}
