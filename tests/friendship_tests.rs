//! Integration tests for the friendship state machine over the in-memory
//! store: request/accept/reject/unfriend transitions, their invariants,
//! and the retry behavior the API promises.

use std::sync::Arc;

use quad::error::CoreError;
use quad::friendship::FriendshipService;
use quad::store::memory::MemoryStore;
use quad::store::{GraphStore, UserRecord};

fn user(id: &str) -> UserRecord {
    UserRecord {
        id: id.to_string(),
        name: id.to_uppercase(),
        username: format!("@{id}"),
        avatar: String::new(),
        status: String::new(),
    }
}

async fn service_with_users(ids: &[&str]) -> (FriendshipService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    for id in ids {
        store.create_user(&user(id)).await.unwrap();
    }
    (FriendshipService::new(store.clone()), store)
}

fn ids(users: &[UserRecord]) -> Vec<&str> {
    users.iter().map(|u| u.id.as_str()).collect()
}

#[tokio::test]
async fn request_is_pending_for_recipient_only() {
    let (svc, _) = service_with_users(&["alice", "bob"]).await;
    svc.send_request("alice", "bob").await.unwrap();

    let bob_pending = svc.list_pending_requests("bob").await.unwrap();
    assert_eq!(ids(&bob_pending), vec!["alice"]);
    assert!(svc.list_pending_requests("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn accept_makes_the_friendship_symmetric() {
    let (svc, _) = service_with_users(&["alice", "bob"]).await;
    svc.send_request("alice", "bob").await.unwrap();
    svc.accept_request("alice", "bob").await.unwrap();

    assert_eq!(ids(&svc.list_friends("alice").await.unwrap()), vec!["bob"]);
    assert_eq!(ids(&svc.list_friends("bob").await.unwrap()), vec!["alice"]);
    assert!(svc.list_pending_requests("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_request_conflicts_in_both_directions() {
    let (svc, _) = service_with_users(&["alice", "bob"]).await;
    svc.send_request("alice", "bob").await.unwrap();

    // A retry after a transient failure must not create a second edge;
    // it surfaces as Conflict instead.
    assert!(matches!(
        svc.send_request("alice", "bob").await,
        Err(CoreError::Conflict(_))
    ));
    assert!(matches!(
        svc.send_request("bob", "alice").await,
        Err(CoreError::Conflict(_))
    ));
    // Still exactly one pending edge.
    assert_eq!(svc.list_pending_requests("bob").await.unwrap().len(), 1);
}

#[tokio::test]
async fn request_conflicts_once_friends() {
    let (svc, _) = service_with_users(&["alice", "bob"]).await;
    svc.send_request("alice", "bob").await.unwrap();
    svc.accept_request("alice", "bob").await.unwrap();

    assert!(matches!(
        svc.send_request("alice", "bob").await,
        Err(CoreError::Conflict(_))
    ));
    assert!(matches!(
        svc.send_request("bob", "alice").await,
        Err(CoreError::Conflict(_))
    ));
}

#[tokio::test]
async fn friendship_and_pending_request_never_coexist() {
    let (svc, store) = service_with_users(&["alice", "bob"]).await;
    svc.send_request("alice", "bob").await.unwrap();
    svc.accept_request("alice", "bob").await.unwrap();

    // After acceptance: friendship present, no pending edge either way.
    assert!(!svc.list_friends("alice").await.unwrap().is_empty());
    assert!(store.pending_peer_ids("alice").await.unwrap().is_empty());
    assert!(store.pending_peer_ids("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn second_accept_reports_not_found() {
    let (svc, _) = service_with_users(&["alice", "bob"]).await;
    svc.send_request("alice", "bob").await.unwrap();
    svc.accept_request("alice", "bob").await.unwrap();

    // Deliberately not idempotent: callers treat this as already-applied.
    assert!(matches!(
        svc.accept_request("alice", "bob").await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn accept_without_request_reports_not_found() {
    let (svc, _) = service_with_users(&["alice", "bob"]).await;
    assert!(matches!(
        svc.accept_request("alice", "bob").await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn reject_is_idempotent() {
    let (svc, _) = service_with_users(&["alice", "bob"]).await;
    svc.send_request("alice", "bob").await.unwrap();

    svc.reject_request("alice", "bob").await.unwrap();
    assert!(svc.list_pending_requests("bob").await.unwrap().is_empty());

    // Second reject observes the same state and is not an error.
    svc.reject_request("alice", "bob").await.unwrap();
    assert!(svc.list_pending_requests("bob").await.unwrap().is_empty());

    // A rejected pair can try again later.
    svc.send_request("alice", "bob").await.unwrap();
    assert_eq!(svc.list_pending_requests("bob").await.unwrap().len(), 1);
}

#[tokio::test]
async fn remove_friend_clears_both_sides_and_is_a_noop_after() {
    let (svc, _) = service_with_users(&["alice", "bob"]).await;
    svc.send_request("alice", "bob").await.unwrap();
    svc.accept_request("alice", "bob").await.unwrap();

    svc.remove_friend("bob", "alice").await.unwrap();
    assert!(svc.list_friends("alice").await.unwrap().is_empty());
    assert!(svc.list_friends("bob").await.unwrap().is_empty());

    svc.remove_friend("alice", "bob").await.unwrap();
}

#[tokio::test]
async fn validation_and_unknown_users_are_rejected() {
    let (svc, _) = service_with_users(&["alice"]).await;

    assert!(matches!(
        svc.send_request("alice", "alice").await,
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        svc.send_request("", "alice").await,
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        svc.send_request("al ice", "alice").await,
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        svc.send_request("alice", "ghost").await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn request_accept_scenario_end_to_end() {
    let (svc, _) = service_with_users(&["alice", "bob"]).await;

    svc.send_request("alice", "bob").await.unwrap();
    svc.accept_request("alice", "bob").await.unwrap();

    assert_eq!(ids(&svc.list_friends("alice").await.unwrap()), vec!["bob"]);
    assert_eq!(ids(&svc.list_friends("bob").await.unwrap()), vec!["alice"]);
    assert!(svc.list_pending_requests("bob").await.unwrap().is_empty());
}
