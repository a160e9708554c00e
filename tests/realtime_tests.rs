//! End-to-end tests over a real bound server: REST + WebSocket push.
//!
//! Each test starts the full router on an ephemeral port against an
//! in-memory store, drives it with reqwest and a WebSocket client, and
//! asserts the push-delivery rules: events land in the recipient's room
//! only, a user's connections all receive the fan-out, and a message sent
//! while the recipient is offline is still durable.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use quad::store::memory::MemoryStore;
use quad::store::{GraphStore, UserRecord};
use quad::web::router::build_router;
use quad::web::state::AppState;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);
const SILENCE_TIMEOUT: Duration = Duration::from_millis(300);

fn user(id: &str) -> UserRecord {
    UserRecord {
        id: id.to_string(),
        name: id.to_uppercase(),
        username: format!("@{id}"),
        avatar: String::new(),
        status: String::new(),
    }
}

async fn start_server(ids: &[&str]) -> SocketAddr {
    let store = Arc::new(MemoryStore::new());
    for id in ids {
        store.create_user(&user(id)).await.unwrap();
    }
    let state = Arc::new(AppState::new(store));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn ws_join(addr: SocketAddr, user_id: &str) -> WsClient {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/ws"))
        .await
        .expect("ws connect");
    let join = serde_json::json!({"type": "join", "user_id": user_id});
    ws.send(WsMessage::Text(join.to_string())).await.unwrap();
    ws
}

/// Read the next text frame as JSON, failing the test on timeout.
async fn next_json(ws: &mut WsClient) -> serde_json::Value {
    let frame = tokio::time::timeout(RECV_TIMEOUT, ws.next())
        .await
        .expect("timed out waiting for ws frame")
        .expect("ws stream ended")
        .expect("ws error");
    match frame {
        WsMessage::Text(text) => serde_json::from_str(&text).expect("frame is not JSON"),
        other => panic!("unexpected ws frame: {other:?}"),
    }
}

/// Assert no frame arrives within [`SILENCE_TIMEOUT`].
async fn expect_silence(ws: &mut WsClient) {
    let result = tokio::time::timeout(SILENCE_TIMEOUT, ws.next()).await;
    assert!(result.is_err(), "expected silence, got: {result:?}");
}

/// Joins are processed asynchronously; poll the health endpoint until the
/// expected number of registered connections is visible.
async fn wait_for_connections(client: &reqwest::Client, addr: SocketAddr, n: u64) {
    for _ in 0..80 {
        let health: serde_json::Value = client
            .get(format!("http://{addr}/api/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if health["ws_connections"].as_u64() == Some(n) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("never saw {n} registered ws connection(s)");
}

#[tokio::test]
async fn rest_send_is_pushed_to_recipient_room_only() {
    let addr = start_server(&["alice", "bob"]).await;
    let client = reqwest::Client::new();

    let mut alice_ws = ws_join(addr, "alice").await;
    let mut bob_ws = ws_join(addr, "bob").await;
    wait_for_connections(&client, addr, 2).await;

    let resp = client
        .post(format!("http://{addr}/api/messages"))
        .json(&serde_json::json!({
            "sender_id": "alice",
            "recipient_id": "bob",
            "content": "hi bob",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let sent: serde_json::Value = resp.json().await.unwrap();
    assert!(sent["epoch_ms"].as_i64().unwrap() > 0);

    let event = next_json(&mut bob_ws).await;
    assert_eq!(event["type"], "receive_message");
    assert_eq!(event["message"]["sender_id"], "alice");
    assert_eq!(event["message"]["content"], "hi bob");

    // The sender's room stays quiet; the sender already has its echo.
    expect_silence(&mut alice_ws).await;
}

#[tokio::test]
async fn ws_send_message_persists_and_delivers() {
    let addr = start_server(&["alice", "bob"]).await;
    let client = reqwest::Client::new();

    let mut alice_ws = ws_join(addr, "alice").await;
    let mut bob_ws = ws_join(addr, "bob").await;
    wait_for_connections(&client, addr, 2).await;

    let frame = serde_json::json!({
        "type": "send_message",
        "recipient_id": "bob",
        "content": "over the channel",
    });
    alice_ws
        .send(WsMessage::Text(frame.to_string()))
        .await
        .unwrap();

    let event = next_json(&mut bob_ws).await;
    assert_eq!(event["type"], "receive_message");
    assert_eq!(event["message"]["content"], "over the channel");

    // The same send is durable and visible via history.
    let history: serde_json::Value = client
        .get(format!("http://{addr}/api/messages/history/alice/bob"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let items = history.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["content"], "over the channel");
}

#[tokio::test]
async fn fan_out_reaches_every_connection_of_the_recipient() {
    let addr = start_server(&["alice", "bob"]).await;
    let client = reqwest::Client::new();

    let mut bob_tab1 = ws_join(addr, "bob").await;
    let mut bob_tab2 = ws_join(addr, "bob").await;
    wait_for_connections(&client, addr, 2).await;

    client
        .post(format!("http://{addr}/api/messages"))
        .json(&serde_json::json!({
            "sender_id": "alice",
            "recipient_id": "bob",
            "content": "both tabs",
        }))
        .send()
        .await
        .unwrap();

    for ws in [&mut bob_tab1, &mut bob_tab2] {
        let event = next_json(ws).await;
        assert_eq!(event["type"], "receive_message");
        assert_eq!(event["message"]["content"], "both tabs");
    }
}

#[tokio::test]
async fn message_sent_while_recipient_offline_survives_in_history() {
    let addr = start_server(&["alice", "bob"]).await;
    let client = reqwest::Client::new();

    // No connection for bob at all: the push is skipped, the durable
    // write is not.
    let resp = client
        .post(format!("http://{addr}/api/messages"))
        .json(&serde_json::json!({
            "sender_id": "alice",
            "recipient_id": "bob",
            "content": "while you were away",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let history: serde_json::Value = client
        .get(format!("http://{addr}/api/messages/history/alice/bob"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let items = history.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["content"], "while you were away");

    // A disconnected-then-reconnected client receives nothing stale over
    // the channel; it catches up from history instead.
    let mut bob_ws = ws_join(addr, "bob").await;
    wait_for_connections(&client, addr, 1).await;
    expect_silence(&mut bob_ws).await;
}

#[tokio::test]
async fn join_gates_the_channel() {
    let addr = start_server(&["alice"]).await;

    // Unknown user: error frame, then the server hangs up.
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/ws"))
        .await
        .unwrap();
    ws.send(WsMessage::Text(
        serde_json::json!({"type": "join", "user_id": "ghost"}).to_string(),
    ))
    .await
    .unwrap();
    let event = next_json(&mut ws).await;
    assert_eq!(event["type"], "error");

    // Sending before joining is rejected with an error frame.
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/ws"))
        .await
        .unwrap();
    ws.send(WsMessage::Text(
        serde_json::json!({
            "type": "send_message",
            "recipient_id": "alice",
            "content": "too early",
        })
        .to_string(),
    ))
    .await
    .unwrap();
    let event = next_json(&mut ws).await;
    assert_eq!(event["type"], "error");
}

#[tokio::test]
async fn friendship_rest_flow_with_conflict_presentation() {
    let addr = start_server(&["alice", "bob"]).await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}/api");

    let resp = client
        .post(format!("{base}/friends/request"))
        .json(&serde_json::json!({"from_id": "alice", "to_id": "bob"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Duplicate request: 409 with an "already"-phrased body so the UI can
    // treat it as success.
    let resp = client
        .post(format!("{base}/friends/request"))
        .json(&serde_json::json!({"from_id": "alice", "to_id": "bob"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("already"));

    let resp = client
        .post(format!("{base}/friends/accept"))
        .json(&serde_json::json!({"from_id": "alice", "to_id": "bob"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let friends: serde_json::Value = client
        .get(format!("{base}/friends/bob"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = friends
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["alice"]);

    // Accepting again: 404, already applied.
    let resp = client
        .post(format!("{base}/friends/accept"))
        .json(&serde_json::json!({"from_id": "alice", "to_id": "bob"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
