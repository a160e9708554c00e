//! WebSocket upgrade and per-connection room handling.
//!
//! A client's first frame must be `join`, which places the connection in
//! the room keyed by its own user id. From then on the connection both
//! drains push events for that room and may submit `send_message` frames,
//! which take the same durable path as the REST send before fan-out.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::logging;
use crate::realtime::{ClientFrame, ServerEvent};
use crate::web::config::MAX_WS_CONNECTIONS;
use crate::web::state::SharedState;
use crate::web::utils::api_error;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> Response {
    if state.registry.connection_count() >= MAX_WS_CONNECTIONS {
        return api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("too many WebSocket connections (max {MAX_WS_CONNECTIONS})"),
        );
    }
    ws.on_upgrade(|socket| ws_connection(socket, state))
        .into_response()
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(WsMessage::Text(json)).await.is_ok(),
        Err(_) => false,
    }
}

async fn send_error(socket: &mut WebSocket, message: impl Into<String>) -> bool {
    send_event(
        socket,
        &ServerEvent::Error {
            message: message.into(),
        },
    )
    .await
}

async fn ws_connection(mut socket: WebSocket, state: SharedState) {
    // Nothing is delivered and nothing is accepted until the client joins
    // its own room.
    let user_id = loop {
        match socket.recv().await {
            Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(ClientFrame::Join { user_id }) => match state.store.get_user(&user_id).await {
                    Ok(Some(_)) => break user_id,
                    Ok(None) => {
                        let _ = send_error(&mut socket, format!("unknown user {user_id}")).await;
                        return;
                    }
                    Err(e) => {
                        let _ = send_error(&mut socket, e.to_string()).await;
                        return;
                    }
                },
                Ok(_) => {
                    if !send_error(&mut socket, "join required before other frames").await {
                        return;
                    }
                }
                Err(e) => {
                    if !send_error(&mut socket, format!("malformed frame: {e}")).await {
                        return;
                    }
                }
            },
            Some(Ok(WsMessage::Ping(data))) => {
                let _ = socket.send(WsMessage::Pong(data)).await;
            }
            Some(Ok(WsMessage::Close(_))) | None => return,
            _ => {}
        }
    };

    let (conn_id, mut rx) = state.registry.register(&user_id);
    crate::qlog!("realtime: {} joined their room", logging::user_id(&user_id));

    loop {
        tokio::select! {
            // Drain room events into the socket.
            event = rx.recv() => {
                match event {
                    Some(ev) => {
                        if !send_event(&mut socket, &ev).await {
                            break; // client disconnected
                        }
                    }
                    None => break,
                }
            }
            // Handle frames from the client.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::SendMessage { recipient_id, content }) => {
                                match state.messaging.send(&user_id, &recipient_id, &content).await {
                                    Ok(message) => {
                                        // Recipient's room only; the sender
                                        // already rendered its local echo.
                                        let recipient = message.recipient_id.clone();
                                        state.registry.route_to(
                                            &recipient,
                                            ServerEvent::ReceiveMessage { message },
                                        );
                                    }
                                    Err(e) => {
                                        if !send_error(&mut socket, e.to_string()).await {
                                            break;
                                        }
                                    }
                                }
                            }
                            Ok(ClientFrame::Join { .. }) => {
                                if !send_error(&mut socket, "already joined").await {
                                    break;
                                }
                            }
                            Err(e) => {
                                if !send_error(&mut socket, format!("malformed frame: {e}")).await {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = socket.send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    state.registry.unregister(&user_id, conn_id);
    crate::qlog!("realtime: {} disconnected", logging::user_id(&user_id));
}
