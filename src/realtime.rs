//! Push delivery: per-user rooms and the wire event types.
//!
//! Each connected client joins exactly one room keyed by its own user id.
//! After the durable write, a newly sent message is routed into the
//! recipient's room only; the sender already has its local echo. A user
//! may hold several simultaneous connections (several devices/tabs);
//! `route_to` fans out to all of them, and each connection registers and
//! unregisters independently, so delivery stops for a connection exactly
//! when it disconnects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::logging;
use crate::store::MessageRecord;

/// Events the server pushes to connected clients.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    ReceiveMessage { message: MessageRecord },
    Error { message: String },
}

/// Frames a client may send over the channel. The first frame must be
/// `Join`; everything before it is rejected.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Join { user_id: String },
    SendMessage { recipient_id: String, content: String },
}

struct Connection {
    id: u64,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

/// Registry of live connections, keyed by user id.
///
/// Lifecycle is explicit: `register` on join, `unregister` on disconnect.
/// No other component holds connection state.
pub struct ConnectionRegistry {
    rooms: Mutex<HashMap<String, Vec<Connection>>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add a connection to `user_id`'s room. Returns the connection id
    /// (needed to unregister) and the event receiver to drain into the
    /// socket.
    pub fn register(&self, user_id: &str) -> (u64, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut rooms = self.rooms.lock().unwrap();
        rooms
            .entry(user_id.to_string())
            .or_default()
            .push(Connection { id, tx });
        (id, rx)
    }

    /// Remove one connection from `user_id`'s room; empty rooms are
    /// dropped entirely.
    pub fn unregister(&self, user_id: &str, conn_id: u64) {
        let mut rooms = self.rooms.lock().unwrap();
        if let Some(conns) = rooms.get_mut(user_id) {
            conns.retain(|c| c.id != conn_id);
            if conns.is_empty() {
                rooms.remove(user_id);
            }
        }
    }

    /// Deliver an event to every live connection in `user_id`'s room.
    /// Connections whose receiver is gone are pruned. Returns how many
    /// connections took the event.
    pub fn route_to(&self, user_id: &str, event: ServerEvent) -> usize {
        let mut rooms = self.rooms.lock().unwrap();
        let Some(conns) = rooms.get_mut(user_id) else {
            return 0;
        };
        conns.retain(|c| c.tx.send(event.clone()).is_ok());
        let delivered = conns.len();
        if conns.is_empty() {
            rooms.remove(user_id);
        }
        if delivered > 0 {
            crate::qlog!(
                "realtime: routed event to {} connection(s) for {}",
                delivered,
                logging::user_id(user_id)
            );
        }
        delivered
    }

    /// Total live connections across all rooms.
    pub fn connection_count(&self) -> usize {
        let rooms = self.rooms.lock().unwrap();
        rooms.values().map(Vec::len).sum()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
