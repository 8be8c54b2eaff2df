use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{ConnectionId, PollId, RoomId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Outbound channels for every live connection
#[derive(Debug, Default)]
pub struct ConnectionHub {
    senders: HashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an outbound channel for `connection`; the socket writer drains the receiver
    pub fn register(&mut self, connection: &ConnectionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(connection.clone(), tx);
        tracing::debug!("Connection {} registered", connection);
        rx
    }

    /// Drop the connection's sender. Its writer task sees the channel close and ends.
    pub fn unregister(&mut self, connection: &str) -> bool {
        let removed = self.senders.remove(connection).is_some();
        if removed {
            tracing::debug!("Connection {} unregistered", connection);
        }
        removed
    }

    pub fn is_registered(&self, connection: &str) -> bool {
        self.senders.contains_key(connection)
    }

    pub fn unicast(&self, connection: &str, msg: ServerMessage) -> bool {
        match self.senders.get(connection) {
            Some(tx) => {
                if let Err(e) = tx.send(msg) {
                    tracing::warn!("Failed to send to connection {}: {}", connection, e);
                    false
                } else {
                    true
                }
            }
            None => {
                tracing::debug!("Connection {} not registered, dropping message", connection);
                false
            }
        }
    }

    /// Send `msg` to every listed connection, skipping ones that are gone.
    /// Returns how many connections it was handed to.
    pub fn broadcast<'a>(
        &self,
        connections: impl IntoIterator<Item = &'a ConnectionId>,
        msg: &ServerMessage,
    ) -> usize {
        connections
            .into_iter()
            .filter(|connection| self.unicast(connection, msg.clone()))
            .count()
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

/// Spawn the deadline task for a poll.
///
/// After `duration` it takes the session lock and ends the poll, but only if
/// `poll_id` is still the active poll of `room_id`; a poll that already ended
/// or was replaced is left alone.
pub fn spawn_poll_timer(
    state: Arc<AppState>,
    room_id: RoomId,
    poll_id: PollId,
    duration: Duration,
) -> AbortHandle {
    let deadline = tokio::time::Instant::now() + duration;
    let handle = tokio::spawn(async move {
        tokio::time::sleep_until(deadline).await;

        let mut session = state.session.lock().await;
        if session.expire_poll(&room_id, &poll_id) {
            tracing::info!("Poll {} in room '{}' timed out", poll_id, room_id);
        } else {
            tracing::debug!("Timer for poll {} fired after it already ended", poll_id);
        }
    });
    handle.abort_handle()
}
