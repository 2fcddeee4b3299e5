// irrigation_server/src/ws_server/client_session.rs

use chrono::{DateTime, Utc};
use common_models::ClientType;
use log::warn;
use rust_websocket_utils::message::WsMessage;
use std::net::SocketAddr;
use tokio::sync::{mpsc, Notify, RwLock};
use uuid::Uuid;

/// One identified WebSocket connection.
///
/// Outbound frames go through `sender` to the connection's writer task. `last_seen` is
/// refreshed on every inbound frame and drives the controller liveness check.
#[derive(Debug)]
pub struct ClientSession {
    /// Assigned on identification. Removal by the connection's own cleanup only
    /// succeeds while the registry still holds this id.
    pub session_id: Uuid,
    /// Which role the first text frame claimed.
    pub client_type: ClientType,
    /// Peer address as reported by the TCP accept.
    pub addr: SocketAddr,
    pub connected_at: DateTime<Utc>,
    /// Time of the last inbound frame of any type.
    pub last_seen: RwLock<DateTime<Utc>>,
    /// Serialized envelopes for the writer task. Sending fails once the writer is gone.
    sender: mpsc::UnboundedSender<String>,
    /// Signalled by `request_close`; stores a permit so a signal sent before
    /// anyone waits is still seen.
    close_requested: Notify,
}

impl ClientSession {
    /// Creates a session with a fresh id; `connected_at` and `last_seen` start at now.
    ///
    /// # Arguments
    /// * `client_type` - role claimed by the identity frame.
    /// * `addr` - peer address, used in log lines only.
    /// * `sender` - queue drained by the connection's writer task.
    pub fn new(client_type: ClientType, addr: SocketAddr, sender: mpsc::UnboundedSender<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            client_type,
            addr,
            connected_at: now,
            last_seen: RwLock::new(now),
            sender,
            close_requested: Notify::new(),
        }
    }

    /// Marks the session as heard from just now.
    pub async fn touch(&self) {
        *self.last_seen.write().await = Utc::now();
    }

    /// Queues `message` for the writer task. `false` if the connection is gone.
    pub fn send(&self, message: &WsMessage) -> bool {
        match message.to_text() {
            Ok(text) => self.sender.send(text).is_ok(),
            Err(e) => {
                warn!("[ClientSession {}] '{}' not serializable: {}", self.session_id, message.message_type, e);
                false
            }
        }
    }

    /// Asks the connection's reader loop to stop, e.g. when a newer session replaced it.
    pub fn request_close(&self) {
        self.close_requested.notify_one();
    }

    /// Resolves once `request_close` was called, even if that happened earlier.
    pub async fn closed(&self) {
        self.close_requested.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_models::ws_payloads::{ControllerHeartbeatPayload, CONTROLLER_HEARTBEAT_MESSAGE_TYPE};
    use std::time::Duration;

    fn session() -> (ClientSession, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ClientSession::new(ClientType::User, "127.0.0.1:40000".parse().unwrap(), tx), rx)
    }

    #[tokio::test]
    async fn test_send_queues_serialized_envelope() {
        let (session, mut rx) = session();
        let message = WsMessage::new(
            CONTROLLER_HEARTBEAT_MESSAGE_TYPE,
            &ControllerHeartbeatPayload { is_controller_connected: true },
        )
        .unwrap();
        assert!(session.send(&message));
        let queued = WsMessage::from_text(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(queued, message);

        drop(rx);
        assert!(!session.send(&message));
    }

    #[tokio::test]
    async fn test_close_request_before_wait_is_not_lost() {
        let (session, _rx) = session();
        session.request_close();
        tokio::time::timeout(Duration::from_secs(1), session.closed()).await.expect("permit kept");
    }
}
