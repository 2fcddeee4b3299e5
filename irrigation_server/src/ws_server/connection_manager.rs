// irrigation_server/src/ws_server/connection_manager.rs

//! At most one session per client type.

use crate::ws_server::client_session::ClientSession;
use chrono::Utc;
use common_models::ClientType;
use dashmap::DashMap;
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Registry of the current `user` and `controller` sessions.
///
/// Cloning shares the registry. Connection tasks, the router and the heartbeat monitor
/// all hold a handle.
#[derive(Debug, Clone, Default)]
pub struct ConnectionManager {
    /// Keyed by role, so a second session of a role replaces the first.
    sessions: Arc<DashMap<ClientType, Arc<ClientSession>>>,
}

impl ConnectionManager {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session. A previous session of the same type is told to close.
    ///
    /// # Arguments
    /// * `client_type` - role from the identity frame.
    /// * `addr` - peer address of the connection.
    /// * `sender` - the connection's outbound queue.
    ///
    /// # Returns
    /// The registered session, shared with the connection's reader loop.
    pub fn add_client(
        &self,
        client_type: ClientType,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<String>,
    ) -> Arc<ClientSession> {
        let session = Arc::new(ClientSession::new(client_type, addr, sender));
        if let Some(previous) = self.sessions.insert(client_type, Arc::clone(&session)) {
            warn!(
                "[ConnectionManager] {} {} from {} replaced by {} from {}",
                client_type, previous.session_id, previous.addr, session.session_id, addr
            );
            previous.request_close();
        }
        info!("[ConnectionManager] {} connected: id={}, addr={}", client_type, session.session_id, addr);
        session
    }

    /// Current session of `client_type`, if one is attached.
    pub fn get_client(&self, client_type: ClientType) -> Option<Arc<ClientSession>> {
        self.sessions.get(&client_type).map(|entry| Arc::clone(entry.value()))
    }

    /// Removes the session of `client_type` only if it is still `session_id`; a session
    /// that was already replaced leaves its successor alone.
    pub fn remove_client(&self, client_type: ClientType, session_id: Uuid) -> Option<Arc<ClientSession>> {
        match self.sessions.remove_if(&client_type, |_, current| current.session_id == session_id) {
            Some((_, session)) => {
                info!("[ConnectionManager] {} disconnected: id={}, addr={}", client_type, session_id, session.addr);
                Some(session)
            }
            None => {
                debug!("[ConnectionManager] {} {} already replaced or removed", client_type, session_id);
                None
            }
        }
    }

    /// A controller counts as connected while attached and heard from within `timeout`.
    pub async fn is_controller_alive(&self, timeout: Duration) -> bool {
        let Some(controller) = self.get_client(ClientType::Controller) else {
            return false;
        };
        let last_seen = *controller.last_seen.read().await;
        let silence = Utc::now().signed_duration_since(last_seen);
        match chrono::Duration::from_std(timeout) {
            Ok(limit) => silence < limit,
            Err(_) => true,
        }
    }

    /// Number of attached sessions, at most one per role.
    pub fn client_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn test_new_session_replaces_and_closes_previous() {
        let manager = ConnectionManager::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let first = manager.add_client(ClientType::User, addr(1), tx1);
        let second = manager.add_client(ClientType::User, addr(2), tx2);
        assert_eq!(manager.client_count(), 1);
        assert_eq!(manager.get_client(ClientType::User).unwrap().session_id, second.session_id);

        tokio::time::timeout(Duration::from_secs(1), first.closed()).await.expect("old session told to close");

        // The replaced session's cleanup must not evict its successor.
        assert!(manager.remove_client(ClientType::User, first.session_id).is_none());
        assert!(manager.get_client(ClientType::User).is_some());
        assert!(manager.remove_client(ClientType::User, second.session_id).is_some());
        assert_eq!(manager.client_count(), 0);
    }

    #[tokio::test]
    async fn test_controller_liveness_follows_last_seen() {
        let manager = ConnectionManager::new();
        assert!(!manager.is_controller_alive(Duration::from_secs(15)).await);

        let (tx, _rx) = mpsc::unbounded_channel();
        let controller = manager.add_client(ClientType::Controller, addr(3), tx);
        assert!(manager.is_controller_alive(Duration::from_secs(15)).await);

        *controller.last_seen.write().await = Utc::now() - chrono::Duration::seconds(20);
        assert!(!manager.is_controller_alive(Duration::from_secs(15)).await);

        controller.touch().await;
        assert!(manager.is_controller_alive(Duration::from_secs(15)).await);
    }
}
