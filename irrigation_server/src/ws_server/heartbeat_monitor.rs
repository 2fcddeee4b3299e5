// irrigation_server/src/ws_server/heartbeat_monitor.rs

//! Periodic controller liveness check.
//!
//! Every `check_interval` the controller is judged connected if its last frame is
//! younger than `controller_timeout`, and the verdict is pushed to the user session as
//! `controllerHeartbeat`. Nothing is sent while no user is attached.

use crate::ws_server::connection_manager::ConnectionManager;
use common_models::ws_payloads::{ControllerHeartbeatPayload, CONTROLLER_HEARTBEAT_MESSAGE_TYPE};
use common_models::ClientType;
use log::{debug, error, info};
use rust_websocket_utils::message::WsMessage;
use std::sync::Arc;
use std::time::Duration;

/// Owns the periodic liveness check. Consumed by `run`, which loops until its task is
/// aborted.
pub struct HeartbeatMonitor {
    /// Source of the user session to notify and of the controller's `last_seen`.
    connection_manager: Arc<ConnectionManager>,
    /// A controller silent for longer than this is reported as disconnected.
    controller_timeout: Duration,
    /// Period between two pushes. Should stay well below `controller_timeout`, or a
    /// controller that just went quiet is reported late.
    check_interval: Duration,
}

impl HeartbeatMonitor {
    /// # Arguments
    /// * `connection_manager` - shared session registry.
    /// * `controller_timeout` - maximum silence before the controller counts as gone.
    /// * `check_interval` - how often the verdict is pushed.
    pub fn new(connection_manager: Arc<ConnectionManager>, controller_timeout: Duration, check_interval: Duration) -> Self {
        Self {
            connection_manager,
            controller_timeout,
            check_interval,
        }
    }

    /// Pushes a heartbeat on every tick, the first one right away. Never returns.
    pub async fn run(self) {
        info!(
            "[HeartbeatMonitor] started: interval {:?}, controller timeout {:?}",
            self.check_interval, self.controller_timeout
        );
        let mut ticker = tokio::time::interval(self.check_interval);
        loop {
            ticker.tick().await;
            self.push_heartbeat().await;
        }
    }

    /// One check. Returns the liveness that was pushed, or `None` without a user.
    pub async fn push_heartbeat(&self) -> Option<bool> {
        let user = self.connection_manager.get_client(ClientType::User)?;
        let is_controller_connected = self.connection_manager.is_controller_alive(self.controller_timeout).await;

        let message = match WsMessage::new(
            CONTROLLER_HEARTBEAT_MESSAGE_TYPE,
            &ControllerHeartbeatPayload { is_controller_connected },
        ) {
            Ok(message) => message,
            Err(e) => {
                error!("[HeartbeatMonitor] building heartbeat failed: {}", e);
                return None;
            }
        };
        if user.send(&message) {
            debug!("[HeartbeatMonitor] controller connected: {}", is_controller_connected);
            Some(is_controller_connected)
        } else {
            debug!("[HeartbeatMonitor] user {} is going away, heartbeat skipped", user.session_id);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    fn addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 5000))
    }

    #[tokio::test]
    async fn test_no_user_no_push() {
        let manager = Arc::new(ConnectionManager::new());
        let monitor = HeartbeatMonitor::new(manager, Duration::from_secs(15), Duration::from_secs(5));
        assert_eq!(monitor.push_heartbeat().await, None);
    }

    #[tokio::test]
    async fn test_push_reports_controller_presence() {
        let manager = Arc::new(ConnectionManager::new());
        let (user_tx, mut user_rx) = mpsc::unbounded_channel();
        manager.add_client(ClientType::User, addr(), user_tx);
        let monitor = HeartbeatMonitor::new(manager.clone(), Duration::from_secs(15), Duration::from_secs(5));

        assert_eq!(monitor.push_heartbeat().await, Some(false));
        let frame = WsMessage::from_text(&user_rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame.message_type, CONTROLLER_HEARTBEAT_MESSAGE_TYPE);
        assert_eq!(frame.id, None);
        assert!(!frame.deserialize_payload::<ControllerHeartbeatPayload>().unwrap().is_controller_connected);

        let (controller_tx, _controller_rx) = mpsc::unbounded_channel();
        manager.add_client(ClientType::Controller, addr(), controller_tx);
        assert_eq!(monitor.push_heartbeat().await, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_pushes_every_interval() {
        let manager = Arc::new(ConnectionManager::new());
        let (user_tx, mut user_rx) = mpsc::unbounded_channel();
        manager.add_client(ClientType::User, addr(), user_tx);
        let monitor = HeartbeatMonitor::new(manager, Duration::from_secs(15), Duration::from_secs(5));
        let task = tokio::spawn(monitor.run());

        // First tick is immediate, then one per interval.
        tokio::time::sleep(Duration::from_millis(10_100)).await;
        let mut pushed = 0;
        while user_rx.try_recv().is_ok() {
            pushed += 1;
        }
        assert_eq!(pushed, 3);
        task.abort();
    }
}
