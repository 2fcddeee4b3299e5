// irrigation_client/src/ws_client/heartbeat.rs

//! Heartbeat Monitor and the optional keep-alive loop.
//!
//! `controllerHeartbeat` frames are unsolicited: they never answer a request. Each one
//! overwrites `controller_connected` with the value it carries. There is no local
//! staleness timer; the flag only falls back to `false` when the transport drops.

use crate::error::ClientError;
use crate::event::{EngineEvent, EventBus};
use crate::state::SharedConnectionState;
use crate::ws_client::dispatcher::RequestDispatcher;
use chrono::Utc;
use common_models::ws_payloads::{
    ControllerHeartbeatPayload, KeepAlivePayload, KeepAliveResponse, KEEP_ALIVE_MESSAGE_TYPE,
};
use log::{debug, info, warn};
use rust_websocket_utils::message::WsMessage;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    state: SharedConnectionState,
    events: EventBus,
}

impl HeartbeatMonitor {
    pub fn new(state: SharedConnectionState, events: EventBus) -> Self {
        Self { state, events }
    }

    /// Applies one `controllerHeartbeat` frame. Returns the reported liveness.
    pub async fn handle_heartbeat(&self, message: &WsMessage) -> Result<bool, ClientError> {
        let payload: ControllerHeartbeatPayload = message
            .deserialize_payload()
            .map_err(|e| ClientError::MalformedFrame(e.to_string()))?;
        {
            let mut state = self.state.write().await;
            state.last_heartbeat_at = Some(Utc::now());
        }
        self.apply_liveness(payload.is_controller_connected).await;
        Ok(payload.is_controller_connected)
    }

    /// Overwrites `controller_connected`, e.g. from a heartbeat or a `statusResponse`.
    pub async fn apply_liveness(&self, is_controller_connected: bool) {
        let snapshot = {
            let mut state = self.state.write().await;
            if !state.client_connected {
                debug!("[HeartbeatMonitor] liveness reading after disconnect ignored");
                return;
            }
            if state.controller_connected == is_controller_connected {
                return;
            }
            state.controller_connected = is_controller_connected;
            state.clone()
        };
        info!("[HeartbeatMonitor] controller connected: {}", is_controller_connected);
        self.events.emit(EngineEvent::ConnectionStatus {
            client_connected: snapshot.client_connected,
            controller_connected: snapshot.controller_connected,
        });
    }

    pub async fn controller_connected(&self) -> bool {
        self.state.read().await.controller_connected
    }
}

/// Sends `keepAlive` every `interval` until aborted. Failures are logged only.
pub async fn run_keep_alive_loop(dispatcher: Arc<RequestDispatcher>, interval: Duration) {
    info!("[KeepAlive] started, interval {:?}", interval);
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match dispatcher
            .request::<_, KeepAliveResponse>(KEEP_ALIVE_MESSAGE_TYPE, &KeepAlivePayload {})
            .await
        {
            Ok(_) => debug!("[KeepAlive] acknowledged"),
            Err(ClientError::NotConnected) => {
                debug!("[KeepAlive] transport closed, stopping");
                break;
            }
            Err(e) => warn!("[KeepAlive] failed: {}", e),
        }
    }
}
