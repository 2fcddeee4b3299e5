// irrigation_client/src/state.rs

//! Observable engine state shared between the connection tasks and collaborators.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health flags of one engine instance.
///
/// `client_connected` follows the transport. `controller_connected` holds the last value
/// reported by the authority and only drops on its own when the transport drops.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub client_connected: bool,
    pub controller_connected: bool,
    /// When the last `controllerHeartbeat` was received.
    pub last_heartbeat_at: Option<DateTime<Utc>>,
}

impl ConnectionState {
    /// Both flags down. `last_heartbeat_at` is kept for diagnostics.
    pub fn reset(&mut self) {
        self.client_connected = false;
        self.controller_connected = false;
    }
}

pub type SharedConnectionState = Arc<RwLock<ConnectionState>>;

/// Stagger flags from the last `getConfigResponse`. Read-only for the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaggerSettings {
    pub stagger_on: bool,
    pub stagger_zones: bool,
}
