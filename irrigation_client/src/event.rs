// irrigation_client/src/event.rs

//! Events pushed to collaborators through a broadcast channel.

use common_models::{Schedules, Zone};
use log::debug;
use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum EngineEvent {
    #[serde(rename_all = "camelCase")]
    ConnectionStatus {
        client_connected: bool,
        controller_connected: bool,
    },
    #[serde(rename_all = "camelCase")]
    SchedulesUpdated {
        schedules: Schedules,
        selected_index: usize,
    },
    #[serde(rename_all = "camelCase")]
    ZoneStateChanged { zone: Zone, is_on: bool },
    /// A debounced push failed. Immediate pushes report to their caller instead.
    ScheduleSyncFailed { error: String },
}

/// Cloneable sender side. Emitting never fails the caller.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.sender.send(event) {
            debug!("[EventBus] no subscriber for {:?}", e.0);
        }
    }
}
