// irrigation_client/src/ws_client/zone_control.rs

//! Zone Controller: immediate on/off commands with local optimistic state.
//!
//! A toggle flips the local state first and then sends `toggleZone`. A `success=false`
//! answer is handed back as-is; reverting is the caller's call (`set_local_state`).

use crate::error::ClientError;
use crate::event::{EngineEvent, EventBus};
use crate::state::SharedConnectionState;
use crate::ws_client::dispatcher::RequestDispatcher;
use common_models::ws_payloads::{ToggleZonePayload, ToggleZoneResponse, TOGGLE_ZONE_MESSAGE_TYPE};
use common_models::Zone;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Local on/off state of the six zones and the `toggleZone` command path.
#[derive(Debug)]
pub struct ZoneController {
    /// Indexed by `Zone::index`. All off at startup; nothing reads it back from the
    /// controller.
    zone_states: RwLock<[bool; Zone::COUNT]>,
    dispatcher: Arc<RequestDispatcher>,
    connection_state: SharedConnectionState,
    events: EventBus,
}

impl ZoneController {
    pub fn new(dispatcher: Arc<RequestDispatcher>, connection_state: SharedConnectionState, events: EventBus) -> Self {
        Self {
            zone_states: RwLock::new([false; Zone::COUNT]),
            dispatcher,
            connection_state,
            events,
        }
    }

    /// Local view of `zone`, which may be an optimistic flip awaiting its answer.
    pub async fn is_on(&self, zone: Zone) -> bool {
        self.zone_states.read().await[zone.index()]
    }

    /// `(zone, is_on)` for all six zones, in zone order.
    pub async fn zone_states(&self) -> Vec<(Zone, bool)> {
        let states = self.zone_states.read().await;
        Zone::ALL.iter().map(|zone| (*zone, states[zone.index()])).collect()
    }

    /// Overwrites the local state without sending anything.
    pub async fn set_local_state(&self, zone: Zone, is_on: bool) {
        self.zone_states.write().await[zone.index()] = is_on;
        self.events.emit(EngineEvent::ZoneStateChanged { zone, is_on });
    }

    /// Flips `zone` and commands the controller accordingly.
    ///
    /// Fails with `NotConnected` without touching local state when the transport is
    /// closed.
    pub async fn toggle_zone(&self, zone: Zone) -> Result<ToggleZoneResponse, ClientError> {
        if !self.connection_state.read().await.client_connected {
            return Err(ClientError::NotConnected);
        }

        let activate = {
            let mut states = self.zone_states.write().await;
            states[zone.index()] = !states[zone.index()];
            states[zone.index()]
        };
        self.events.emit(EngineEvent::ZoneStateChanged { zone, is_on: activate });
        info!("[ZoneControl] {} -> {}", zone, if activate { "on" } else { "off" });

        let payload = ToggleZonePayload {
            zone: zone.number(),
            activate,
        };
        match self.dispatcher.request::<_, ToggleZoneResponse>(TOGGLE_ZONE_MESSAGE_TYPE, &payload).await {
            Err(ClientError::NotConnected) => {
                // The transport closed between the check and the send; nothing went out.
                self.set_local_state(zone, !activate).await;
                Err(ClientError::NotConnected)
            }
            Ok(response) => {
                if !response.success {
                    warn!(
                        "[ZoneControl] {} rejected: {}",
                        zone,
                        response.error.as_deref().unwrap_or("no reason given")
                    );
                }
                Ok(response)
            }
            Err(e) => Err(e),
        }
    }
}
