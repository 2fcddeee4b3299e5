// irrigation_server/src/ws_server/message_router.rs

//! Handles inbound text frames after the identity preamble.
//!
//! Every answer to a user request copies the request's `id`. Frames that do not decode
//! as an envelope, and envelopes of types the user may not send, are logged and dropped.

use crate::error::AppError;
use crate::state::IrrigationStore;
use crate::ws_server::client_session::ClientSession;
use crate::ws_server::connection_manager::ConnectionManager;
use common_models::ws_payloads::{
    AckResponse, KeepAliveResponse, SetSchedulePayload, StatusResponse, ToggleZonePayload, GET_CONFIG_MESSAGE_TYPE,
    GET_CONFIG_RESPONSE_MESSAGE_TYPE, KEEP_ALIVE_MESSAGE_TYPE, KEEP_ALIVE_RESPONSE_MESSAGE_TYPE,
    SET_SCHEDULE_MESSAGE_TYPE, SET_SCHEDULE_RESPONSE_MESSAGE_TYPE, STATUS_MESSAGE_TYPE, STATUS_RESPONSE_MESSAGE_TYPE,
    TOGGLE_ZONE_MESSAGE_TYPE, TOGGLE_ZONE_RESPONSE_MESSAGE_TYPE,
};
use common_models::{ClientType, Zone};
use log::{debug, error, info, warn};
use rust_websocket_utils::message::WsMessage;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Error text of a `toggleZoneResponse` when no controller can take the command.
pub const CONTROLLER_NOT_CONNECTED: &str = "controller not connected";

/// Dispatches decoded envelopes by sender role and message type.
pub struct MessageRouter {
    /// Used to reach the controller and to judge its liveness for `status`.
    connection_manager: Arc<ConnectionManager>,
    /// Answers `getConfig` and stores `setSchedule`.
    store: Arc<IrrigationStore>,
    controller_timeout: Duration,
}

impl MessageRouter {
    pub fn new(connection_manager: Arc<ConnectionManager>, store: Arc<IrrigationStore>, controller_timeout: Duration) -> Self {
        Self {
            connection_manager,
            store,
            controller_timeout,
        }
    }

    /// Handles one text frame from `session`.
    ///
    /// Any frame, even one that fails to decode, refreshes the session's `last_seen`.
    /// Answers are queued on the session itself; nothing is returned to the caller.
    pub async fn handle_frame(&self, session: &Arc<ClientSession>, text: &str) {
        session.touch().await;

        let message = match WsMessage::from_text(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("[MessageRouter] {} {}: undecodable frame dropped: {}", session.client_type, session.session_id, e);
                return;
            }
        };
        debug!(
            "[MessageRouter] {} {}: '{}' (id {:?})",
            session.client_type, session.session_id, message.message_type, message.id
        );

        match session.client_type {
            ClientType::User => self.handle_user_message(session, message).await,
            ClientType::Controller => self.handle_controller_message(session, message),
        }
    }

    async fn handle_user_message(&self, session: &Arc<ClientSession>, message: WsMessage) {
        match message.message_type.as_str() {
            KEEP_ALIVE_MESSAGE_TYPE => reply(session, &message, KEEP_ALIVE_RESPONSE_MESSAGE_TYPE, &KeepAliveResponse {}),
            STATUS_MESSAGE_TYPE => {
                let is_controller_connected = self.connection_manager.is_controller_alive(self.controller_timeout).await;
                reply(session, &message, STATUS_RESPONSE_MESSAGE_TYPE, &StatusResponse { is_controller_connected });
            }
            TOGGLE_ZONE_MESSAGE_TYPE => {
                let ack = self.toggle_zone(&message);
                reply(session, &message, TOGGLE_ZONE_RESPONSE_MESSAGE_TYPE, &ack);
            }
            SET_SCHEDULE_MESSAGE_TYPE => {
                let ack = match self.set_schedule(&message).await {
                    Ok(()) => AckResponse::ok(),
                    Err(e) => {
                        warn!("[MessageRouter] setSchedule rejected: {}", e);
                        AckResponse::failed(e.to_string())
                    }
                };
                reply(session, &message, SET_SCHEDULE_RESPONSE_MESSAGE_TYPE, &ack);
            }
            GET_CONFIG_MESSAGE_TYPE => {
                let config = self.store.snapshot().await;
                reply(session, &message, GET_CONFIG_RESPONSE_MESSAGE_TYPE, &config);
            }
            other => warn!("[MessageRouter] user sent unsupported type '{}', dropped", other),
        }
    }

    /// Forwards the command to the controller. The acknowledgement only says it was
    /// handed over, not that a valve moved.
    fn toggle_zone(&self, message: &WsMessage) -> AckResponse {
        let payload: ToggleZonePayload = match message.deserialize_payload() {
            Ok(payload) => payload,
            Err(e) => return AckResponse::failed(format!("invalid toggleZone payload: {}", e)),
        };
        let Some(zone) = Zone::from_number(payload.zone) else {
            return AckResponse::failed(format!("unknown zone {}", payload.zone));
        };

        let Some(controller) = self.connection_manager.get_client(ClientType::Controller) else {
            return AckResponse::failed(CONTROLLER_NOT_CONNECTED);
        };
        let command = match WsMessage::new(TOGGLE_ZONE_MESSAGE_TYPE, &payload) {
            Ok(command) => command,
            Err(e) => return AckResponse::failed(e.to_string()),
        };
        if controller.send(&command) {
            info!("[MessageRouter] {} {} forwarded to controller", zone, if payload.activate { "on" } else { "off" });
            AckResponse::ok()
        } else {
            AckResponse::failed(CONTROLLER_NOT_CONNECTED)
        }
    }

    async fn set_schedule(&self, message: &WsMessage) -> Result<(), AppError> {
        let payload: SetSchedulePayload = message
            .deserialize_payload()
            .map_err(|e| AppError::InvalidSchedules(e.to_string()))?;
        self.store.replace_schedules(payload.schedules).await
    }

    fn handle_controller_message(&self, session: &Arc<ClientSession>, message: WsMessage) {
        match message.message_type.as_str() {
            KEEP_ALIVE_MESSAGE_TYPE => reply(session, &message, KEEP_ALIVE_RESPONSE_MESSAGE_TYPE, &KeepAliveResponse {}),
            TOGGLE_ZONE_RESPONSE_MESSAGE_TYPE => match message.deserialize_payload::<AckResponse>() {
                Ok(ack) if ack.success => debug!("[MessageRouter] controller applied a zone command"),
                Ok(ack) => warn!(
                    "[MessageRouter] controller refused a zone command: {}",
                    ack.error.as_deref().unwrap_or("no reason given")
                ),
                Err(e) => warn!("[MessageRouter] controller sent a bad toggleZoneResponse: {}", e),
            },
            other => debug!("[MessageRouter] controller '{}' ignored", other),
        }
    }
}

fn reply<T: Serialize>(session: &ClientSession, request: &WsMessage, response_type: &str, payload: &T) {
    match request.reply(response_type, payload) {
        Ok(response) => {
            if !session.send(&response) {
                debug!("[MessageRouter] {} gone before '{}' was sent", session.session_id, response_type);
            }
        }
        Err(e) => error!("[MessageRouter] building '{}' failed: {}", response_type, e),
    }
}
