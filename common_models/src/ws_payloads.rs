// common_models/src/ws_payloads.rs

//! Message type catalog and payload structures of the control-plane protocol.
//!
//! Every JSON frame is an envelope `{type, payload, id?}` (see
//! `rust_websocket_utils::message::WsMessage`). This module owns the `type` strings,
//! the pairing between each request and its single response type, and the payload
//! struct carried by every type. Payload fields are camelCase on the wire.

use crate::schedule_models::Schedules;
use serde::{Deserialize, Serialize};

/// Plain-text preamble a user client sends right after the socket opens.
pub const USER_IDENTITY_TOKEN: &str = "user";

// Client -> server requests.
pub const KEEP_ALIVE_MESSAGE_TYPE: &str = "keepAlive";
pub const TOGGLE_ZONE_MESSAGE_TYPE: &str = "toggleZone";
pub const STATUS_MESSAGE_TYPE: &str = "status";
pub const SET_SCHEDULE_MESSAGE_TYPE: &str = "setSchedule";
pub const GET_CONFIG_MESSAGE_TYPE: &str = "getConfig";

// Server -> client responses.
pub const KEEP_ALIVE_RESPONSE_MESSAGE_TYPE: &str = "keepAliveResponse";
pub const TOGGLE_ZONE_RESPONSE_MESSAGE_TYPE: &str = "toggleZoneResponse";
pub const STATUS_RESPONSE_MESSAGE_TYPE: &str = "statusResponse";
pub const SET_SCHEDULE_RESPONSE_MESSAGE_TYPE: &str = "setScheduleResponse";
pub const GET_CONFIG_RESPONSE_MESSAGE_TYPE: &str = "getConfigResponse";

// Server -> client unsolicited push.
pub const CONTROLLER_HEARTBEAT_MESSAGE_TYPE: &str = "controllerHeartbeat";

/// (request, response) pairs. Each request has exactly one response type.
const REQUEST_RESPONSE_PAIRS: [(&str, &str); 5] = [
    (KEEP_ALIVE_MESSAGE_TYPE, KEEP_ALIVE_RESPONSE_MESSAGE_TYPE),
    (TOGGLE_ZONE_MESSAGE_TYPE, TOGGLE_ZONE_RESPONSE_MESSAGE_TYPE),
    (STATUS_MESSAGE_TYPE, STATUS_RESPONSE_MESSAGE_TYPE),
    (SET_SCHEDULE_MESSAGE_TYPE, SET_SCHEDULE_RESPONSE_MESSAGE_TYPE),
    (GET_CONFIG_MESSAGE_TYPE, GET_CONFIG_RESPONSE_MESSAGE_TYPE),
];

/// Family a message type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
    Unsolicited,
    Unknown,
}

pub fn classify(message_type: &str) -> MessageKind {
    if message_type == CONTROLLER_HEARTBEAT_MESSAGE_TYPE {
        MessageKind::Unsolicited
    } else if REQUEST_RESPONSE_PAIRS.iter().any(|(req, _)| *req == message_type) {
        MessageKind::Request
    } else if REQUEST_RESPONSE_PAIRS.iter().any(|(_, resp)| *resp == message_type) {
        MessageKind::Response
    } else {
        MessageKind::Unknown
    }
}

/// The response type that answers `request_type`, or `None` if it is not a request.
pub fn response_type_for(request_type: &str) -> Option<&'static str> {
    REQUEST_RESPONSE_PAIRS
        .iter()
        .find(|(req, _)| *req == request_type)
        .map(|(_, resp)| *resp)
}

/// The request type answered by `response_type`, or `None` if it is not a response.
pub fn expected_request_for(response_type: &str) -> Option<&'static str> {
    REQUEST_RESPONSE_PAIRS
        .iter()
        .find(|(_, resp)| *resp == response_type)
        .map(|(req, _)| *req)
}

/// `{}` payload of `keepAlive`, `status`, `getConfig` and `keepAliveResponse`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct EmptyPayload {}

pub type KeepAlivePayload = EmptyPayload;
pub type KeepAliveResponse = EmptyPayload;
pub type StatusPayload = EmptyPayload;
pub type GetConfigPayload = EmptyPayload;

/// `toggleZone` request. `zone` is the 1-based zone number.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleZonePayload {
    pub zone: u8,
    pub activate: bool,
}

/// `{success, error?}` acknowledgement shared by `toggleZoneResponse` and
/// `setScheduleResponse`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AckResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }

    /// Maps a `success=false` acknowledgement to its error text.
    pub fn into_result(self) -> Result<(), String> {
        if self.success {
            Ok(())
        } else {
            Err(self.error.unwrap_or_else(|| "rejected without reason".to_string()))
        }
    }
}

pub type ToggleZoneResponse = AckResponse;
pub type SetScheduleResponse = AckResponse;

/// `statusResponse` payload.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub is_controller_connected: bool,
}

/// `controllerHeartbeat` push payload.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ControllerHeartbeatPayload {
    pub is_controller_connected: bool,
}

/// `setSchedule` request: the full ordered list, replacing whatever the authority had.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SetSchedulePayload {
    pub schedules: Schedules,
}

/// `getConfigResponse` payload. Also the shape the server persists.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GetConfigResponse {
    #[serde(default)]
    pub schedules: Schedules,
    #[serde(default)]
    pub stagger_on: bool,
    #[serde(default)]
    pub stagger_zones: bool,
}
