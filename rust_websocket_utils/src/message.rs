// rust_websocket_utils/src/message.rs

//! Wire Codec: the JSON envelope exchanged after the identity preamble.
//!
//! Every frame is a text frame carrying `{"type": string, "payload": object, "id"?: u64}`.
//! `id` is the correlation identifier. A request carries the id assigned by its
//! sender and the response echoes it; unsolicited pushes have none.
//!
//! Decoding never looks at whether `type` is known. Use [`WsMessage::kind`] to classify
//! a decoded frame against the message catalog in `common_models::ws_payloads`.

use crate::error::WsError;
use common_models::ws_payloads::{self, MessageKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WsMessage {
    /// Message type, e.g. `getConfig` or `controllerHeartbeat`.
    #[serde(rename = "type")]
    pub message_type: String,

    /// Type-specific payload. Always a JSON object; absent on the wire means `{}`.
    #[serde(default = "empty_object")]
    pub payload: Value,

    /// Correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl WsMessage {
    /// Builds an envelope without a correlation id.
    ///
    /// Fails with `SerializationError` if the payload cannot be serialized or does not
    /// serialize to a JSON object.
    pub fn new<T: Serialize>(message_type: impl Into<String>, payload_data: &T) -> Result<WsMessage, WsError> {
        let message_type = message_type.into();
        let payload = serde_json::to_value(payload_data).map_err(|e| {
            WsError::SerializationError(format!("payload of '{}' could not be serialized: {}", message_type, e))
        })?;
        if !payload.is_object() {
            return Err(WsError::SerializationError(format!(
                "payload of '{}' must serialize to a JSON object, got {}",
                message_type, payload
            )));
        }
        Ok(WsMessage {
            message_type,
            payload,
            id: None,
        })
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Builds the answer to `self`: `response_type` with `payload_data`, echoing `self.id`.
    pub fn reply<T: Serialize>(&self, response_type: impl Into<String>, payload_data: &T) -> Result<WsMessage, WsError> {
        let mut response = WsMessage::new(response_type, payload_data)?;
        response.id = self.id;
        Ok(response)
    }

    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T, WsError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            WsError::DeserializationError(format!(
                "payload of '{}' did not match the expected shape: {}, payload: {}",
                self.message_type, e, self.payload
            ))
        })
    }

    pub fn kind(&self) -> MessageKind {
        ws_payloads::classify(&self.message_type)
    }

    pub fn to_text(&self) -> Result<String, WsError> {
        serde_json::to_string(self)
            .map_err(|e| WsError::SerializationError(format!("envelope could not be serialized: {}", e)))
    }

    /// Decodes one text frame. A non-object `payload` is rejected.
    pub fn from_text(text: &str) -> Result<WsMessage, WsError> {
        let message: WsMessage = serde_json::from_str(text)
            .map_err(|e| WsError::DeserializationError(format!("frame is not a valid envelope: {}, text: '{}'", e, text)))?;
        if !message.payload.is_object() {
            return Err(WsError::DeserializationError(format!(
                "payload of '{}' is not a JSON object: {}",
                message.message_type, message.payload
            )));
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_models::ws_payloads::{
        ControllerHeartbeatPayload, EmptyPayload, ToggleZonePayload, GET_CONFIG_MESSAGE_TYPE,
        TOGGLE_ZONE_MESSAGE_TYPE, TOGGLE_ZONE_RESPONSE_MESSAGE_TYPE,
    };

    #[test]
    fn test_request_envelope_wire_shape() {
        let message = WsMessage::new(TOGGLE_ZONE_MESSAGE_TYPE, &ToggleZonePayload { zone: 3, activate: true })
            .unwrap()
            .with_id(7);
        let value: Value = serde_json::from_str(&message.to_text().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "toggleZone", "payload": {"zone": 3, "activate": true}, "id": 7})
        );
    }

    #[test]
    fn test_envelope_without_id_omits_field() {
        let message = WsMessage::new(GET_CONFIG_MESSAGE_TYPE, &EmptyPayload {}).unwrap();
        assert_eq!(message.to_text().unwrap(), r#"{"type":"getConfig","payload":{}}"#);
    }

    #[test]
    fn test_reply_echoes_correlation_id() {
        let request = WsMessage::new(TOGGLE_ZONE_MESSAGE_TYPE, &ToggleZonePayload { zone: 1, activate: false })
            .unwrap()
            .with_id(42);
        let response = request
            .reply(TOGGLE_ZONE_RESPONSE_MESSAGE_TYPE, &serde_json::json!({"success": true}))
            .unwrap();
        assert_eq!(response.id, Some(42));
        assert_eq!(response.kind(), MessageKind::Response);
    }

    #[test]
    fn test_decode_missing_payload_defaults_to_empty_object() {
        let message = WsMessage::from_text(r#"{"type":"keepAliveResponse"}"#).unwrap();
        assert_eq!(message.payload, serde_json::json!({}));
        assert_eq!(message.id, None);
    }

    #[test]
    fn test_decode_rejects_malformed_frames() {
        assert!(matches!(WsMessage::from_text("user"), Err(WsError::DeserializationError(_))));
        assert!(matches!(WsMessage::from_text(r#"{"payload":{}}"#), Err(WsError::DeserializationError(_))));
        assert!(matches!(
            WsMessage::from_text(r#"{"type":"status","payload":[1,2]}"#),
            Err(WsError::DeserializationError(_))
        ));
    }

    #[test]
    fn test_unknown_type_decodes_and_classifies_as_unknown() {
        let message = WsMessage::from_text(r#"{"type":"firmwareUpdate","payload":{"v":2}}"#).unwrap();
        assert_eq!(message.kind(), MessageKind::Unknown);
    }

    #[test]
    fn test_new_rejects_non_object_payload() {
        assert!(matches!(WsMessage::new("status", &5u32), Err(WsError::SerializationError(_))));
    }

    #[test]
    fn test_deserialize_payload_to_mismatched_type() {
        let message = WsMessage::from_text(r#"{"type":"controllerHeartbeat","payload":{"isControllerConnected":true}}"#).unwrap();
        let heartbeat: ControllerHeartbeatPayload = message.deserialize_payload().unwrap();
        assert!(heartbeat.is_controller_connected);

        let mismatched: Result<ToggleZonePayload, WsError> = message.deserialize_payload();
        assert!(matches!(mismatched, Err(WsError::DeserializationError(_))));
    }
}
