// irrigation_client/src/error.rs

//! Errors reported by the protocol engine.

use common_models::ws_payloads::AckResponse;
use rust_websocket_utils::error::WsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// A send was attempted while the transport is not open.
    #[error("not connected")]
    NotConnected,

    /// No matching response arrived within the request timeout.
    #[error("request '{0}' timed out")]
    Timeout(String),

    /// The transport closed while the request was in flight.
    #[error("connection lost")]
    ConnectionLost,

    /// The authority answered with `success=false`.
    #[error("rejected by remote: {0}")]
    RemoteRejected(String),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("'{0}' is not a request type")]
    UnknownRequestType(String),

    #[error("transport error: {0}")]
    Transport(#[from] WsError),

    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("start time {0} is outside 0..1440 minutes")]
    InvalidStartTime(u32),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Turns a `{success, error?}` acknowledgement into `Ok(())` or `RemoteRejected`.
    pub fn check_ack(ack: AckResponse) -> Result<(), ClientError> {
        ack.into_result().map_err(ClientError::RemoteRejected)
    }

    /// Transport-level failures: the exchange itself did not complete.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            ClientError::NotConnected | ClientError::Timeout(_) | ClientError::ConnectionLost | ClientError::Transport(_)
        )
    }
}
