// rust_websocket_utils/src/error.rs

//! Error type shared by the codec and both transports.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WsError {
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// The frame text or its payload could not be decoded.
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    #[error("WebSocket protocol error: {0}")]
    WebSocketProtocolError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("send failed: channel closed")]
    SendErrorClosed,

    #[error("send failed: peer disconnected ({0})")]
    SendErrorDisconnected(String),

    #[error("connection timed out")]
    ConnectionTimeout,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("not connected")]
    NotConnected,

    /// A frame the codec does not handle, e.g. a binary frame.
    #[error("message error: {0}")]
    Message(String),
}
