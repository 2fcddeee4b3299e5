// irrigation_server/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("WebSocket service error: {0}")]
    WebSocketService(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Invalid schedules: {0}")]
    InvalidSchedules(String),
}

impl From<rust_websocket_utils::WsError> for AppError {
    fn from(e: rust_websocket_utils::WsError) -> Self {
        AppError::WebSocketService(e.to_string())
    }
}
