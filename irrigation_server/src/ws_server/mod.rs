// irrigation_server/src/ws_server/mod.rs

//! WebSocket side of the authority.

pub mod client_session;
pub mod connection_manager;
pub mod heartbeat_monitor;
pub mod message_router;
pub mod service;
