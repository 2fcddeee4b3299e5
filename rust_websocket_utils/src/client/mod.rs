// rust_websocket_utils/src/client/mod.rs

//! WebSocket client side: connection setup and frame-level send/receive on top of
//! `tokio-tungstenite`. Request correlation and session state live in the engine crate.

pub mod transport;
