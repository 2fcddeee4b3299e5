// rust_websocket_utils/src/lib.rs

//! `rust_websocket_utils` wraps `tokio-tungstenite` for the irrigation control plane.
//!
//! Modules:
//! - `message`: the JSON envelope `WsMessage` (`{type, payload, id?}`) and its text codec.
//! - `error`: the unified `WsError` used by both transports.
//! - `frame`: reading the next text frame from either side of a connection.
//! - `client`: connecting to an endpoint URL, sending and receiving envelopes.
//! - `server`: a TCP accept loop that upgrades connections and hands them to a callback.

pub mod client;
pub mod frame;
pub mod error;
pub mod message;
pub mod server;

pub use error::WsError;
pub use message::WsMessage;
