// rust_websocket_utils/src/server/mod.rs

//! WebSocket server side: listening, handshakes, and handing each upgraded stream to
//! application code through a callback.

pub mod transport;
