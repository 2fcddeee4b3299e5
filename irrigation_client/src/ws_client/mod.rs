// irrigation_client/src/ws_client/mod.rs

//! The protocol engine.
//!
//! - `service::WebSocketClientService`: Connection Manager and public facade. Owns the
//!   session (reader, writer and keep-alive tasks) and routes inbound frames.
//! - `dispatcher` / `correlator`: outbound requests and their pairing with responses.
//! - `heartbeat`: controller liveness from `controllerHeartbeat` pushes.
//! - `schedule_sync`: the schedule mirror with immediate and debounced pushes.
//! - `zone_control`: optimistic zone toggles.
//!
//! Inbound flow: socket → reader task → `WsMessage` → heartbeat monitor (unsolicited)
//! or correlator (responses) → awaiting caller.

pub mod correlator;
pub mod dispatcher;
pub mod heartbeat;
pub mod schedule_sync;
pub mod service;
pub mod zone_control;

pub use schedule_sync::ScheduleSynchronizer;
pub use service::{ConnectionHandle, WebSocketClientService};
pub use zone_control::ZoneController;
