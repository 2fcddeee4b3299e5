// irrigation_client/src/lib.rs

//! Control-plane protocol engine for a remote irrigation controller.
//!
//! The engine keeps one WebSocket session to the authority, pairs requests with their
//! responses by correlation id, tracks controller liveness from heartbeats, mirrors the
//! schedule list with debounced pushes for dial edits, and issues zone toggles.
//! Collaborators (a UI, a CLI) read state snapshots, subscribe to `EngineEvent`s and call
//! the operations on `WebSocketClientService`.

pub mod config;
pub mod error;
pub mod event;
pub mod state;
pub mod ws_client;

pub use config::AppConfig;
pub use error::ClientError;
pub use event::EngineEvent;
pub use state::{ConnectionState, StaggerSettings};
pub use ws_client::{ConnectionHandle, ScheduleSynchronizer, WebSocketClientService, ZoneController};
