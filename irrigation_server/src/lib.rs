// irrigation_server/src/lib.rs

//! Compatible irrigation authority.
//!
//! Accepts one `user` and one `controller` WebSocket session, routes user requests,
//! forwards zone commands to the controller, tracks controller liveness and pushes it to
//! the user as `controllerHeartbeat`, and persists the schedule configuration as JSON.
//!
//! - `config`: server settings and the persisted irrigation configuration.
//! - `error`: `AppError`.
//! - `state`: the in-memory irrigation configuration store.
//! - `ws_server`: sessions, routing, heartbeat monitor and the accept loop.

pub mod config;
pub mod error;
pub mod state;
pub mod ws_server;

pub use config::ServerConfig;
pub use error::AppError;
pub use state::IrrigationStore;
pub use ws_server::service::WsService;
