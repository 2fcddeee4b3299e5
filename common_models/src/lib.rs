// common_models/src/lib.rs

//! `common_models` shared model crate.
//!
//! This crate holds the data structures and enums shared by every Rust component of
//! the irrigation control plane: the client protocol engine (`irrigation_client`), the
//! compatible remote authority (`irrigation_server`) and the transport utilities
//! (`rust_websocket_utils`). The web dashboard mirrors the same shapes in TypeScript,
//! so field names are serialized in camelCase.
//!
//! Modules:
//! - **`enums`**: fixed enumerations (`Zone`, `Day`, `ClientType`).
//! - **`schedule_models`**: `ActivePeriod`, `Schedule` and the `Schedules` list, with the
//!   helpers that keep an active period set unique per zone and free of zero durations.
//! - **`ws_payloads`**: the message type catalog (request/response pairing and
//!   classification) and the payload struct of every message type.
//!
//! All models derive `Serialize`, `Deserialize`, `Debug` and `Clone`.

pub mod enums;
pub mod schedule_models;
pub mod ws_payloads;

pub use enums::{ClientType, Day, Zone};
pub use schedule_models::{ActivePeriod, Schedule, Schedules};
