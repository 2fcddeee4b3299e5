// irrigation_server/src/main.rs

use anyhow::Context;
use irrigation_server::config::init_server_config;
use irrigation_server::{IrrigationStore, WsService};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = init_server_config(std::env::args().nth(1).map(PathBuf::from));

    env_logger::Builder::new()
        .filter_level(config.log_level_filter())
        .format_timestamp_millis()
        .try_init()
        .context("initialising env_logger")?;
    info!(
        "[Main] listening on {}:{}, heartbeat every {} ms, controller timeout {} ms",
        config.host, config.port, config.heartbeat_interval_ms, config.controller_timeout_ms
    );

    let store = Arc::new(
        IrrigationStore::load(&config.config_file_path)
            .with_context(|| format!("loading '{}'", config.config_file_path.display()))?,
    );
    let service = WsService::new(config, store);

    tokio::select! {
        result = service.start() => result.context("WebSocket service stopped")?,
        _ = tokio::signal::ctrl_c() => info!("[Main] Ctrl-C received, shutting down"),
    }
    Ok(())
}
