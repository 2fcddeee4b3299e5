// irrigation_client/src/main.rs

//! Headless runner: connects with the configured endpoint and logs engine events until
//! Ctrl-C. The settings file path may be given as the first argument.

use anyhow::Context;
use irrigation_client::config::init_app_config;
use irrigation_client::{EngineEvent, WebSocketClientService};
use log::{info, warn};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = init_app_config(std::env::args().nth(1).map(PathBuf::from));

    env_logger::Builder::new()
        .filter_level(config.log_level_filter())
        .format_timestamp_millis()
        .try_init()
        .context("initialising env_logger")?;

    info!("[IrrigationClient] starting");
    let service = WebSocketClientService::new(&config);
    let mut events = service.subscribe();

    let handle = service
        .connect_configured()
        .await
        .with_context(|| format!("connecting to {}", service.endpoint()))?;

    for (index, schedule) in service.schedule_sync().schedules().await.iter().enumerate() {
        info!(
            "[IrrigationClient] schedule {}: '{}' at {:02}:{:02}, {} zone(s), active={}",
            index,
            schedule.name,
            schedule.start_time_minutes / 60,
            schedule.start_time_minutes % 60,
            schedule.active_periods.len(),
            schedule.is_active
        );
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("[IrrigationClient] Ctrl-C received, closing");
                break;
            }
            event = events.recv() => match event {
                Ok(EngineEvent::ConnectionStatus { client_connected: false, .. }) => {
                    warn!("[IrrigationClient] connection lost");
                    break;
                }
                Ok(event) => info!("[IrrigationClient] {:?}", event),
                Err(RecvError::Lagged(skipped)) => warn!("[IrrigationClient] {} event(s) skipped", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    }

    service.close(&handle).await;
    Ok(())
}
