// irrigation_server/src/config.rs

//! Server settings and the persisted irrigation configuration.
//!
//! Both live in JSON files. A missing settings file is created with the defaults; a
//! missing irrigation configuration file means "no schedules yet" and is only written on
//! the first `setSchedule`.

use crate::error::AppError;
use common_models::ws_payloads::GetConfigResponse;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SETTINGS_FILE: &str = "config/irrigation_server.json";
pub const DEFAULT_IRRIGATION_CONFIG_FILE: &str = "config/irrigation_config.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Period of the liveness check and of the `controllerHeartbeat` push.
    pub heartbeat_interval_ms: u64,
    /// A controller silent for longer than this is reported as disconnected.
    pub controller_timeout_ms: u64,
    /// Where schedules and stagger flags are persisted.
    pub config_file_path: PathBuf,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            heartbeat_interval_ms: 5_000,
            controller_timeout_ms: 15_000,
            config_file_path: PathBuf::from(DEFAULT_IRRIGATION_CONFIG_FILE),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::ConfigError(format!("invalid listen address {}:{}: {}", self.host, self.port, e)))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn controller_timeout(&self) -> Duration {
        Duration::from_millis(self.controller_timeout_ms)
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

fn write_pretty_json<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| format!("creating '{}' failed: {}", parent.display(), e))?;
        }
    }
    let content = serde_json::to_string_pretty(value).map_err(|e| format!("serializing failed: {}", e))?;
    fs::write(path, content).map_err(|e| format!("writing '{}' failed: {}", path.display(), e))
}

/// Reads the server settings, writing the defaults if the file does not exist.
pub fn load_server_config(path: &Path) -> Result<ServerConfig, AppError> {
    if !path.exists() {
        info!("[Config] '{}' not found, writing defaults", path.display());
        let default_config = ServerConfig::default();
        write_pretty_json(path, &default_config).map_err(AppError::ConfigError)?;
        return Ok(default_config);
    }
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::ConfigError(format!("reading '{}' failed: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::ConfigError(format!("parsing '{}' failed: {}", path.display(), e)))
}

/// Startup helper. A broken settings file falls back to the defaults.
pub fn init_server_config(path: Option<PathBuf>) -> ServerConfig {
    let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    match load_server_config(&path) {
        Ok(config) => config,
        Err(e) => {
            error!("[Config] {}. Using defaults.", e);
            ServerConfig::default()
        }
    }
}

/// Loads `{schedules, staggerOn, staggerZones}`. A missing file yields empty defaults.
pub fn load_irrigation_config(path: &Path) -> Result<GetConfigResponse, AppError> {
    if !path.exists() {
        info!("[Config] no irrigation configuration at '{}', starting empty", path.display());
        return Ok(GetConfigResponse::default());
    }
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::PersistenceError(format!("reading '{}' failed: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::PersistenceError(format!("parsing '{}' failed: {}", path.display(), e)))
}

pub fn save_irrigation_config(path: &Path, config: &GetConfigResponse) -> Result<(), AppError> {
    write_pretty_json(path, config).map_err(AppError::PersistenceError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_models::{ActivePeriod, Schedule, Zone};
    use tempfile::tempdir;

    #[test]
    fn test_settings_defaults_are_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("server.json");
        let config = load_server_config(&path).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert!(path.exists());
        assert_eq!(config.listen_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_missing_irrigation_config_is_empty() {
        let dir = tempdir().unwrap();
        let loaded = load_irrigation_config(&dir.path().join("irrigation.json")).unwrap();
        assert!(loaded.schedules.is_empty());
        assert!(!loaded.stagger_on);
        assert!(!dir.path().join("irrigation.json").exists());
    }

    #[test]
    fn test_irrigation_config_persists_as_pretty_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("irrigation.json");
        let mut schedule = Schedule::numbered(1);
        schedule.upsert_active_period(ActivePeriod::new(Zone::Zone2, 15));
        let config = GetConfigResponse {
            schedules: vec![schedule],
            stagger_on: true,
            stagger_zones: false,
        };

        save_irrigation_config(&path, &config).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n"));
        assert!(text.contains("\"staggerOn\": true"));
        assert_eq!(load_irrigation_config(&path).unwrap(), config);
    }

    #[test]
    fn test_corrupt_irrigation_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("irrigation.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_irrigation_config(&path), Err(AppError::PersistenceError(_))));
    }
}
