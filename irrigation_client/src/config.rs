// irrigation_client/src/config.rs

//! Engine configuration.
//!
//! Loaded from a JSON settings file (a missing file is created with the defaults), then
//! overridden from the environment:
//!
//! | variable | field |
//! |---|---|
//! | `IRRIGATION_WS_HOST` | `host` |
//! | `IRRIGATION_WS_PORT` | `port` |
//! | `IRRIGATION_WS_PATH` | `path` |

use crate::error::ClientError;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_WS_HOST: &str = "IRRIGATION_WS_HOST";
pub const ENV_WS_PORT: &str = "IRRIGATION_WS_PORT";
pub const ENV_WS_PATH: &str = "IRRIGATION_WS_PATH";

pub const DEFAULT_CONFIG_FILE: &str = "config/irrigation_client.json";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// URL path of the WebSocket endpoint, e.g. `/ws`.
    pub path: String,
    pub request_timeout_ms: u64,
    /// Quiet window for coalescing active-period edits.
    pub debounce_ms: u64,
    /// Interval of the `keepAlive` loop. 0 disables it.
    pub keep_alive_interval_secs: u64,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            path: "/".to_string(),
            request_timeout_ms: 10_000,
            debounce_ms: 1_000,
            keep_alive_interval_secs: 0,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// `ws://{host}:{port}{path}`, with `path` forced to start with `/`.
    pub fn endpoint_url(&self) -> String {
        if self.path.starts_with('/') {
            format!("ws://{}:{}{}", self.host, self.port, self.path)
        } else {
            format!("ws://{}:{}/{}", self.host, self.port, self.path)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn keep_alive_interval(&self) -> Option<Duration> {
        (self.keep_alive_interval_secs > 0).then(|| Duration::from_secs(self.keep_alive_interval_secs))
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }

    /// Applies the endpoint overrides. `lookup` is `std::env::var` in production.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_WS_HOST) {
            self.host = host;
        }
        if let Some(port) = lookup(ENV_WS_PORT) {
            self.port = port
                .trim()
                .parse()
                .map_err(|e| ClientError::Config(format!("{}='{}': {}", ENV_WS_PORT, port, e)))?;
        }
        if let Some(path) = lookup(ENV_WS_PATH) {
            self.path = path;
        }
        Ok(())
    }
}

/// Reads `config_file_path`, or writes and returns the defaults if it does not exist.
pub fn load_app_config(config_file_path: &Path) -> Result<AppConfig, ClientError> {
    if config_file_path.exists() {
        let config_content = fs::read_to_string(config_file_path)
            .map_err(|e| ClientError::Config(format!("reading '{}' failed: {}", config_file_path.display(), e)))?;
        serde_json::from_str(&config_content)
            .map_err(|e| ClientError::Config(format!("parsing '{}' failed: {}", config_file_path.display(), e)))
    } else {
        info!("[Config] '{}' not found, writing defaults", config_file_path.display());
        let default_config = AppConfig::default();
        save_app_config(config_file_path, &default_config)?;
        Ok(default_config)
    }
}

pub fn save_app_config(config_file_path: &Path, app_config: &AppConfig) -> Result<(), ClientError> {
    if let Some(parent_dir) = config_file_path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            fs::create_dir_all(parent_dir)
                .map_err(|e| ClientError::Config(format!("creating '{}' failed: {}", parent_dir.display(), e)))?;
        }
    }

    let config_content = serde_json::to_string_pretty(app_config)
        .map_err(|e| ClientError::Config(format!("serializing config failed: {}", e)))?;
    fs::write(config_file_path, config_content)
        .map_err(|e| ClientError::Config(format!("writing '{}' failed: {}", config_file_path.display(), e)))?;
    Ok(())
}

/// Startup helper: file, then environment. Falls back to defaults on a broken file.
pub fn init_app_config(config_file_path: Option<PathBuf>) -> AppConfig {
    let config_file_path = config_file_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = match load_app_config(&config_file_path) {
        Ok(config) => config,
        Err(e) => {
            error!("[Config] {}. Using defaults.", e);
            AppConfig::default()
        }
    };
    if let Err(e) = config.apply_overrides(|key| std::env::var(key).ok()) {
        warn!("[Config] ignoring environment override: {}", e);
    }
    info!("[Config] endpoint {}", config.endpoint_url());
    config
}
