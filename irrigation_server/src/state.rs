// irrigation_server/src/state.rs

//! The authority's copy of the irrigation configuration.

use crate::config::{load_irrigation_config, save_irrigation_config};
use crate::error::AppError;
use common_models::schedule_models::validate_schedules;
use common_models::ws_payloads::GetConfigResponse;
use common_models::Schedules;
use log::info;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Schedules and stagger flags as last accepted from a user, mirrored to a JSON file.
#[derive(Debug)]
pub struct IrrigationStore {
    /// In-memory copy served to `getConfig`.
    config: RwLock<GetConfigResponse>,
    /// Rewritten in full on every accepted `setSchedule`.
    config_file_path: PathBuf,
}

impl IrrigationStore {
    /// Loads the persisted configuration from `config_file_path`, or starts empty.
    pub fn load(config_file_path: &Path) -> Result<Self, AppError> {
        let config = load_irrigation_config(config_file_path)?;
        info!(
            "[IrrigationStore] {} schedule(s) loaded from '{}'",
            config.schedules.len(),
            config_file_path.display()
        );
        Ok(Self {
            config: RwLock::new(config),
            config_file_path: config_file_path.to_path_buf(),
        })
    }

    /// Current configuration, cloned out of the lock.
    pub async fn snapshot(&self) -> GetConfigResponse {
        self.config.read().await.clone()
    }

    /// Validates, stores and persists a full schedule list.
    ///
    /// Nothing changes if validation fails. If writing the file fails the in-memory copy
    /// is already replaced and the error is still returned.
    ///
    /// The write lock is held until the file is written, so the file always holds the
    /// most recently stored list.
    pub async fn replace_schedules(&self, schedules: Schedules) -> Result<(), AppError> {
        validate_schedules(&schedules).map_err(AppError::InvalidSchedules)?;

        let mut config = self.config.write().await;
        config.schedules = schedules;
        save_irrigation_config(&self.config_file_path, &config)?;
        info!("[IrrigationStore] {} schedule(s) stored", config.schedules.len());
        Ok(())
    }
}
