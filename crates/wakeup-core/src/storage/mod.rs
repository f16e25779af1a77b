mod alarm_db;
mod config;
pub mod database;
pub mod migrations;
mod registry_db;

pub use alarm_db::AlarmDb;
pub use config::{
    Config, DefaultsConfig, HolidaysConfig, HorizonConfig, ReplenishConfig, SchedulerConfig,
};
pub use database::Database;
pub use registry_db::RegistryDb;

use std::path::PathBuf;

use crate::error::Result;

/// Returns the data directory, creating it if needed.
///
/// `WAKEUP_DATA_DIR` wins when set. Otherwise `~/.config/wakeup[-dev]/`
/// based on `WAKEUP_ENV` (set `WAKEUP_ENV=dev` for the development directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("WAKEUP_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("WAKEUP_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("wakeup-dev")
            } else {
                base_dir.join("wakeup")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
