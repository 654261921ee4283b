mod config;
pub mod database;
mod kv;
pub mod lease;
pub mod persistence;

pub use config::{next_exam_date, Config, CountdownDefaults, NotificationsConfig, PomodoroDefaults, RuntimeConfig};
pub use database::Database;
pub use kv::{KeyValueStore, MemoryStore};
pub use lease::RunLease;
pub use persistence::{PersistenceStore, Seeds, TimerConfigs};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `STUDYTIMER_DATA_DIR` overrides the location outright. Otherwise
/// `~/.config/studytimer/` is used, or `~/.config/studytimer-dev/` when
/// `STUDYTIMER_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("STUDYTIMER_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("STUDYTIMER_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("studytimer-dev")
            } else {
                base_dir.join("studytimer")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
