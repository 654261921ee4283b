//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Defaults for new pomodoro timers (and the first-run seed)
//! - The default exam countdown
//! - Notification preferences
//! - Tick loop cadence
//!
//! Configuration is stored at `~/.config/studytimer/config.toml`.

use chrono::{DateTime, Datelike, Duration, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::timer::{CountdownTimerConfig, PomodoroTimerConfig};

/// Defaults for pomodoro timer definitions. Durations in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PomodoroDefaults {
    #[serde(default = "default_pomodoro_name")]
    pub default_name: String,
    #[serde(default = "default_work_duration")]
    pub work_duration_min: u32,
    #[serde(default = "default_break_duration")]
    pub break_duration_min: u32,
    #[serde(default = "default_long_break_duration")]
    pub long_break_duration_min: u32,
    #[serde(default = "default_sessions_before_long_break")]
    pub sessions_before_long_break: u32,
}

/// Default countdown seeded on first run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountdownDefaults {
    #[serde(default = "default_countdown_name")]
    pub default_name: String,
    /// Fixed exam date; when unset the next 17 June, 10:00 (UTC+3) is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_date: Option<DateTime<Utc>>,
    #[serde(default = "default_color")]
    pub default_color: String,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Tick loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// How often a foreground run loop re-issues advisory notifications.
    #[serde(default = "default_refresh_interval_min")]
    pub refresh_interval_min: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/studytimer/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pomodoro: PomodoroDefaults,
    #[serde(default)]
    pub countdown: CountdownDefaults,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

// Default functions
fn default_pomodoro_name() -> String {
    "Standard Pomodoro".into()
}
fn default_work_duration() -> u32 {
    25
}
fn default_break_duration() -> u32 {
    5
}
fn default_long_break_duration() -> u32 {
    15
}
fn default_sessions_before_long_break() -> u32 {
    4
}
fn default_countdown_name() -> String {
    "Time left until the exam".into()
}
fn default_color() -> String {
    "#3b82f6".into()
}
fn default_true() -> bool {
    true
}
fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_refresh_interval_min() -> u64 {
    15
}

const EXAM_UTC_OFFSET_SECS: i32 = 3 * 3600;

impl Default for PomodoroDefaults {
    fn default() -> Self {
        Self {
            default_name: default_pomodoro_name(),
            work_duration_min: default_work_duration(),
            break_duration_min: default_break_duration(),
            long_break_duration_min: default_long_break_duration(),
            sessions_before_long_break: default_sessions_before_long_break(),
        }
    }
}

impl Default for CountdownDefaults {
    fn default() -> Self {
        Self {
            default_name: default_countdown_name(),
            exam_date: None,
            default_color: default_color(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            refresh_interval_min: default_refresh_interval_min(),
        }
    }
}

impl PomodoroDefaults {
    /// Build a pomodoro definition from these defaults.
    pub fn build(&self, name: Option<&str>) -> Result<PomodoroTimerConfig, crate::error::ValidationError> {
        PomodoroTimerConfig::new(
            name.unwrap_or(&self.default_name),
            u64::from(self.work_duration_min) * 60,
            u64::from(self.break_duration_min) * 60,
            u64::from(self.long_break_duration_min) * 60,
            self.sessions_before_long_break,
        )
    }
}

impl CountdownDefaults {
    /// Target for the seeded countdown.
    pub fn exam_target(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.exam_date.unwrap_or_else(|| next_exam_date(now))
    }
}

/// Next 17 June, 10:00 at UTC+3 strictly after `now`.
pub fn next_exam_date(now: DateTime<Utc>) -> DateTime<Utc> {
    let offset = FixedOffset::east_opt(EXAM_UTC_OFFSET_SECS);
    [now.year(), now.year() + 1]
        .into_iter()
        .filter_map(|year| {
            offset
                .and_then(|tz| tz.with_ymd_and_hms(year, 6, 17, 10, 0, 0).single())
                .map(|t| t.with_timezone(&Utc))
        })
        .find(|t| *t > now)
        .unwrap_or_else(|| now + Duration::days(365))
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                // Optional fields are absent from the serialized form until set.
                let existing = obj.get(part).cloned().unwrap_or(serde_json::Value::Null);
                if existing.is_null() && !Self::is_optional_key(key) {
                    return Err(ConfigError::UnknownKey(key.to_string()));
                }

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    fn is_optional_key(key: &str) -> bool {
        key == "countdown.exam_date"
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Update a value in memory by dot-separated key, keeping its type.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// First-run definitions derived from this config.
    pub fn seeds(&self, now: DateTime<Utc>) -> crate::storage::Seeds {
        let pomodoro = self.pomodoro.build(None).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid pomodoro defaults, seeding the standard timer");
            PomodoroTimerConfig::standard(&self.pomodoro.default_name)
        });
        let countdown = CountdownTimerConfig::new(
            &self.countdown.default_name,
            self.countdown.exam_target(now),
            &self.countdown.default_color,
        )
        .unwrap_or_else(|_| {
            CountdownTimerConfig {
                id: uuid::Uuid::new_v4(),
                name: default_countdown_name(),
                target_date: self.countdown.exam_target(now),
                created_at: now,
                color: self.countdown.default_color.clone(),
            }
        });
        crate::storage::Seeds {
            pomodoro,
            countdown,
        }
    }
}
