use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Work,
    Break,
    LongBreak,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Work => "Work",
            Phase::Break => "Short Break",
            Phase::LongBreak => "Long Break",
        }
    }
}

/// A pomodoro timer definition.
///
/// Identity (`id`, `created_at`) is fixed at construction; the lifetime
/// counters are bumped as sessions are credited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroTimerConfig {
    pub id: Uuid,
    pub name: String,
    /// Seconds.
    pub work_duration: u64,
    /// Seconds.
    pub break_duration: u64,
    /// Seconds.
    pub long_break_duration: u64,
    pub sessions_before_long_break: u32,
    #[serde(default)]
    pub total_sessions: u64,
    /// Seconds of credited work.
    #[serde(default)]
    pub total_work_time: u64,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl PomodoroTimerConfig {
    pub const STANDARD_WORK_SECS: u64 = 25 * 60;
    pub const STANDARD_BREAK_SECS: u64 = 5 * 60;
    pub const STANDARD_LONG_BREAK_SECS: u64 = 15 * 60;
    pub const STANDARD_SESSIONS: u32 = 4;

    /// Build a validated config with fresh identity.
    ///
    /// # Errors
    /// Rejects an empty name, any zero duration, and fewer than one
    /// session before a long break.
    pub fn new(
        name: impl Into<String>,
        work_duration: u64,
        break_duration: u64,
        long_break_duration: u64,
        sessions_before_long_break: u32,
    ) -> Result<Self, ValidationError> {
        let config = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            work_duration,
            break_duration,
            long_break_duration,
            sessions_before_long_break,
            total_sessions: 0,
            total_work_time: 0,
            is_active: false,
            created_at: Utc::now(),
        };
        config.validate()?;
        Ok(config)
    }

    /// The classic 25 / 5 / 15 minute cycle with a long break every 4 sessions.
    pub fn standard(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            work_duration: Self::STANDARD_WORK_SECS,
            break_duration: Self::STANDARD_BREAK_SECS,
            long_break_duration: Self::STANDARD_LONG_BREAK_SECS,
            sessions_before_long_break: Self::STANDARD_SESSIONS,
            total_sessions: 0,
            total_work_time: 0,
            is_active: false,
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".into(),
                message: "must not be empty".into(),
            });
        }
        for (field, secs) in [
            ("work_duration", self.work_duration),
            ("break_duration", self.break_duration),
            ("long_break_duration", self.long_break_duration),
        ] {
            if secs == 0 {
                return Err(ValidationError::NonPositiveDuration {
                    field: field.into(),
                });
            }
        }
        if self.sessions_before_long_break < 1 {
            return Err(ValidationError::SessionsBeforeLongBreak(
                self.sessions_before_long_break,
            ));
        }
        Ok(())
    }

    /// Configured length of `phase` in seconds.
    pub fn nominal_duration(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Work => self.work_duration,
            Phase::Break => self.break_duration,
            Phase::LongBreak => self.long_break_duration,
        }
    }
}

/// A countdown to a fixed point in time (an exam, a deadline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownTimerConfig {
    pub id: Uuid,
    pub name: String,
    pub target_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Display tag only; the engine never reads it.
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    "#3b82f6".into()
}

impl CountdownTimerConfig {
    pub fn new(
        name: impl Into<String>,
        target_date: DateTime<Utc>,
        color: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            target_date,
            created_at: Utc::now(),
            color: color.into(),
        })
    }

    /// Seconds left until the target, never negative.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> u64 {
        crate::clock::elapsed_secs(now, self.target_date)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.time_remaining(now) == 0
    }
}
