use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::{Phase, PomodoroTimerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Stopped,
    /// A phase reached zero and has not yet been consumed by the tick that
    /// produced it. Never observable outside a single tick.
    Finished,
}

/// The authoritative engine state. Plain data: only the engine and the
/// reconciler produce new values of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub timer_state: TimerState,
    pub phase: Phase,
    /// Seconds left in the current phase.
    pub time_remaining: u64,
    /// Work sessions since the last long break.
    pub completed_sessions: u32,
    /// Seconds of credited work, lifetime.
    pub total_work_time: u64,
    pub total_completed_sessions: u64,
    pub selected_timer_id: Option<Uuid>,
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        Self {
            timer_state: TimerState::Idle,
            phase: Phase::Work,
            time_remaining: 0,
            completed_sessions: 0,
            total_work_time: 0,
            total_completed_sessions: 0,
            selected_timer_id: None,
        }
    }
}

impl EngineSnapshot {
    pub fn is_running(&self) -> bool {
        self.timer_state == TimerState::Running
    }

    /// 0.0 .. 1.0 progress within the current phase.
    pub fn progress(&self, config: &PomodoroTimerConfig) -> f64 {
        let total = config.nominal_duration(self.phase);
        if total == 0 {
            return 0.0;
        }
        let remaining = self.time_remaining.min(total);
        1.0 - (remaining as f64 / total as f64)
    }
}

/// What gets persisted: the snapshot plus the wall-clock instant its
/// `time_remaining` was last accurate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub snapshot: EngineSnapshot,
    pub observed_at: DateTime<Utc>,
}
