use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timer::{Phase, TimerState};

/// Every engine state change produces an Event.
/// The CLI prints them; hosts may forward them to a UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerSelected {
        timer_id: Uuid,
        at: DateTime<Utc>,
    },
    TimerStarted {
        timer_id: Uuid,
        phase: Phase,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerStopped {
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    StatsReset {
        at: DateTime<Utc>,
    },
    /// A phase ran to zero.
    PhaseCompleted {
        from: Phase,
        to: Phase,
        credited_work_secs: u64,
        at: DateTime<Utc>,
    },
    /// The user jumped to the next phase early.
    PhaseSkipped {
        from: Phase,
        to: Phase,
        credited_work_secs: u64,
        at: DateTime<Utc>,
    },
    /// Wall-clock catch-up after a suspension.
    Reconciled {
        elapsed_secs: u64,
        phases_completed: usize,
        credited_work_secs: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        phase: Phase,
        phase_label: String,
        remaining_secs: u64,
        total_secs: u64,
        progress: f64,
        completed_sessions: u32,
        total_completed_sessions: u64,
        total_work_secs: u64,
        selected_timer_id: Option<Uuid>,
        at: DateTime<Utc>,
    },
}
