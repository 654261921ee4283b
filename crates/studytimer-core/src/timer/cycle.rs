//! Crediting and transition rules of the work/break cycle.
//!
//! Natural completion credits the full nominal work duration; a skip
//! credits only the part of the work phase that actually elapsed. Both use
//! the same session-count rule to choose between a short and a long break.

use serde::{Deserialize, Serialize};

use super::config::{Phase, PomodoroTimerConfig};
use super::snapshot::{EngineSnapshot, TimerState};

/// One phase boundary crossed by a completion or a skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCompletion {
    pub from: Phase,
    pub to: Phase,
    /// Seconds added to `total_work_time` by this transition.
    pub credited_work: u64,
}

/// Natural end of the current phase.
pub fn complete_phase(
    snapshot: &mut EngineSnapshot,
    config: &PomodoroTimerConfig,
) -> PhaseCompletion {
    let credit = match snapshot.phase {
        Phase::Work => config.work_duration,
        Phase::Break | Phase::LongBreak => 0,
    };
    transition(snapshot, config, credit)
}

/// User-requested jump to the next phase.
pub fn skip_phase(snapshot: &mut EngineSnapshot, config: &PomodoroTimerConfig) -> PhaseCompletion {
    let credit = match snapshot.phase {
        Phase::Work => config.work_duration.saturating_sub(snapshot.time_remaining),
        Phase::Break | Phase::LongBreak => 0,
    };
    transition(snapshot, config, credit)
}

fn transition(
    snapshot: &mut EngineSnapshot,
    config: &PomodoroTimerConfig,
    credit: u64,
) -> PhaseCompletion {
    let from = snapshot.phase;
    let to = match from {
        Phase::Work => {
            snapshot.total_work_time = snapshot.total_work_time.saturating_add(credit);
            snapshot.completed_sessions = snapshot.completed_sessions.saturating_add(1);
            snapshot.total_completed_sessions = snapshot.total_completed_sessions.saturating_add(1);
            if snapshot.completed_sessions >= config.sessions_before_long_break {
                snapshot.completed_sessions = 0;
                Phase::LongBreak
            } else {
                Phase::Break
            }
        }
        Phase::Break | Phase::LongBreak => Phase::Work,
    };
    snapshot.phase = to;
    snapshot.time_remaining = config.nominal_duration(to);
    PhaseCompletion {
        from,
        to,
        credited_work: if from == Phase::Work { credit } else { 0 },
    }
}

/// Consume `elapsed` seconds of running time, completing as many phases
/// as fit. Splitting `elapsed` across several calls gives the same result
/// as one call with the sum.
pub fn advance(
    snapshot: &mut EngineSnapshot,
    config: &PomodoroTimerConfig,
    elapsed: u64,
) -> Vec<PhaseCompletion> {
    let mut left = elapsed;
    let mut completions = Vec::new();
    while left >= snapshot.time_remaining {
        left -= snapshot.time_remaining;
        snapshot.time_remaining = 0;
        snapshot.timer_state = TimerState::Finished;
        completions.push(complete_phase(snapshot, config));
        snapshot.timer_state = TimerState::Running;
        if snapshot.time_remaining == 0 {
            // Zero-length phase; only reachable with an unvalidated config.
            break;
        }
    }
    snapshot.time_remaining = snapshot.time_remaining.saturating_sub(left);
    completions
}

/// Pull a snapshot back into its invariant ranges for `config`.
pub fn clamp(snapshot: &mut EngineSnapshot, config: &PomodoroTimerConfig) {
    snapshot.completed_sessions = snapshot
        .completed_sessions
        .min(config.sessions_before_long_break);
    snapshot.time_remaining = snapshot
        .time_remaining
        .min(config.nominal_duration(snapshot.phase));
}
