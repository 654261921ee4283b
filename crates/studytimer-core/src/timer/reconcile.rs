//! Wall-clock reconciliation.
//!
//! After the process was suspended, the persisted snapshot is stale by
//! however long the OS kept us paused. [`reconcile`] replays that span as
//! if the tick loop had been running the whole time, so a long suspension
//! may complete several phases at once. It has no side effects: callers
//! adopt the result, reschedule notifications and persist.

use chrono::{DateTime, Duration, Utc};

use super::config::PomodoroTimerConfig;
use super::cycle::{self, PhaseCompletion};
use super::snapshot::EngineSnapshot;
use crate::clock::elapsed_secs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub snapshot: EngineSnapshot,
    /// Whole seconds consumed.
    pub elapsed_secs: u64,
    /// Where `time_remaining` is accurate as of. Advanced from the input
    /// anchor by whole seconds only, so sub-second remainders carry over.
    pub observed_at: DateTime<Utc>,
    pub completions: Vec<PhaseCompletion>,
}

impl Reconciliation {
    fn unchanged(snapshot: &EngineSnapshot, observed_at: DateTime<Utc>) -> Self {
        Self {
            snapshot: snapshot.clone(),
            elapsed_secs: 0,
            observed_at,
            completions: Vec::new(),
        }
    }

    pub fn credited_work(&self) -> u64 {
        self.completions.iter().map(|c| c.credited_work).sum()
    }
}

/// Bring `snapshot` up to `now`.
///
/// Only a `Running` snapshot with a matching `config` moves. A `now`
/// before `last_observed_at` counts as zero elapsed.
pub fn reconcile(
    snapshot: &EngineSnapshot,
    config: Option<&PomodoroTimerConfig>,
    last_observed_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Reconciliation {
    let config = match config {
        Some(c) if snapshot.is_running() && snapshot.selected_timer_id == Some(c.id) => c,
        _ => return Reconciliation::unchanged(snapshot, last_observed_at),
    };

    let mut next = snapshot.clone();
    cycle::clamp(&mut next, config);

    let elapsed = elapsed_secs(last_observed_at, now);
    let completions = cycle::advance(&mut next, config, elapsed);
    cycle::clamp(&mut next, config);

    tracing::debug!(
        elapsed,
        phases_completed = completions.len(),
        phase = ?next.phase,
        remaining = next.time_remaining,
        "reconciled snapshot"
    );

    Reconciliation {
        snapshot: next,
        elapsed_secs: elapsed,
        observed_at: last_observed_at + Duration::seconds(elapsed as i64),
        completions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::config::Phase;
    use crate::timer::snapshot::TimerState;
    use chrono::TimeZone;

    fn config() -> PomodoroTimerConfig {
        PomodoroTimerConfig::new("Test", 1500, 300, 900, 4).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    fn running(config: &PomodoroTimerConfig) -> EngineSnapshot {
        EngineSnapshot {
            timer_state: TimerState::Running,
            phase: Phase::Work,
            time_remaining: config.work_duration,
            selected_timer_id: Some(config.id),
            ..EngineSnapshot::default()
        }
    }

    #[test]
    fn paused_snapshot_is_untouched() {
        let c = config();
        let mut s = running(&c);
        s.timer_state = TimerState::Paused;
        let r = reconcile(&s, Some(&c), t0(), t0() + Duration::hours(5));
        assert_eq!(r.snapshot, s);
        assert_eq!(r.elapsed_secs, 0);
        assert!(r.completions.is_empty());
    }

    #[test]
    fn missing_config_is_untouched() {
        let c = config();
        let s = running(&c);
        let r = reconcile(&s, None, t0(), t0() + Duration::hours(1));
        assert_eq!(r.snapshot, s);
    }

    #[test]
    fn clock_going_backwards_is_zero_elapsed() {
        let c = config();
        let s = running(&c);
        let r = reconcile(&s, Some(&c), t0(), t0() - Duration::minutes(10));
        assert_eq!(r.snapshot, s);
        assert_eq!(r.observed_at, t0());
    }

    #[test]
    fn one_work_phase() {
        let c = config();
        let r = reconcile(&running(&c), Some(&c), t0(), t0() + Duration::seconds(1500));
        assert_eq!(r.snapshot.phase, Phase::Break);
        assert_eq!(r.snapshot.completed_sessions, 1);
        assert_eq!(r.snapshot.total_work_time, 1500);
        assert_eq!(r.snapshot.time_remaining, 300);
        assert_eq!(r.credited_work(), 1500);
    }

    #[test]
    fn four_full_cycles_reach_long_break() {
        let c = config();
        let d = 4 * (1500 + 300);
        let r = reconcile(&running(&c), Some(&c), t0(), t0() + Duration::seconds(d));
        assert_eq!(r.snapshot.phase, Phase::LongBreak);
        assert_eq!(r.snapshot.completed_sessions, 0);
        assert_eq!(r.snapshot.total_completed_sessions, 4);
        assert_eq!(r.snapshot.total_work_time, 6000);
        assert_eq!(r.snapshot.timer_state, TimerState::Running);
    }

    #[test]
    fn sub_second_remainder_carries() {
        let c = config();
        let now = t0() + Duration::milliseconds(10_700);
        let r = reconcile(&running(&c), Some(&c), t0(), now);
        assert_eq!(r.elapsed_secs, 10);
        assert_eq!(r.observed_at, t0() + Duration::seconds(10));
        assert_eq!(r.snapshot.time_remaining, 1490);
    }

    #[test]
    fn pathological_counters_are_clamped() {
        let c = config();
        let mut s = running(&c);
        s.completed_sessions = 40;
        s.time_remaining = 1_000_000;
        let r = reconcile(&s, Some(&c), t0(), t0());
        assert!(r.snapshot.completed_sessions <= c.sessions_before_long_break);
        assert!(r.snapshot.time_remaining <= c.work_duration);
    }

    #[test]
    fn second_call_at_same_instant_is_noop() {
        let c = config();
        let t1 = t0() + Duration::seconds(4321);
        let first = reconcile(&running(&c), Some(&c), t0(), t1);
        let second = reconcile(&first.snapshot, Some(&c), first.observed_at, t1);
        assert_eq!(second.snapshot, first.snapshot);
        assert!(second.completions.is_empty());
    }
}
