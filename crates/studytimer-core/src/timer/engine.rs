//! Pomodoro engine implementation.
//!
//! The engine is a wall-clock-anchored state machine. It does not use
//! internal threads - the tick loop (see [`super::ticker`]) or the host
//! calls `tick_now()` roughly once per second while ticking is enabled.
//!
//! ## State Transitions
//!
//! ```text
//! Idle/Stopped --start--> Running <--pause/resume--> Paused
//!      ^                     |
//!      +-------stop----------+
//! ```
//!
//! Within `Running`, the phase cycles Work -> Break (or LongBreak every
//! `sessions_before_long_break` sessions) -> Work.
//!
//! Every mutation is published on a `watch` channel; subscribers only
//! ever see whole snapshots.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::watch;

use super::config::{Phase, PomodoroTimerConfig};
use super::cycle::{self, PhaseCompletion};
use super::reconcile::{reconcile, Reconciliation};
use super::snapshot::{EngineSnapshot, TimerState};
use crate::clock::{elapsed_secs, Clock};
use crate::error::TimerError;
use crate::events::Event;
use crate::notify::{NotificationId, NotificationScheduler};

pub struct PomodoroEngine {
    clock: Arc<dyn Clock>,
    notifier: NotificationScheduler,
    config: Option<PomodoroTimerConfig>,
    snapshot: EngineSnapshot,
    /// Instant at which `snapshot.time_remaining` was exact. Only set
    /// while Running.
    last_observed_at: Option<DateTime<Utc>>,
    /// Whether the tick loop may drive this engine. Cleared while paused,
    /// stopped, or suspended in the background.
    ticking: bool,
    tx: watch::Sender<EngineSnapshot>,
}

impl PomodoroEngine {
    /// Create an idle engine with nothing selected.
    pub fn new(clock: Arc<dyn Clock>, notifier: NotificationScheduler) -> Self {
        let snapshot = EngineSnapshot::default();
        let (tx, _rx) = watch::channel(snapshot.clone());
        Self {
            clock,
            notifier,
            config: None,
            snapshot,
            last_observed_at: None,
            ticking: false,
            tx,
        }
    }

    /// Install a restored snapshot without side effects.
    ///
    /// The engine comes up suspended; a Running snapshot must be brought
    /// up to date with [`PomodoroEngine::reconcile_now`] and
    /// [`PomodoroEngine::adopt`] before [`PomodoroEngine::resume_ticking`].
    pub fn load(
        &mut self,
        config: Option<PomodoroTimerConfig>,
        snapshot: EngineSnapshot,
        observed_at: DateTime<Utc>,
    ) {
        self.config = config;
        self.last_observed_at = snapshot.is_running().then_some(observed_at);
        self.snapshot = snapshot;
        self.ticking = false;
        self.publish();
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> &EngineSnapshot {
        &self.snapshot
    }

    pub fn config(&self) -> Option<&PomodoroTimerConfig> {
        self.config.as_ref()
    }

    pub fn state(&self) -> TimerState {
        self.snapshot.timer_state
    }

    pub fn phase(&self) -> Phase {
        self.snapshot.phase
    }

    pub fn time_remaining(&self) -> u64 {
        self.snapshot.time_remaining
    }

    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    pub fn last_observed_at(&self) -> Option<DateTime<Utc>> {
        self.last_observed_at
    }

    /// Read-only feed of every snapshot the engine produces.
    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.tx.subscribe()
    }

    /// Build a full state snapshot event.
    pub fn status(&self) -> Event {
        let total = self
            .config
            .as_ref()
            .map(|c| c.nominal_duration(self.snapshot.phase))
            .unwrap_or(0);
        Event::StateSnapshot {
            state: self.snapshot.timer_state,
            phase: self.snapshot.phase,
            phase_label: self.snapshot.phase.label().to_string(),
            remaining_secs: self.snapshot.time_remaining,
            total_secs: total,
            progress: self
                .config
                .as_ref()
                .map(|c| self.snapshot.progress(c))
                .unwrap_or(0.0),
            completed_sessions: self.snapshot.completed_sessions,
            total_completed_sessions: self.snapshot.total_completed_sessions,
            total_work_secs: self.snapshot.total_work_time,
            selected_timer_id: self.snapshot.selected_timer_id,
            at: self.clock.now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Make `config` the selected timer. Any running or paused session
    /// is abandoned; lifetime totals are kept.
    pub fn select_timer(&mut self, config: PomodoroTimerConfig) -> Event {
        self.halt();
        let timer_id = config.id;
        self.snapshot = EngineSnapshot {
            timer_state: TimerState::Idle,
            phase: Phase::Work,
            time_remaining: 0,
            completed_sessions: 0,
            selected_timer_id: Some(timer_id),
            ..self.snapshot.clone()
        };
        self.config = Some(config);
        tracing::debug!(%timer_id, "timer selected");
        self.publish();
        Event::TimerSelected {
            timer_id,
            at: self.clock.now(),
        }
    }

    /// Drop the selection (the selected definition was deleted).
    pub fn clear_selection(&mut self) {
        self.halt();
        self.config = None;
        self.snapshot = EngineSnapshot {
            timer_state: TimerState::Idle,
            phase: Phase::Work,
            time_remaining: 0,
            completed_sessions: 0,
            selected_timer_id: None,
            ..self.snapshot.clone()
        };
        self.publish();
    }

    /// Start a fresh work phase, or resume if paused.
    ///
    /// # Errors
    /// [`TimerError::NoTimerSelected`] when nothing is selected.
    pub fn start(&mut self) -> Result<Option<Event>, TimerError> {
        let config = self.config.clone().ok_or(TimerError::NoTimerSelected)?;
        if self.snapshot.timer_state == TimerState::Paused {
            return Ok(self.resume());
        }

        let now = self.clock.now();
        self.snapshot.timer_state = TimerState::Running;
        self.snapshot.phase = Phase::Work;
        self.snapshot.time_remaining = config.work_duration;
        self.last_observed_at = Some(now);
        self.ticking = true;
        self.notifier
            .schedule_phase_end(config.id, Phase::Work, config.work_duration);
        tracing::debug!(timer_id = %config.id, secs = config.work_duration, "work phase started");
        self.publish();

        Ok(Some(Event::TimerStarted {
            timer_id: config.id,
            phase: Phase::Work,
            duration_secs: config.work_duration,
            at: now,
        }))
    }

    pub fn pause(&mut self) -> Option<Event> {
        if self.snapshot.timer_state != TimerState::Running {
            return None;
        }
        self.snapshot.timer_state = TimerState::Paused;
        self.ticking = false;
        self.last_observed_at = None;
        self.cancel_notification();
        tracing::debug!(remaining = self.snapshot.time_remaining, "paused");
        self.publish();
        Some(Event::TimerPaused {
            remaining_secs: self.snapshot.time_remaining,
            at: self.clock.now(),
        })
    }

    pub fn resume(&mut self) -> Option<Event> {
        if self.snapshot.timer_state != TimerState::Paused {
            return None;
        }
        let config = self.config.as_ref()?;
        let timer_id = config.id;
        let now = self.clock.now();
        self.snapshot.timer_state = TimerState::Running;
        self.last_observed_at = Some(now);
        self.ticking = true;
        self.notifier.schedule_phase_end(
            timer_id,
            self.snapshot.phase,
            self.snapshot.time_remaining,
        );
        tracing::debug!(remaining = self.snapshot.time_remaining, "resumed");
        self.publish();
        Some(Event::TimerResumed {
            remaining_secs: self.snapshot.time_remaining,
            at: now,
        })
    }

    /// Abandon the current cycle. Lifetime totals survive.
    pub fn stop(&mut self) -> Event {
        self.force_stop();
        Event::TimerStopped {
            at: self.clock.now(),
        }
    }

    /// Same effect as [`PomodoroEngine::stop`].
    pub fn reset(&mut self) -> Event {
        self.force_stop();
        Event::TimerReset {
            at: self.clock.now(),
        }
    }

    /// Zero the lifetime totals and stop.
    pub fn reset_stats(&mut self) -> Event {
        self.snapshot.total_work_time = 0;
        self.snapshot.total_completed_sessions = 0;
        self.force_stop();
        Event::StatsReset {
            at: self.clock.now(),
        }
    }

    /// End the current phase early. Work credits only the elapsed part.
    pub fn skip_to_next_phase(&mut self) -> Option<Event> {
        if self.snapshot.timer_state == TimerState::Stopped {
            return None;
        }
        let config = self.config.clone()?;
        let completion = cycle::skip_phase(&mut self.snapshot, &config);

        self.notifier.cancel(&NotificationId::pomodoro(config.id));
        if self.snapshot.is_running() {
            self.last_observed_at = Some(self.clock.now());
            self.notifier.schedule_phase_end(
                config.id,
                self.snapshot.phase,
                self.snapshot.time_remaining,
            );
        }
        tracing::debug!(from = ?completion.from, to = ?completion.to, credited = completion.credited_work, "phase skipped");
        self.publish();

        Some(Event::PhaseSkipped {
            from: completion.from,
            to: completion.to,
            credited_work_secs: completion.credited_work,
            at: self.clock.now(),
        })
    }

    /// Consume `elapsed_secs` of running time. Returns one event per phase
    /// that completed; leftover time carries into the following phase.
    pub fn tick(&mut self, elapsed_secs: u64) -> Vec<Event> {
        if self.snapshot.timer_state != TimerState::Running {
            return Vec::new();
        }
        let Some(config) = self.config.clone() else {
            return Vec::new();
        };

        let completions = cycle::advance(&mut self.snapshot, &config, elapsed_secs);
        if let Some(anchor) = self.last_observed_at.as_mut() {
            *anchor += Duration::seconds(elapsed_secs as i64);
        }
        if !completions.is_empty() {
            self.notifier.schedule_phase_end(
                config.id,
                self.snapshot.phase,
                self.snapshot.time_remaining,
            );
        }
        self.publish();
        self.completion_events(&completions)
    }

    /// Tick by the whole seconds elapsed on the wall clock since the
    /// anchor. Sub-second remainders are kept for the next call.
    pub fn tick_now(&mut self) -> Vec<Event> {
        let Some(anchor) = self.last_observed_at else {
            return Vec::new();
        };
        let elapsed = elapsed_secs(anchor, self.clock.now());
        if elapsed == 0 {
            return Vec::new();
        }
        self.tick(elapsed)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Stop driving ticks but keep the Running state and its anchor
    /// (the process is about to be suspended).
    pub fn suspend(&mut self) {
        self.ticking = false;
    }

    /// Let the tick loop drive the engine again, if it is Running.
    pub fn resume_ticking(&mut self) {
        self.ticking = self.snapshot.is_running();
    }

    /// Compute where the engine should be now, without applying it.
    pub fn reconcile_now(&self) -> Reconciliation {
        let now = self.clock.now();
        reconcile(
            &self.snapshot,
            self.config.as_ref(),
            self.last_observed_at.unwrap_or(now),
            now,
        )
    }

    /// Take over a reconciled snapshot and refresh the advisory
    /// notification for the (possibly new) phase.
    pub fn adopt(&mut self, reconciliation: Reconciliation) -> Option<Event> {
        let Reconciliation {
            snapshot,
            elapsed_secs,
            observed_at,
            completions,
        } = reconciliation;

        self.snapshot = snapshot;
        if self.snapshot.is_running() {
            self.last_observed_at = Some(observed_at);
            self.refresh_notification();
        }
        self.publish();

        if elapsed_secs == 0 {
            return None;
        }
        tracing::info!(
            elapsed_secs,
            phases_completed = completions.len(),
            "caught up after suspension"
        );
        Some(Event::Reconciled {
            elapsed_secs,
            phases_completed: completions.len(),
            credited_work_secs: completions.iter().map(|c| c.credited_work).sum(),
            at: self.clock.now(),
        })
    }

    /// Re-issue the end-of-phase notification for the time actually left.
    pub fn refresh_notification(&self) {
        let Some(config) = self.config.as_ref() else {
            return;
        };
        if !self.snapshot.is_running() {
            return;
        }
        let since_anchor = self
            .last_observed_at
            .map(|anchor| elapsed_secs(anchor, self.clock.now()))
            .unwrap_or(0);
        self.notifier.schedule_phase_end(
            config.id,
            self.snapshot.phase,
            self.snapshot.time_remaining.saturating_sub(since_anchor),
        );
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn force_stop(&mut self) {
        self.halt();
        self.snapshot.timer_state = TimerState::Stopped;
        self.snapshot.phase = Phase::Work;
        self.snapshot.time_remaining = 0;
        self.snapshot.completed_sessions = 0;
        tracing::debug!("stopped");
        self.publish();
    }

    /// Stop the loop and drop the pending notification.
    fn halt(&mut self) {
        self.ticking = false;
        self.last_observed_at = None;
        self.cancel_notification();
    }

    fn cancel_notification(&self) {
        if let Some(config) = self.config.as_ref() {
            self.notifier.cancel(&NotificationId::pomodoro(config.id));
        }
    }

    fn completion_events(&self, completions: &[PhaseCompletion]) -> Vec<Event> {
        let at = self.clock.now();
        completions
            .iter()
            .map(|c| Event::PhaseCompleted {
                from: c.from,
                to: c.to,
                credited_work_secs: c.credited_work,
                at,
            })
            .collect()
    }

    fn publish(&self) {
        self.tx.send_replace(self.snapshot.clone());
    }
}
