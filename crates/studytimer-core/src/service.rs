//! Host-facing timer service.
//!
//! Wires the engine, the persisted definitions and the notification
//! scheduler together, and exposes the lifecycle hooks a host raises when
//! it moves between foreground and background.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{Result, TimerError};
use crate::events::Event;
use crate::notify::{NotificationId, NotificationPort, NotificationScheduler};
use crate::storage::{Config, KeyValueStore, PersistenceStore, TimerConfigs};
use crate::timer::{CountdownTimerConfig, EngineSnapshot, PomodoroEngine, PomodoroTimerConfig};

/// Lifetime totals before a step, used to credit the selected definition.
#[derive(Clone, Copy)]
struct Totals {
    sessions: u64,
    work: u64,
}

pub struct TimerService<S: KeyValueStore> {
    clock: Arc<dyn Clock>,
    notifier: NotificationScheduler,
    store: PersistenceStore<S>,
    configs: TimerConfigs,
    engine: PomodoroEngine,
}

impl<S: KeyValueStore> TimerService<S> {
    /// Load definitions and the last snapshot, catching a running timer up
    /// to the present before anything can tick.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read or written.
    pub fn open(
        store: S,
        clock: Arc<dyn Clock>,
        port: Arc<dyn NotificationPort>,
        config: &Config,
    ) -> Result<Self> {
        let notifier = if config.notifications.enabled {
            NotificationScheduler::new(port)
        } else {
            NotificationScheduler::disabled()
        };
        let store = PersistenceStore::new(store);
        let now = clock.now();
        let configs = store.load_configs(|| config.seeds(now))?;
        let mut engine = PomodoroEngine::new(clock.clone(), notifier.clone());

        match store.load_snapshot()? {
            Some(stored) => {
                let selected = stored
                    .snapshot
                    .selected_timer_id
                    .and_then(|id| configs.pomodoros.iter().find(|c| c.id == id).cloned());
                let dangling = selected.is_none() && stored.snapshot.selected_timer_id.is_some();
                engine.load(selected, stored.snapshot, stored.observed_at);
                if dangling {
                    tracing::warn!("selected timer no longer exists, clearing selection");
                    engine.clear_selection();
                }
            }
            None => {
                if let Some(first) = configs.pomodoros.first() {
                    engine.select_timer(first.clone());
                }
            }
        }

        let mut service = Self {
            clock,
            notifier,
            store,
            configs,
            engine,
        };
        service.catch_up()?;
        service.schedule_countdowns();
        service.persist()?;
        service.engine.resume_ticking();
        tracing::info!(
            state = ?service.engine.state(),
            pomodoros = service.configs.pomodoros.len(),
            countdowns = service.configs.countdowns.len(),
            "timer service opened"
        );
        Ok(service)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> &EngineSnapshot {
        self.engine.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.engine.subscribe()
    }

    pub fn status(&self) -> Event {
        self.engine.status()
    }

    pub fn pomodoro_timers(&self) -> &[PomodoroTimerConfig] {
        &self.configs.pomodoros
    }

    pub fn countdowns(&self) -> &[CountdownTimerConfig] {
        &self.configs.countdowns
    }

    pub fn selected_timer(&self) -> Option<&PomodoroTimerConfig> {
        let id = self.engine.snapshot().selected_timer_id?;
        self.configs.pomodoros.iter().find(|c| c.id == id)
    }

    pub fn is_ticking(&self) -> bool {
        self.engine.is_ticking()
    }

    // ── Presentation commands ────────────────────────────────────────

    pub fn select_timer(&mut self, id: Uuid) -> Result<Event> {
        let config = self
            .configs
            .pomodoros
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| TimerError::NotFound(id.to_string()))?;
        let event = self.engine.select_timer(config);
        self.persist()?;
        Ok(event)
    }

    pub fn start(&mut self) -> Result<Option<Event>> {
        let event = self.engine.start()?;
        self.persist()?;
        Ok(event)
    }

    pub fn pause(&mut self) -> Result<Option<Event>> {
        let event = self.engine.pause();
        self.persist()?;
        Ok(event)
    }

    pub fn resume(&mut self) -> Result<Option<Event>> {
        let event = self.engine.resume();
        self.persist()?;
        Ok(event)
    }

    pub fn stop(&mut self) -> Result<Event> {
        let event = self.engine.stop();
        self.persist()?;
        Ok(event)
    }

    pub fn reset(&mut self) -> Result<Event> {
        let event = self.engine.reset();
        self.persist()?;
        Ok(event)
    }

    pub fn skip_to_next_phase(&mut self) -> Result<Option<Event>> {
        let before = self.totals();
        let event = self.engine.skip_to_next_phase();
        self.credit_selected(before)?;
        self.persist()?;
        Ok(event)
    }

    /// Zero the engine's lifetime totals. Per-definition history is kept.
    pub fn reset_stats(&mut self) -> Result<Event> {
        let event = self.engine.reset_stats();
        self.persist()?;
        Ok(event)
    }

    /// One tick-loop step. Persists only when a phase boundary was crossed.
    pub fn tick(&mut self) -> Result<Vec<Event>> {
        if !self.engine.is_ticking() {
            return Ok(Vec::new());
        }
        let before = self.totals();
        let events = self.engine.tick_now();
        if !events.is_empty() {
            self.credit_selected(before)?;
            self.persist()?;
        }
        Ok(events)
    }

    // ── Timer definitions ────────────────────────────────────────────

    pub fn add_pomodoro_timer(&mut self, config: PomodoroTimerConfig) -> Result<PomodoroTimerConfig> {
        config.validate()?;
        self.configs.pomodoros.push(config.clone());
        self.store.save_configs(&self.configs)?;
        tracing::info!(id = %config.id, name = %config.name, "pomodoro timer added");
        Ok(config)
    }

    pub fn remove_pomodoro_timer(&mut self, id: Uuid) -> Result<PomodoroTimerConfig> {
        let index = self
            .configs
            .pomodoros
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| TimerError::NotFound(id.to_string()))?;
        let removed = self.configs.pomodoros.remove(index);
        if self.engine.snapshot().selected_timer_id == Some(id) {
            self.engine.clear_selection();
        }
        self.store.save_configs(&self.configs)?;
        self.persist()?;
        tracing::info!(id = %removed.id, name = %removed.name, "pomodoro timer removed");
        Ok(removed)
    }

    pub fn add_countdown(&mut self, countdown: CountdownTimerConfig) -> Result<CountdownTimerConfig> {
        self.notifier.schedule_countdown(&countdown, self.clock.now());
        self.configs.countdowns.push(countdown.clone());
        self.store.save_configs(&self.configs)?;
        tracing::info!(id = %countdown.id, name = %countdown.name, "countdown added");
        Ok(countdown)
    }

    /// Edit a countdown in place and re-arm its notification for the new
    /// target. Fields left as `None` keep their current value.
    pub fn update_countdown(
        &mut self,
        id: Uuid,
        name: Option<String>,
        target_date: Option<DateTime<Utc>>,
        color: Option<String>,
    ) -> Result<CountdownTimerConfig> {
        let countdown = self
            .configs
            .countdowns
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| TimerError::NotFound(id.to_string()))?;
        let edited = CountdownTimerConfig {
            id,
            created_at: countdown.created_at,
            ..CountdownTimerConfig::new(
                name.unwrap_or_else(|| countdown.name.clone()),
                target_date.unwrap_or(countdown.target_date),
                color.unwrap_or_else(|| countdown.color.clone()),
            )?
        };
        *countdown = edited.clone();
        self.notifier.schedule_countdown(&edited, self.clock.now());
        self.store.save_configs(&self.configs)?;
        tracing::info!(id = %edited.id, name = %edited.name, target = %edited.target_date, "countdown updated");
        Ok(edited)
    }

    pub fn remove_countdown(&mut self, id: Uuid) -> Result<CountdownTimerConfig> {
        let index = self
            .configs
            .countdowns
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| TimerError::NotFound(id.to_string()))?;
        let removed = self.configs.countdowns.remove(index);
        self.notifier.cancel(&NotificationId::countdown(id));
        self.store.save_configs(&self.configs)?;
        tracing::info!(id = %removed.id, name = %removed.name, "countdown removed");
        Ok(removed)
    }

    // ── Lifecycle hooks ──────────────────────────────────────────────

    /// The host is about to be suspended.
    pub fn on_enter_background(&mut self) -> Result<()> {
        self.engine.suspend();
        self.engine.refresh_notification();
        self.schedule_countdowns();
        self.persist()?;
        tracing::info!(state = ?self.engine.state(), "entered background");
        Ok(())
    }

    /// The host is visible again.
    pub fn on_enter_foreground(&mut self) -> Result<Option<Event>> {
        let event = self.catch_up()?;
        self.schedule_countdowns();
        self.persist()?;
        self.engine.resume_ticking();
        tracing::info!(state = ?self.engine.state(), "entered foreground");
        Ok(event)
    }

    /// Periodic background refresh. Stays suspended.
    pub fn on_background_wake(&mut self) -> Result<Option<Event>> {
        let event = self.catch_up()?;
        self.engine.suspend();
        self.schedule_countdowns();
        self.persist()?;
        Ok(event)
    }

    /// Re-issue every advisory notification for the present.
    pub fn refresh_notifications(&self) {
        self.engine.refresh_notification();
        self.schedule_countdowns();
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn catch_up(&mut self) -> Result<Option<Event>> {
        let before = self.totals();
        let reconciliation = self.engine.reconcile_now();
        let event = self.engine.adopt(reconciliation);
        self.credit_selected(before)?;
        Ok(event)
    }

    fn schedule_countdowns(&self) {
        let now = self.clock.now();
        for countdown in self.configs.countdowns.iter().filter(|c| !c.is_expired(now)) {
            self.notifier.schedule_countdown(countdown, now);
        }
    }

    fn totals(&self) -> Totals {
        let snapshot = self.engine.snapshot();
        Totals {
            sessions: snapshot.total_completed_sessions,
            work: snapshot.total_work_time,
        }
    }

    /// Add whatever the engine credited since `before` to the selected
    /// definition's own counters.
    fn credit_selected(&mut self, before: Totals) -> Result<()> {
        let after = self.totals();
        let sessions = after.sessions.saturating_sub(before.sessions);
        let work = after.work.saturating_sub(before.work);
        if sessions == 0 && work == 0 {
            return Ok(());
        }
        let Some(id) = self.engine.snapshot().selected_timer_id else {
            return Ok(());
        };
        if let Some(config) = self.configs.pomodoros.iter_mut().find(|c| c.id == id) {
            config.total_sessions += sessions;
            config.total_work_time += work;
            self.store.save_configs(&self.configs)?;
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let observed_at: DateTime<Utc> = self
            .engine
            .last_observed_at()
            .unwrap_or_else(|| self.clock.now());
        self.store.save_snapshot(self.engine.snapshot(), observed_at)
    }
}
