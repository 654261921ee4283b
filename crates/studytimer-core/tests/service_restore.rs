//! Integration tests for restoring the timer service from an on-disk
//! SQLite store.

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use studytimer_core::storage::persistence::SNAPSHOT_KEY;
use studytimer_core::{
    reconcile, Clock, Config, Database, KeyValueStore, ManualClock, MemoryNotifier, NotificationId,
    Phase, TimerService, TimerState,
};

struct Env {
    _dir: tempfile::TempDir,
    path: std::path::PathBuf,
    clock: Arc<ManualClock>,
    port: Arc<MemoryNotifier>,
}

impl Env {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studytimer.db");
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 11, 14, 0, 0).unwrap(),
        ));
        let port = Arc::new(MemoryNotifier::new(clock.clone()));
        Self {
            _dir: dir,
            path,
            clock,
            port,
        }
    }

    fn open(&self) -> TimerService<Database> {
        TimerService::open(
            Database::open_at(&self.path).unwrap(),
            self.clock.clone(),
            self.port.clone(),
            &Config::default(),
        )
        .unwrap()
    }
}

#[test]
fn restore_without_elapsed_time_is_identity() {
    let env = Env::new();
    let mut service = env.open();
    service.start().unwrap();
    env.clock.advance_secs(42);
    service.tick().unwrap();
    service.on_enter_background().unwrap();
    let before = service.snapshot().clone();
    drop(service);

    let restored = env.open();
    assert_eq!(restored.snapshot(), &before);
    assert_eq!(restored.snapshot().time_remaining, 1458);
}

#[test]
fn restore_after_gap_matches_reconcile() {
    let env = Env::new();
    let mut service = env.open();
    service.start().unwrap();
    service.on_enter_background().unwrap();
    let saved = service.snapshot().clone();
    let config = service.selected_timer().unwrap().clone();
    let saved_at = env.clock.now();
    drop(service);

    let gap = 3 * 3600 + 17;
    env.clock.advance_secs(gap);
    let restored = env.open();

    let expected = reconcile(&saved, Some(&config), saved_at, saved_at + Duration::seconds(gap));
    assert_eq!(restored.snapshot(), &expected.snapshot);
    assert_eq!(restored.snapshot().timer_state, TimerState::Running);

    // The advisory notification points at the end of the reconciled phase.
    let pending = env
        .port
        .get(&NotificationId::pomodoro(config.id))
        .unwrap();
    assert_eq!(
        pending.fire_at,
        env.clock.now() + Duration::seconds(expected.snapshot.time_remaining as i64)
    );
}

#[test]
fn per_timer_counters_are_persisted() {
    let env = Env::new();
    let mut service = env.open();
    service.start().unwrap();
    env.clock.advance_secs(1500);
    service.tick().unwrap();
    assert_eq!(service.snapshot().phase, Phase::Break);
    drop(service);

    let restored = env.open();
    let selected = restored.selected_timer().unwrap();
    assert_eq!(selected.total_sessions, 1);
    assert_eq!(selected.total_work_time, 1500);
}

#[test]
fn corrupt_snapshot_starts_idle() {
    let env = Env::new();
    {
        let db = Database::open_at(&env.path).unwrap();
        db.put(SNAPSHOT_KEY, "{\"timer_state\":").unwrap();
    }
    let service = env.open();
    assert_eq!(service.snapshot().timer_state, TimerState::Idle);
    assert!(service.snapshot().selected_timer_id.is_some());
}
