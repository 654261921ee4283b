//! Timer definitions and engine snapshot persistence.
//!
//! Everything is stored as JSON under three keys. Unreadable data is
//! logged and replaced by defaults; it never stops the engine from
//! coming up.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::kv::KeyValueStore;
use crate::error::Result;
use crate::timer::{CountdownTimerConfig, EngineSnapshot, PomodoroTimerConfig, StoredSnapshot};

pub const POMODORO_TIMERS_KEY: &str = "pomodoro_timers";
pub const COUNTDOWN_TIMERS_KEY: &str = "countdown_timers";
pub const SNAPSHOT_KEY: &str = "pomodoro_state";

/// Timer definitions loaded from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfigs {
    pub pomodoros: Vec<PomodoroTimerConfig>,
    pub countdowns: Vec<CountdownTimerConfig>,
}

/// Definitions written on first run.
#[derive(Debug, Clone)]
pub struct Seeds {
    pub pomodoro: PomodoroTimerConfig,
    pub countdown: CountdownTimerConfig,
}

pub struct PersistenceStore<S> {
    store: S,
}

impl<S: KeyValueStore> PersistenceStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Load both definition lists. A list that is missing or unreadable
    /// is replaced by its seed and written back.
    pub fn load_configs(&self, seeds: impl FnOnce() -> Seeds) -> Result<TimerConfigs> {
        let pomodoros = self.read_json::<Vec<PomodoroTimerConfig>>(POMODORO_TIMERS_KEY)?;
        let countdowns = self.read_json::<Vec<CountdownTimerConfig>>(COUNTDOWN_TIMERS_KEY)?;

        if pomodoros.is_some() && countdowns.is_some() {
            return Ok(TimerConfigs {
                pomodoros: valid_pomodoros(pomodoros.unwrap_or_default()),
                countdowns: countdowns.unwrap_or_default(),
            });
        }

        let seeds = seeds();
        let pomodoros = match pomodoros {
            Some(list) => valid_pomodoros(list),
            None => {
                tracing::info!(name = %seeds.pomodoro.name, "seeding default pomodoro timer");
                let list = vec![seeds.pomodoro];
                self.write_json(POMODORO_TIMERS_KEY, &list)?;
                list
            }
        };
        let countdowns = match countdowns {
            Some(list) => list,
            None => {
                tracing::info!(name = %seeds.countdown.name, "seeding default countdown");
                let list = vec![seeds.countdown];
                self.write_json(COUNTDOWN_TIMERS_KEY, &list)?;
                list
            }
        };
        Ok(TimerConfigs {
            pomodoros,
            countdowns,
        })
    }

    pub fn save_configs(&self, configs: &TimerConfigs) -> Result<()> {
        self.write_json(POMODORO_TIMERS_KEY, &configs.pomodoros)?;
        self.write_json(COUNTDOWN_TIMERS_KEY, &configs.countdowns)
    }

    /// The last saved snapshot, or `None` if absent or unreadable.
    pub fn load_snapshot(&self) -> Result<Option<StoredSnapshot>> {
        self.read_json(SNAPSHOT_KEY)
    }

    pub fn save_snapshot(&self, snapshot: &EngineSnapshot, observed_at: DateTime<Utc>) -> Result<()> {
        let stored = StoredSnapshot {
            snapshot: snapshot.clone(),
            observed_at,
        };
        self.write_json(SNAPSHOT_KEY, &stored)
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding unreadable stored value");
                Ok(None)
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.store.put(key, &json)
    }
}

fn valid_pomodoros(list: Vec<PomodoroTimerConfig>) -> Vec<PomodoroTimerConfig> {
    list.into_iter()
        .filter(|c| match c.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(id = %c.id, error = %e, "dropping invalid pomodoro timer");
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::timer::{Phase, TimerState};
    use chrono::TimeZone;

    fn seeds() -> Seeds {
        Seeds {
            pomodoro: PomodoroTimerConfig::standard("Standard Pomodoro"),
            countdown: CountdownTimerConfig::new(
                "Exam",
                Utc.with_ymd_and_hms(2027, 6, 17, 7, 0, 0).unwrap(),
                "#3b82f6",
            )
            .unwrap(),
        }
    }

    #[test]
    fn first_run_seeds_one_of_each() {
        let p = PersistenceStore::new(MemoryStore::new());
        let configs = p.load_configs(seeds).unwrap();
        assert_eq!(configs.pomodoros.len(), 1);
        assert_eq!(configs.countdowns.len(), 1);

        // Second load reads back what was seeded rather than seeding again.
        let again = p.load_configs(seeds).unwrap();
        assert_eq!(again, configs);
    }

    #[test]
    fn seeds_not_built_when_both_lists_exist() {
        let p = PersistenceStore::new(MemoryStore::new());
        p.save_configs(&TimerConfigs {
            pomodoros: vec![],
            countdowns: vec![],
        })
        .unwrap();
        let configs = p
            .load_configs(|| panic!("seeds must not be requested"))
            .unwrap();
        assert!(configs.pomodoros.is_empty());
    }

    #[test]
    fn corrupt_configs_fall_back_to_seeds() {
        let store = MemoryStore::new();
        store.put(POMODORO_TIMERS_KEY, "{not json").unwrap();
        store.put(COUNTDOWN_TIMERS_KEY, "[]").unwrap();
        let p = PersistenceStore::new(store);
        let configs = p.load_configs(seeds).unwrap();
        assert_eq!(configs.pomodoros.len(), 1);
        assert_eq!(configs.pomodoros[0].name, "Standard Pomodoro");
        assert!(configs.countdowns.is_empty());
    }

    #[test]
    fn invalid_pomodoro_entries_are_dropped() {
        let p = PersistenceStore::new(MemoryStore::new());
        let mut bad = PomodoroTimerConfig::standard("Bad");
        bad.work_duration = 0;
        let good = PomodoroTimerConfig::standard("Good");
        p.save_configs(&TimerConfigs {
            pomodoros: vec![bad, good.clone()],
            countdowns: vec![],
        })
        .unwrap();
        let configs = p.load_configs(seeds).unwrap();
        assert_eq!(configs.pomodoros, vec![good]);
    }

    #[test]
    fn snapshot_round_trip() {
        let p = PersistenceStore::new(MemoryStore::new());
        assert!(p.load_snapshot().unwrap().is_none());

        let snapshot = EngineSnapshot {
            timer_state: TimerState::Paused,
            phase: Phase::LongBreak,
            time_remaining: 321,
            completed_sessions: 0,
            total_work_time: 9000,
            total_completed_sessions: 6,
            selected_timer_id: Some(uuid::Uuid::new_v4()),
        };
        let at = Utc.with_ymd_and_hms(2026, 4, 4, 10, 30, 0).unwrap();
        p.save_snapshot(&snapshot, at).unwrap();

        let stored = p.load_snapshot().unwrap().unwrap();
        assert_eq!(stored.snapshot, snapshot);
        assert_eq!(stored.observed_at, at);

    }

    #[test]
    fn corrupt_snapshot_reads_as_absent() {
        let store = MemoryStore::new();
        store.put(SNAPSHOT_KEY, "\"garbage\"").unwrap();
        let p = PersistenceStore::new(store);
        assert!(p.load_snapshot().unwrap().is_none());
    }
}
