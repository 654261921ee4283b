mod config;
pub mod cycle;
mod engine;
mod reconcile;
mod snapshot;
mod ticker;

pub use config::{CountdownTimerConfig, Phase, PomodoroTimerConfig};
pub use cycle::PhaseCompletion;
pub use engine::PomodoroEngine;
pub use reconcile::{reconcile, Reconciliation};
pub use snapshot::{EngineSnapshot, StoredSnapshot, TimerState};
pub use ticker::run_tick_loop;
