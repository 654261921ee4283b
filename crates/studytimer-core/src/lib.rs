//! # Study Timer Core Library
//!
//! This library provides the core logic for the study timer: a pomodoro
//! cycle engine and exam countdowns that stay correct across process
//! suspension. The `studytimer` CLI is a thin front-end over it.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-anchored state machine driven by a
//!   once-per-second tick while the host is in the foreground
//! - **Reconciliation**: A pure catch-up of the engine after a suspension,
//!   equivalent to having ticked through the gap
//! - **Storage**: SQLite key-value persistence and TOML-based configuration
//! - **Notifications**: Advisory end-of-phase and countdown alerts behind a
//!   pluggable port
//!
//! ## Key Components
//!
//! - [`PomodoroEngine`]: Core timer state machine
//! - [`reconcile`]: Background catch-up
//! - [`TimerService`]: Engine, persistence and lifecycle hooks wired together
//! - [`Database`]: Key-value persistence
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod notify;
pub mod service;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, NotificationError, TimerError, ValidationError};
pub use events::Event;
pub use notify::{
    LogNotifier, MemoryNotifier, NoopNotifier, NotificationId, NotificationPort,
    NotificationScheduler,
};
pub use service::TimerService;
pub use storage::{Config, Database, KeyValueStore, MemoryStore, PersistenceStore, RunLease};
pub use timer::{
    reconcile, run_tick_loop, CountdownTimerConfig, EngineSnapshot, Phase, PomodoroEngine,
    PomodoroTimerConfig, Reconciliation, TimerState,
};
