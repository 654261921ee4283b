pub mod config;
pub mod countdown;
pub mod run;
pub mod timer;

use serde::Serialize;
use std::sync::Arc;
use studytimer_core::notify::NotificationPort;
use studytimer_core::storage::data_dir;
use studytimer_core::{Clock, Config, Database, LogNotifier, RunLease, SystemClock, TimerService};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open the service over the on-disk store. Opening reconciles a running
/// timer, so every command sees the present.
pub fn open_service(
    config: &Config,
    port: Arc<dyn NotificationPort>,
) -> Result<TimerService<Database>, Box<dyn std::error::Error>> {
    let db = Database::open()?;
    Ok(TimerService::open(db, Arc::new(SystemClock), port, config)?)
}

/// Open with the logging notification port used by one-shot commands.
/// Refuses while a foreground `run` holds the lease.
pub fn open_oneshot(config: &Config) -> Result<TimerService<Database>, Box<dyn std::error::Error>> {
    RunLease::ensure_free(&data_dir()?, SystemClock.now())?;
    open_service(config, Arc::new(LogNotifier))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
