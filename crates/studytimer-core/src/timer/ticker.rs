//! Tokio driver for [`TimerService::tick`].

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::error::{Result, TimerError};
use crate::service::TimerService;
use crate::storage::KeyValueStore;

/// Tick `service` every `every` until `shutdown` turns true.
///
/// When `refresh_every` is set, advisory notifications are re-issued on
/// that cadence as well. Each step holds the lock only for the duration
/// of one synchronous call.
pub async fn run_tick_loop<S: KeyValueStore>(
    service: Arc<Mutex<TimerService<S>>>,
    every: Duration,
    refresh_every: Option<Duration>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut ticks = interval(every);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut refresh = refresh_every.map(|period| {
        let mut refresh = interval(period);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
        refresh
    });

    tracing::debug!(interval_ms = every.as_millis() as u64, "tick loop started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticks.tick() => {
                let events = service
                    .lock()
                    .map_err(|_| TimerError::LockPoisoned)?
                    .tick()?;
                for event in &events {
                    tracing::debug!(?event, "tick");
                }
            }
            _ = async {
                match refresh.as_mut() {
                    Some(refresh) => refresh.tick().await,
                    None => std::future::pending().await,
                }
            } => {
                service
                    .lock()
                    .map_err(|_| TimerError::LockPoisoned)?
                    .refresh_notifications();
            }
        }
    }
    tracing::debug!("tick loop stopped");
    Ok(())
}
