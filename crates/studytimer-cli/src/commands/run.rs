//! Foreground run loop.
//!
//! Holds the run lease for its whole lifetime, ticks the engine, prints due
//! notifications to stderr and, on Ctrl-C, hands the state over to the
//! background path before exiting.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use studytimer_core::storage::data_dir;
use studytimer_core::storage::lease::LEASE_HEARTBEAT_SECS;
use studytimer_core::timer::run_tick_loop;
use studytimer_core::{Clock, Config, MemoryNotifier, RunLease, SystemClock, TimerError};
use tokio::sync::watch;

use super::{open_service, print_json, CliResult};

pub fn run() -> CliResult {
    let config = Config::load()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_loop(config))
}

async fn run_loop(config: Config) -> CliResult {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut lease = RunLease::acquire(&data_dir()?, clock.now())?;
    let notifier = Arc::new(MemoryNotifier::new(clock.clone()));
    let service = open_service(&config, notifier.clone())?;
    print_json(&service.status())?;

    let service = Arc::new(Mutex::new(service));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tick_every = Duration::from_millis(config.runtime.tick_interval_ms.max(1));
    let refresh_every = (config.runtime.refresh_interval_min > 0)
        .then(|| Duration::from_secs(config.runtime.refresh_interval_min * 60));
    let ticker = tokio::spawn(run_tick_loop(
        service.clone(),
        tick_every,
        refresh_every,
        shutdown_rx,
    ));

    let mut snapshots = service
        .lock()
        .map_err(|_| TimerError::LockPoisoned)?
        .subscribe();
    let mut deliver = tokio::time::interval(tick_every);
    let mut heartbeat = tokio::time::interval(Duration::from_secs(LEASE_HEARTBEAT_SECS));
    let mut last_phase = snapshots.borrow().phase;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.phase != last_phase {
                    last_phase = snapshot.phase;
                    tracing::info!(phase = ?snapshot.phase, remaining = snapshot.time_remaining, "phase changed");
                }
            }
            _ = deliver.tick() => {
                for due in notifier.take_due(clock.now()) {
                    eprintln!("[{}] {}: {}", due.fire_at.format("%H:%M:%S"), due.title, due.body);
                }
            }
            _ = heartbeat.tick() => {
                if let Err(e) = lease.renew(clock.now()) {
                    tracing::warn!("failed to renew run lease: {e}");
                }
            }
        }
    }

    let _ = shutdown_tx.send(true);
    ticker.await??;

    let mut service = service.lock().map_err(|_| TimerError::LockPoisoned)?;
    service.on_enter_background()?;
    print_json(&service.status())?;
    drop(lease);
    Ok(())
}
