//! File-backed lease held by the foreground `run` loop.
//!
//! While a run loop owns the timer it keeps its own copy of the engine in
//! memory and writes it back on every phase change and on exit. One-shot
//! commands check the lease and refuse to touch the store while it is
//! fresh, so their edits cannot be overwritten behind their back.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, TimerError};

pub const LEASE_FILE: &str = "run.lock";

/// A lease whose heartbeat is older than this is considered abandoned.
pub const LEASE_TTL_SECS: i64 = 15;

/// How often the holder should call [`RunLease::renew`].
pub const LEASE_HEARTBEAT_SECS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LeaseRecord {
    pid: u32,
    started_at: DateTime<Utc>,
    heartbeat_at: DateTime<Utc>,
}

impl LeaseRecord {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.heartbeat_at + Duration::seconds(LEASE_TTL_SECS) > now
    }
}

/// Exclusive ownership of the data directory. Dropping it releases the
/// lease.
#[derive(Debug)]
pub struct RunLease {
    path: PathBuf,
    record: LeaseRecord,
}

impl RunLease {
    /// Take the lease in `dir`, evicting an abandoned one.
    ///
    /// # Errors
    /// Returns [`TimerError::RunActive`] if another process holds a fresh
    /// lease, or an I/O error if the lease file cannot be written.
    pub fn acquire(dir: &Path, now: DateTime<Utc>) -> Result<Self> {
        let path = dir.join(LEASE_FILE);
        let record = LeaseRecord {
            pid: std::process::id(),
            started_at: now,
            heartbeat_at: now,
        };

        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(&serde_json::to_vec(&record)?)?;
                    tracing::info!(path = %path.display(), pid = record.pid, "run lease acquired");
                    return Ok(Self { path, record });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if let Some(holder) = read_record(&path)? {
                        if holder.is_fresh(now) {
                            return Err(TimerError::RunActive { pid: holder.pid }.into());
                        }
                        tracing::warn!(pid = holder.pid, heartbeat_at = %holder.heartbeat_at, "evicting stale run lease");
                    }
                    remove_if_present(&path)?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(std::io::Error::from(std::io::ErrorKind::AlreadyExists).into())
    }

    /// Fail if a fresh lease exists in `dir`. A missing or stale lease is
    /// left for the next [`RunLease::acquire`] to clean up.
    ///
    /// # Errors
    /// Returns [`TimerError::RunActive`] while a run loop holds the lease.
    pub fn ensure_free(dir: &Path, now: DateTime<Utc>) -> Result<()> {
        match read_record(&dir.join(LEASE_FILE))? {
            Some(holder) if holder.is_fresh(now) => {
                Err(TimerError::RunActive { pid: holder.pid }.into())
            }
            _ => Ok(()),
        }
    }

    /// Push the heartbeat forward.
    ///
    /// # Errors
    /// Returns an error if the lease file cannot be rewritten.
    pub fn renew(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.record.heartbeat_at = now;
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, serde_json::to_vec(&self.record)?)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl Drop for RunLease {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        tracing::debug!(path = %self.path.display(), "run lease released");
    }
}

fn read_record(path: &Path) -> Result<Option<LeaseRecord>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_slice(&bytes) {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            tracing::warn!(path = %path.display(), "ignoring malformed run lease: {e}");
            Ok(None)
        }
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()
    }

    fn held_by(result: Result<impl std::fmt::Debug>) -> u32 {
        match result {
            Err(CoreError::Timer(TimerError::RunActive { pid })) => pid,
            other => panic!("expected an active run, got {other:?}"),
        }
    }

    #[test]
    fn lease_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let lease = RunLease::acquire(dir.path(), t0()).unwrap();
        assert!(dir.path().join(LEASE_FILE).exists());

        let later = t0() + Duration::seconds(3);
        assert_eq!(held_by(RunLease::acquire(dir.path(), later)), std::process::id());
        assert_eq!(held_by(RunLease::ensure_free(dir.path(), later)), std::process::id());

        drop(lease);
        assert!(!dir.path().join(LEASE_FILE).exists());
        RunLease::ensure_free(dir.path(), later).unwrap();
        RunLease::acquire(dir.path(), later).unwrap();
    }

    #[test]
    fn renew_keeps_the_lease_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut lease = RunLease::acquire(dir.path(), t0()).unwrap();
        let renewed_at = t0() + Duration::seconds(LEASE_TTL_SECS - 1);
        lease.renew(renewed_at).unwrap();

        let check_at = t0() + Duration::seconds(LEASE_TTL_SECS + 5);
        assert!(RunLease::ensure_free(dir.path(), check_at).is_err());
        assert!(!dir.path().join("run.tmp").exists());
    }

    #[test]
    fn abandoned_lease_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let stale = RunLease::acquire(dir.path(), t0()).unwrap();
        // Simulate a crashed holder: the file stays behind.
        std::mem::forget(stale);

        let later = t0() + Duration::seconds(LEASE_TTL_SECS);
        RunLease::ensure_free(dir.path(), later).unwrap();
        let taken = RunLease::acquire(dir.path(), later).unwrap();
        assert_eq!(taken.record.started_at, later);
    }

    #[test]
    fn malformed_lease_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LEASE_FILE), "{\"pid\":").unwrap();
        RunLease::ensure_free(dir.path(), t0()).unwrap();
        RunLease::acquire(dir.path(), t0()).unwrap();
    }
}
