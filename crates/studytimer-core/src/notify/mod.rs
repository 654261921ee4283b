//! Advisory local notifications.
//!
//! Notifications tell the user a phase or countdown has ended while the
//! app is not looking. They are never consulted for engine state: the
//! wall-clock reconciliation is authoritative. Backend failures are logged
//! and swallowed.

mod memory;

pub use memory::{MemoryNotifier, PendingNotification};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::NotificationError;
use crate::timer::{CountdownTimerConfig, Phase};

/// Notification identifier, namespaced by timer kind so rescheduling one
/// timer never disturbs another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn pomodoro(timer_id: Uuid) -> Self {
        Self(format!("pomodoro_{timer_id}"))
    }

    pub fn countdown(countdown_id: Uuid) -> Self {
        Self(format!("countdown_{countdown_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub id: NotificationId,
    pub fire_after_secs: u64,
    pub title: String,
    pub body: String,
}

/// Host notification backend (OS notification center, terminal, ...).
///
/// Scheduling an id that is already pending replaces it.
pub trait NotificationPort: Send + Sync {
    fn schedule(&self, request: &NotificationRequest) -> Result<(), NotificationError>;

    fn cancel(&self, ids: &[NotificationId]) -> Result<(), NotificationError>;

    fn cancel_all(&self) -> Result<(), NotificationError>;
}

/// Port that only logs. Used when no real backend exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationPort for LogNotifier {
    fn schedule(&self, request: &NotificationRequest) -> Result<(), NotificationError> {
        tracing::info!(
            id = %request.id,
            fire_after_secs = request.fire_after_secs,
            title = %request.title,
            "notification scheduled"
        );
        Ok(())
    }

    fn cancel(&self, ids: &[NotificationId]) -> Result<(), NotificationError> {
        for id in ids {
            tracing::info!(%id, "notification cancelled");
        }
        Ok(())
    }

    fn cancel_all(&self) -> Result<(), NotificationError> {
        tracing::info!("all notifications cancelled");
        Ok(())
    }
}

/// Port that drops everything (notifications disabled).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl NotificationPort for NoopNotifier {
    fn schedule(&self, _request: &NotificationRequest) -> Result<(), NotificationError> {
        Ok(())
    }

    fn cancel(&self, _ids: &[NotificationId]) -> Result<(), NotificationError> {
        Ok(())
    }

    fn cancel_all(&self) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// Fire-and-forget front for a [`NotificationPort`].
#[derive(Clone)]
pub struct NotificationScheduler {
    port: Arc<dyn NotificationPort>,
}

impl fmt::Debug for NotificationScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationScheduler").finish_non_exhaustive()
    }
}

impl NotificationScheduler {
    pub fn new(port: Arc<dyn NotificationPort>) -> Self {
        Self { port }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopNotifier))
    }

    pub fn schedule(&self, id: NotificationId, fire_after_secs: u64, title: &str, body: &str) {
        if fire_after_secs == 0 {
            tracing::debug!(%id, "skipping notification with no lead time");
            return;
        }
        let request = NotificationRequest {
            id,
            fire_after_secs,
            title: title.to_string(),
            body: body.to_string(),
        };
        if let Err(e) = self.port.schedule(&request) {
            tracing::warn!(id = %request.id, error = %e, "failed to schedule notification");
        }
    }

    pub fn cancel(&self, id: &NotificationId) {
        if let Err(e) = self.port.cancel(std::slice::from_ref(id)) {
            tracing::warn!(%id, error = %e, "failed to cancel notification");
        }
    }

    pub fn cancel_all(&self) {
        if let Err(e) = self.port.cancel_all() {
            tracing::warn!(error = %e, "failed to cancel notifications");
        }
    }

    /// Replace the pending end-of-phase notification for a pomodoro timer.
    pub fn schedule_phase_end(&self, timer_id: Uuid, phase: Phase, fire_after_secs: u64) {
        let id = NotificationId::pomodoro(timer_id);
        self.cancel(&id);
        let (title, body) = phase_end_content(phase);
        self.schedule(id, fire_after_secs, title, body);
    }

    /// Replace the pending notification for a countdown; expired countdowns
    /// only get cancelled.
    pub fn schedule_countdown(&self, countdown: &CountdownTimerConfig, now: chrono::DateTime<chrono::Utc>) {
        let id = NotificationId::countdown(countdown.id);
        self.cancel(&id);
        let body = format!("\"{}\" has reached its target date.", countdown.name);
        self.schedule(id, countdown.time_remaining(now), "Countdown finished", &body);
    }
}

fn phase_end_content(phase: Phase) -> (&'static str, &'static str) {
    match phase {
        Phase::Work => ("Work session finished", "Well done! Time for a break."),
        Phase::Break => ("Break is over", "Your break has ended. Time to get back to work!"),
        Phase::LongBreak => (
            "Long break is over",
            "Your long break has ended. Time to get back to work!",
        ),
    }
}
