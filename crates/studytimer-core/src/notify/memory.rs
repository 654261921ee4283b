use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::{NotificationId, NotificationPort, NotificationRequest};
use crate::clock::Clock;
use crate::error::NotificationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingNotification {
    pub id: NotificationId,
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

/// In-process notification port that keeps pending requests in memory.
///
/// The CLI run loop drains due entries with [`MemoryNotifier::take_due`];
/// tests inspect [`MemoryNotifier::pending`]. An entry that was already
/// due when it got replaced or cancelled counts as delivered and is still
/// handed out by the next `take_due`.
pub struct MemoryNotifier {
    clock: Arc<dyn Clock>,
    inbox: Mutex<Inbox>,
}

#[derive(Default)]
struct Inbox {
    pending: BTreeMap<NotificationId, PendingNotification>,
    fired: Vec<PendingNotification>,
}

impl Inbox {
    fn retire(&mut self, id: &NotificationId, now: DateTime<Utc>) {
        if let Some(old) = self.pending.remove(id) {
            if old.fire_at <= now {
                self.fired.push(old);
            }
        }
    }
}

impl MemoryNotifier {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inbox: Mutex::new(Inbox::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inbox> {
        self.inbox.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn pending(&self) -> Vec<PendingNotification> {
        let mut all: Vec<_> = self.lock().pending.values().cloned().collect();
        all.sort_by_key(|p| p.fire_at);
        all
    }

    pub fn get(&self, id: &NotificationId) -> Option<PendingNotification> {
        self.lock().pending.get(id).cloned()
    }

    /// Remove and return everything due at or before `now`.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<PendingNotification> {
        let mut inbox = self.lock();
        let due: Vec<NotificationId> = inbox
            .pending
            .values()
            .filter(|p| p.fire_at <= now)
            .map(|p| p.id.clone())
            .collect();
        let mut fired = std::mem::take(&mut inbox.fired);
        fired.extend(due.iter().filter_map(|id| inbox.pending.remove(id)));
        fired.sort_by_key(|p| p.fire_at);
        fired
    }
}

impl NotificationPort for MemoryNotifier {
    fn schedule(&self, request: &NotificationRequest) -> Result<(), NotificationError> {
        let now = self.clock.now();
        let fire_at = now + Duration::seconds(request.fire_after_secs as i64);
        let mut inbox = self.lock();
        inbox.retire(&request.id, now);
        inbox.pending.insert(
            request.id.clone(),
            PendingNotification {
                id: request.id.clone(),
                fire_at,
                title: request.title.clone(),
                body: request.body.clone(),
            },
        );
        Ok(())
    }

    fn cancel(&self, ids: &[NotificationId]) -> Result<(), NotificationError> {
        let now = self.clock.now();
        let mut inbox = self.lock();
        for id in ids {
            inbox.retire(id, now);
        }
        Ok(())
    }

    fn cancel_all(&self) -> Result<(), NotificationError> {
        let now = self.clock.now();
        let mut inbox = self.lock();
        let ids: Vec<NotificationId> = inbox.pending.keys().cloned().collect();
        for id in &ids {
            inbox.retire(id, now);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use uuid::Uuid;

    #[test]
    fn take_due_drains_only_due_entries() {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let port = MemoryNotifier::new(clock.clone());

        let soon = NotificationId::pomodoro(Uuid::new_v4());
        let later = NotificationId::countdown(Uuid::new_v4());
        for (id, secs) in [(soon.clone(), 60), (later.clone(), 3600)] {
            port.schedule(&NotificationRequest {
                id,
                fire_after_secs: secs,
                title: "t".into(),
                body: "b".into(),
            })
            .unwrap();
        }

        let fired = port.take_due(start + Duration::seconds(61));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, soon);
        assert_eq!(port.pending().len(), 1);
        assert!(port.get(&later).is_some());
    }

    #[test]
    fn due_entry_survives_replacement() {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let port = MemoryNotifier::new(clock.clone());
        let id = NotificationId::pomodoro(Uuid::new_v4());
        let request = |secs, title: &str| NotificationRequest {
            id: id.clone(),
            fire_after_secs: secs,
            title: title.into(),
            body: "b".into(),
        };

        port.schedule(&request(60, "first")).unwrap();
        // Replaced before it was due: dropped.
        clock.advance_secs(30);
        port.schedule(&request(60, "second")).unwrap();
        // Replaced after it was due: still delivered.
        clock.advance_secs(60);
        port.schedule(&request(300, "third")).unwrap();

        let fired = port.take_due(clock.now());
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].title, "second");
        assert_eq!(port.get(&id).unwrap().title, "third");
        assert!(port.take_due(clock.now()).is_empty());
    }
}
