// src/sinks/snapshots.rs

//! Turns the stream of profile scrapes into profile changes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::events::{Event, EventHub, Topic};
use crate::models::UserSnapshot;

/// Remembers the last snapshot per user and emits `new_user_snapshot` when
/// anything but the scrape time changed.
#[derive(Debug, Clone, Default)]
pub struct SnapshotTracker {
    last: Arc<Mutex<HashMap<u64, UserSnapshot>>>,
}

impl SnapshotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, hub: &EventHub) {
        let tracker = self.clone();
        hub.on(&Topic::user_snapshot(), move |hub, event| {
            let tracker = tracker.clone();
            async move {
                if let Event::UserSnapshot(snapshot) = &*event {
                    if let Some(change) = tracker.record(snapshot.clone()) {
                        hub.emit(&Topic::new_user_snapshot(), change);
                    }
                }
                Ok(())
            }
        });
    }

    /// Store `snapshot`, returning the change event if it differs from the
    /// stored one.
    pub fn record(&self, snapshot: UserSnapshot) -> Option<Event> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = last.get(&snapshot.user_id);
        if previous.is_some_and(|p| p.same_state(&snapshot)) {
            return None;
        }
        let previous = last.insert(snapshot.user_id, snapshot.clone());
        log::debug!("User {} ({}) changed", snapshot.username, snapshot.user_id);
        Some(Event::NewUserSnapshot { snapshot, previous })
    }

    pub fn get(&self, user_id: u64) -> Option<UserSnapshot> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::models::Role;

    #[test]
    fn test_record_ignores_timestamp_only_changes() {
        let tracker = SnapshotTracker::new();
        let first = UserSnapshot::new(4153, Utc::now(), "RybeR", None);
        let Some(Event::NewUserSnapshot { previous, .. }) = tracker.record(first.clone()) else {
            panic!("first snapshot is a change");
        };
        assert_eq!(previous, None);

        let mut later = first.clone();
        later.timestamp += chrono::Duration::minutes(10);
        assert!(tracker.record(later).is_none());
        assert_eq!(tracker.get(4153), Some(first.clone()));

        let promoted = UserSnapshot::new(4153, Utc::now(), "RybeR", Some(Role::Ranger));
        let Some(Event::NewUserSnapshot { snapshot, previous }) = tracker.record(promoted.clone())
        else {
            panic!("role change is a change");
        };
        assert_eq!(snapshot, promoted);
        assert_eq!(previous, Some(first));
    }

    #[tokio::test]
    async fn test_emits_new_user_snapshot() {
        let hub = EventHub::new(4);
        SnapshotTracker::new().register(&hub);
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.on(&Topic::new_user_snapshot(), move |_, event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send((*event).clone());
                Ok(())
            }
        });

        let snap = UserSnapshot::new(1, Utc::now(), "Ffff", None);
        hub.emit(&Topic::user_snapshot(), Event::UserSnapshot(snap.clone()));
        let received = timeout(Duration::from_millis(100), rx.recv()).await.unwrap();
        assert_eq!(
            received,
            Some(Event::NewUserSnapshot {
                snapshot: snap.clone(),
                previous: None
            })
        );

        hub.emit(&Topic::user_snapshot(), Event::UserSnapshot(snap));
        assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());
    }
}
