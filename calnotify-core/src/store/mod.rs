//! Event storage.
//!
//! `EventStore` owns every event record and the dispatcher's bookkeeping
//! (scan cursor and the set of reminders already handed to the channel).
//! Each method is atomic: existence checks and the mutation they guard run
//! as one operation.
//!
//! Range queries are half-open, `[start, end)`.

mod memory;
mod migrations;
mod sqlite;

pub use memory::MemoryEventStore;
pub use migrations::latest_version;
pub(crate) use migrations::open_connection;
pub use sqlite::SqliteEventStore;

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::StoreResult;
use crate::event::Event;
use crate::window::Window;

pub trait EventStore: Send + Sync {
    /// Persist a new event. Fails with `DuplicateId` if the id is taken.
    fn insert(&self, event: &Event) -> StoreResult<()>;

    /// Replace the event stored under `id`. Fails with `NotFound` if absent.
    ///
    /// When `event.id` differs from `id` the record is renamed; this fails
    /// with `DuplicateId` if another event already uses `event.id`.
    fn update(&self, id: &str, event: &Event) -> StoreResult<()>;

    /// Delete the event stored under `id`. Fails with `NotFound` if absent.
    fn remove(&self, id: &str) -> StoreResult<()>;

    fn get(&self, id: &str) -> StoreResult<Option<Event>>;

    /// Events with `start <= scheduled_at < end`, ordered by `scheduled_at`.
    fn query_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<Vec<Event>>;

    /// Events whose notification instant lies in `[start, end)`, ordered by
    /// notification instant.
    fn query_notify_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<Vec<Event>>;

    /// Last cursor saved by the dispatcher, if any.
    fn load_cursor(&self) -> StoreResult<Option<Window>>;

    fn save_cursor(&self, cursor: &Window) -> StoreResult<()>;

    /// Whether the reminder for `id` due at `notify_at` was already published.
    fn is_dispatched(&self, id: &str, notify_at: DateTime<Utc>) -> StoreResult<bool>;

    fn mark_dispatched(&self, id: &str, notify_at: DateTime<Utc>, at: DateTime<Utc>) -> StoreResult<()>;

    /// Release the underlying resources. Later calls fail with `Closed`.
    fn close(&self) -> StoreResult<()>;
}

/// Run a store call on the blocking thread pool. A SQLite call can wait up
/// to the busy timeout on another connection's lock.
pub async fn blocking<T, F>(store: Arc<dyn EventStore>, f: F) -> StoreResult<T>
where
    F: FnOnce(&dyn EventStore) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(store.as_ref())).await?
}

/// Order used by every range query: by instant, ties broken by id.
fn sort_by_instant(events: &mut [Event], key: impl Fn(&Event) -> DateTime<Utc>) {
    events.sort_by(|a, b| key(a).cmp(&key(b)).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
pub(crate) mod contract {
    //! Behaviour every `EventStore` backend must share.

    use super::*;
    use crate::error::StoreError;
    use chrono::{Duration, TimeZone};

    pub fn event(id: &str, at: DateTime<Utc>, lead_minutes: i32) -> Event {
        let mut event = Event::new(id, format!("Meeting {id}"), at, Duration::hours(1));
        event.owner = "alice".to_string();
        event.description = "weekly sync".to_string();
        event.lead_minutes = lead_minutes;
        event
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 10, 0, 0).unwrap()
    }

    pub fn insert_then_duplicate(store: &dyn EventStore) {
        let first = event("e1", base(), 10);
        store.insert(&first).unwrap();

        let mut clash = event("e1", base() + Duration::days(1), 0);
        clash.header = "Other".to_string();
        let err = store.insert(&clash).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(ref id) if id == "e1"));

        assert_eq!(store.get("e1").unwrap(), Some(first));
    }

    pub fn update_and_remove_missing(store: &dyn EventStore) {
        store.insert(&event("present", base(), 0)).unwrap();

        let err = store.update("ghost", &event("ghost", base(), 0)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref id) if id == "ghost"));
        let err = store.remove("ghost").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let all = store
            .query_range(base() - Duration::days(1), base() + Duration::days(1))
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "present");
    }

    pub fn update_replaces_and_renames(store: &dyn EventStore) {
        store.insert(&event("a", base(), 0)).unwrap();
        store.insert(&event("b", base(), 0)).unwrap();

        let mut moved = event("a", base() + Duration::hours(3), 5);
        moved.header = "Moved".to_string();
        store.update("a", &moved).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(moved.clone()));

        let renamed = event("c", base(), 0);
        store.update("a", &renamed).unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("c").unwrap(), Some(renamed));

        let err = store.update("c", &event("b", base(), 0)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(ref id) if id == "b"));
        assert!(store.get("c").unwrap().is_some());
    }

    pub fn rejects_invalid_records(store: &dyn EventStore) {
        let mut bad = event("bad", base(), 0);
        bad.duration.end = bad.duration.start - Duration::minutes(1);
        assert!(matches!(store.insert(&bad), Err(StoreError::Validation(_))));
        assert_eq!(store.get("bad").unwrap(), None);
    }

    pub fn ranges_are_half_open(store: &dyn EventStore) {
        store.insert(&event("start", base(), 0)).unwrap();
        store.insert(&event("end", base() + Duration::hours(1), 0)).unwrap();

        let hits = store.query_range(base(), base() + Duration::hours(1)).unwrap();
        assert_eq!(hits.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["start"]);
        assert!(store.query_range(base() - Duration::days(3), base() - Duration::days(2)).unwrap().is_empty());
    }

    pub fn notify_range_uses_lead_time(store: &dyn EventStore) {
        // notify at 09:30, 09:50 and 10:00
        store.insert(&event("late", base(), 0)).unwrap();
        store.insert(&event("early", base(), 30)).unwrap();
        store.insert(&event("mid", base(), 10)).unwrap();

        let hits = store
            .query_notify_range(base() - Duration::minutes(30), base())
            .unwrap();
        assert_eq!(hits.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["early", "mid"]);
    }

    pub fn dispatch_bookkeeping(store: &dyn EventStore) {
        assert_eq!(store.load_cursor().unwrap(), None);
        let cursor = Window::new(base(), base() + Duration::seconds(10));
        store.save_cursor(&cursor).unwrap();
        assert_eq!(store.load_cursor().unwrap(), Some(cursor));

        let e = event("e1", base(), 0);
        store.insert(&e).unwrap();
        assert!(!store.is_dispatched("e1", e.notify_at()).unwrap());
        store.mark_dispatched("e1", e.notify_at(), base()).unwrap();
        store.mark_dispatched("e1", e.notify_at(), base()).unwrap();
        assert!(store.is_dispatched("e1", e.notify_at()).unwrap());
        assert!(!store.is_dispatched("e1", e.notify_at() + Duration::minutes(1)).unwrap());

        // A rename carries the record along, a removal drops it.
        store.update("e1", &event("e2", base(), 0)).unwrap();
        assert!(store.is_dispatched("e2", e.notify_at()).unwrap());
        store.remove("e2").unwrap();
        assert!(!store.is_dispatched("e2", e.notify_at()).unwrap());
    }

    pub fn closed_store_refuses_work(store: &dyn EventStore) {
        store.close().unwrap();
        assert!(matches!(store.get("x"), Err(StoreError::Closed)));
        assert!(matches!(store.insert(&event("x", base(), 0)), Err(StoreError::Closed)));
    }
}
