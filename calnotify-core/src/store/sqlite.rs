//! SQLite-backed event store.
//!
//! Timestamps are stored as nanoseconds since the Unix epoch so range
//! filters are plain integer comparisons and records round-trip exactly.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use std::path::Path;
use std::sync::Mutex;

use super::EventStore;
use super::migrations::open_connection;
use crate::error::{StoreError, StoreResult};
use crate::event::{Event, EventDuration};
use crate::window::Window;

const EVENT_COLUMNS: &str =
    "uuid, header, description, owner, scheduled_at, duration_start, duration_end, lead_minutes";

pub struct SqliteEventStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteEventStore {
    /// Open (creating if needed) the database at `path`. `:memory:` opens a
    /// private in-memory database.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = open_connection(path)?;
        tracing::info!(path = %path.display(), "opened event store");

        Ok(SqliteEventStore {
            conn: Mutex::new(Some(conn)),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open(":memory:")
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let conn = guard.as_mut().ok_or(StoreError::Closed)?;
        f(conn)
    }

    fn select(&self, column: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<Vec<Event>> {
        let (start, end) = (to_nanos(start)?, to_nanos(end)?);

        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {EVENT_COLUMNS} FROM events
                 WHERE {column} >= ?1 AND {column} < ?2
                 ORDER BY {column}, uuid"
            ))?;
            let rows = stmt.query_map(params![start, end], parse_event_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }
}

impl EventStore for SqliteEventStore {
    fn insert(&self, event: &Event) -> StoreResult<()> {
        event.validate()?;
        let row = EventRow::from_event(event)?;

        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if row_id(&tx, &event.id)?.is_some() {
                return Err(StoreError::DuplicateId(event.id.clone()));
            }

            tx.execute(
                "INSERT INTO events (
                    uuid, header, description, owner,
                    scheduled_at, notify_at, duration_start, duration_end, lead_minutes
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    event.id,
                    event.header,
                    event.description,
                    event.owner,
                    row.scheduled_at,
                    row.notify_at,
                    row.duration_start,
                    row.duration_end,
                    event.lead_minutes,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    fn update(&self, id: &str, event: &Event) -> StoreResult<()> {
        event.validate()?;
        let row = EventRow::from_event(event)?;

        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(existing) = row_id(&tx, id)? else {
                return Err(StoreError::NotFound(id.to_string()));
            };
            let renamed = event.id != id;
            if renamed && row_id(&tx, &event.id)?.is_some() {
                return Err(StoreError::DuplicateId(event.id.clone()));
            }

            tx.execute(
                "UPDATE events SET
                    uuid = ?1, header = ?2, description = ?3, owner = ?4,
                    scheduled_at = ?5, notify_at = ?6,
                    duration_start = ?7, duration_end = ?8, lead_minutes = ?9
                 WHERE id = ?10",
                params![
                    event.id,
                    event.header,
                    event.description,
                    event.owner,
                    row.scheduled_at,
                    row.notify_at,
                    row.duration_start,
                    row.duration_end,
                    event.lead_minutes,
                    existing,
                ],
            )?;
            if renamed {
                tx.execute(
                    "UPDATE dispatched SET uuid = ?1 WHERE uuid = ?2",
                    params![event.id, id],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn remove(&self, id: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let removed = tx.execute("DELETE FROM events WHERE uuid = ?1", params![id])?;
            if removed == 0 {
                return Err(StoreError::NotFound(id.to_string()));
            }
            tx.execute("DELETE FROM dispatched WHERE uuid = ?1", params![id])?;
            tx.commit()?;
            Ok(())
        })
    }

    fn get(&self, id: &str) -> StoreResult<Option<Event>> {
        self.with_conn(|conn| {
            let event = conn
                .query_row(
                    &format!("SELECT {EVENT_COLUMNS} FROM events WHERE uuid = ?1"),
                    params![id],
                    parse_event_row,
                )
                .optional()?;
            Ok(event)
        })
    }

    fn query_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<Vec<Event>> {
        self.select("scheduled_at", start, end)
    }

    fn query_notify_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<Vec<Event>> {
        self.select("notify_at", start, end)
    }

    fn load_cursor(&self) -> StoreResult<Option<Window>> {
        self.with_conn(|conn| {
            let cursor = conn
                .query_row(
                    "SELECT window_start, window_end FROM dispatch_cursor WHERE id = 1",
                    [],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?;
            Ok(cursor.map(|(start, end)| Window::new(from_nanos(start), from_nanos(end))))
        })
    }

    fn save_cursor(&self, cursor: &Window) -> StoreResult<()> {
        let (start, end) = (to_nanos(cursor.start)?, to_nanos(cursor.end)?);

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO dispatch_cursor (id, window_start, window_end) VALUES (1, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET
                    window_start = excluded.window_start,
                    window_end = excluded.window_end",
                params![start, end],
            )?;
            Ok(())
        })
    }

    fn is_dispatched(&self, id: &str, notify_at: DateTime<Utc>) -> StoreResult<bool> {
        let notify_at = to_nanos(notify_at)?;

        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM dispatched WHERE uuid = ?1 AND notify_at = ?2",
                    params![id, notify_at],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    fn mark_dispatched(&self, id: &str, notify_at: DateTime<Utc>, at: DateTime<Utc>) -> StoreResult<()> {
        let (notify_at, at) = (to_nanos(notify_at)?, to_nanos(at)?);

        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO dispatched (uuid, notify_at, dispatched_at) VALUES (?1, ?2, ?3)",
                params![id, notify_at, at],
            )?;
            Ok(())
        })
    }

    fn close(&self) -> StoreResult<()> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| StoreError::Database(e))?;
            tracing::info!("closed event store");
        }
        Ok(())
    }
}

/// Timestamp columns of an event, pre-converted for binding.
struct EventRow {
    scheduled_at: i64,
    notify_at: i64,
    duration_start: i64,
    duration_end: i64,
}

impl EventRow {
    fn from_event(event: &Event) -> StoreResult<Self> {
        Ok(EventRow {
            scheduled_at: to_nanos(event.scheduled_at)?,
            notify_at: to_nanos(event.notify_at())?,
            duration_start: to_nanos(event.duration.start)?,
            duration_end: to_nanos(event.duration.end)?,
        })
    }
}

fn row_id(conn: &Connection, uuid: &str) -> StoreResult<Option<i64>> {
    let id = conn
        .query_row("SELECT id FROM events WHERE uuid = ?1", params![uuid], |row| row.get(0))
        .optional()?;
    Ok(id)
}

fn parse_event_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        header: row.get(1)?,
        description: row.get(2)?,
        owner: row.get(3)?,
        scheduled_at: from_nanos(row.get(4)?),
        duration: EventDuration::new(from_nanos(row.get(5)?), from_nanos(row.get(6)?)),
        lead_minutes: row.get(7)?,
    })
}

fn to_nanos(at: DateTime<Utc>) -> StoreResult<i64> {
    at.timestamp_nanos_opt()
        .ok_or_else(|| StoreError::InvalidData(format!("timestamp {at} out of range")))
}

fn from_nanos(nanos: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos)
}
