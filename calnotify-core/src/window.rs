//! Half-open time windows and the day/week/month query helpers built on them.
//!
//! A window always starts at local midnight of the reference instant's
//! calendar day, in the reference's own timezone. Weekly windows do not snap
//! to a canonical week start; callers pass the day they want the week to
//! begin on.

use chrono::{DateTime, Days, Months, NaiveDate, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreResult, WindowError, WindowResult};
use crate::event::Event;
use crate::store::EventStore;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Window { start, end }
    }

    /// Zero-width window at `at`. Matches nothing.
    pub fn empty_at(at: DateTime<Utc>) -> Self {
        Window { start: at, end: at }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// The window immediately following this one, `step` wide.
    pub fn advance(&self, step: TimeDelta) -> Self {
        Window {
            start: self.end,
            end: self.end + step,
        }
    }

    /// The calendar day containing `at`.
    pub fn daily<Tz: TimeZone>(at: &DateTime<Tz>) -> WindowResult<Self> {
        Self::spanning(at, |day| day.checked_add_days(Days::new(1)))
    }

    /// Seven calendar days starting with the day containing `at`.
    pub fn weekly<Tz: TimeZone>(at: &DateTime<Tz>) -> WindowResult<Self> {
        Self::spanning(at, |day| day.checked_add_days(Days::new(7)))
    }

    /// One calendar month starting with the day containing `at`. Days past
    /// the end of a shorter following month clamp to its last day.
    pub fn monthly<Tz: TimeZone>(at: &DateTime<Tz>) -> WindowResult<Self> {
        Self::spanning(at, |day| day.checked_add_months(Months::new(1)))
    }

    fn spanning<Tz, F>(at: &DateTime<Tz>, next: F) -> WindowResult<Self>
    where
        Tz: TimeZone,
        F: FnOnce(NaiveDate) -> Option<NaiveDate>,
    {
        let tz = at.timezone();
        let first_day = at.date_naive();
        let last_day = next(first_day).ok_or(WindowError::Overflow)?;

        Ok(Window {
            start: local_midnight(&tz, first_day)?,
            end: local_midnight(&tz, last_day)?,
        })
    }
}

/// Midnight of `day` in `tz`. Where a DST transition skips midnight, the
/// first valid local instant after it is used.
fn local_midnight<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> WindowResult<DateTime<Utc>> {
    let midnight = day.and_time(chrono::NaiveTime::MIN);

    // Gaps never exceed a few hours; step forward a quarter hour at a time.
    for quarter in 0..=16 {
        let candidate = midnight + TimeDelta::minutes(15 * quarter);
        if let Some(local) = tz.from_local_datetime(&candidate).earliest() {
            return Ok(local.with_timezone(&Utc));
        }
    }

    Err(WindowError::NoLocalMidnight(day))
}

/// A window together with the events scheduled in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventList {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub events: Vec<Event>,
}

/// The three supported query spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }

    pub fn window<Tz: TimeZone>(self, at: &DateTime<Tz>) -> WindowResult<Window> {
        match self {
            Period::Daily => Window::daily(at),
            Period::Weekly => Window::weekly(at),
            Period::Monthly => Window::monthly(at),
        }
    }

    pub fn events<Tz: TimeZone>(self, store: &dyn EventStore, at: &DateTime<Tz>) -> StoreResult<Vec<Event>> {
        match self {
            Period::Daily => daily_events(store, at),
            Period::Weekly => weekly_events(store, at),
            Period::Monthly => monthly_events(store, at),
        }
    }
}

/// Events scheduled on the calendar day containing `at`.
pub fn daily_events<Tz: TimeZone>(store: &dyn EventStore, at: &DateTime<Tz>) -> StoreResult<Vec<Event>> {
    events_in(store, Window::daily(at))
}

/// Events scheduled in the seven days starting with the day containing `at`.
pub fn weekly_events<Tz: TimeZone>(store: &dyn EventStore, at: &DateTime<Tz>) -> StoreResult<Vec<Event>> {
    events_in(store, Window::weekly(at))
}

/// Events scheduled in the calendar month starting with the day containing `at`.
pub fn monthly_events<Tz: TimeZone>(store: &dyn EventStore, at: &DateTime<Tz>) -> StoreResult<Vec<Event>> {
    events_in(store, Window::monthly(at))
}

fn events_in(store: &dyn EventStore, window: WindowResult<Window>) -> StoreResult<Vec<Event>> {
    match window {
        Ok(window) => store.query_range(window.start, window.end),
        // A window that cannot be represented holds no storable events.
        Err(_) => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryEventStore;
    use chrono::{Duration, FixedOffset};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn store_with(times: &[(&str, DateTime<Utc>)]) -> MemoryEventStore {
        let store = MemoryEventStore::new();
        for (id, at) in times {
            store
                .insert(&Event::new(*id, *id, *at, Duration::minutes(30)))
                .unwrap();
        }
        store
    }

    fn ids(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_daily_window_truncates_to_midnight() {
        let window = Window::daily(&utc(2026, 5, 14, 17, 42)).unwrap();
        assert_eq!(window.start, utc(2026, 5, 14, 0, 0));
        assert_eq!(window.end, utc(2026, 5, 15, 0, 0));
    }

    #[test]
    fn test_daily_window_uses_reference_offset() {
        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        let at = offset.with_ymd_and_hms(2026, 5, 14, 1, 30, 0).unwrap();
        let window = Window::daily(&at).unwrap();
        assert_eq!(window.start, utc(2026, 5, 13, 21, 0));
        assert_eq!(window.end, utc(2026, 5, 14, 21, 0));
    }

    #[test]
    fn test_skipped_midnight_starts_at_first_valid_instant() {
        // Clocks jumped from 00:00 to 01:00 on 2018-11-04
        let tz = chrono_tz::America::Sao_Paulo;
        let at = tz.with_ymd_and_hms(2018, 11, 4, 12, 0, 0).unwrap();
        let window = Window::daily(&at).unwrap();
        assert_eq!(window.start, utc(2018, 11, 4, 3, 0));
        assert_eq!(window.end, utc(2018, 11, 5, 2, 0));

        // The day before ends where the shortened day begins
        let before = Window::daily(&tz.with_ymd_and_hms(2018, 11, 3, 12, 0, 0).unwrap()).unwrap();
        assert_eq!(before.end, window.start);
    }

    #[test]
    fn test_repeated_midnight_takes_earliest() {
        // Clocks fell back from 01:00 CDT to 00:00 CST on 2023-11-05
        let tz = chrono_tz::America::Havana;
        let at = tz.with_ymd_and_hms(2023, 11, 5, 12, 0, 0).unwrap();
        let window = Window::daily(&at).unwrap();
        assert_eq!(window.start, utc(2023, 11, 5, 4, 0));
        assert_eq!(window.end, utc(2023, 11, 6, 5, 0));
    }

    #[test]
    fn test_weekly_window_does_not_snap_to_monday() {
        // 2026-05-14 is a Thursday
        let window = Window::weekly(&utc(2026, 5, 14, 8, 0)).unwrap();
        assert_eq!(window.start, utc(2026, 5, 14, 0, 0));
        assert_eq!(window.end, utc(2026, 5, 21, 0, 0));
    }

    #[test]
    fn test_monthly_window_tracks_month_length() {
        let cases = [
            (utc(2026, 2, 1, 12, 0), utc(2026, 3, 1, 0, 0)),
            (utc(2028, 2, 1, 12, 0), utc(2028, 3, 1, 0, 0)),
            (utc(2026, 4, 1, 12, 0), utc(2026, 5, 1, 0, 0)),
            (utc(2026, 12, 1, 12, 0), utc(2027, 1, 1, 0, 0)),
            (utc(2026, 1, 31, 12, 0), utc(2026, 2, 28, 0, 0)),
        ];
        for (at, end) in cases {
            assert_eq!(Window::monthly(&at).unwrap().end, end, "reference {at}");
        }
    }

    #[test]
    fn test_window_is_half_open() {
        let window = Window::new(utc(2026, 1, 1, 0, 0), utc(2026, 1, 2, 0, 0));
        assert!(window.contains(window.start));
        assert!(!window.contains(window.end));
        assert!(!Window::empty_at(window.start).contains(window.start));
    }

    #[test]
    fn test_daily_events_boundaries() {
        let t = utc(2026, 6, 10, 0, 0);
        let store = store_with(&[("at-midnight", t)]);

        assert_eq!(ids(&daily_events(&store, &t).unwrap()), vec!["at-midnight"]);
        assert!(daily_events(&store, &(t + Duration::hours(25))).unwrap().is_empty());
        // One millisecond earlier is the previous day
        assert!(daily_events(&store, &(t - Duration::milliseconds(1))).unwrap().is_empty());

        let noon = utc(2026, 6, 10, 12, 0);
        let store = store_with(&[("noon", noon)]);
        assert_eq!(
            ids(&daily_events(&store, &(noon - Duration::milliseconds(1))).unwrap()),
            vec!["noon"]
        );
    }

    #[test]
    fn test_weekly_events_include_exactly_seven_days() {
        let d = utc(2026, 6, 10, 15, 0);
        let store = store_with(&[
            ("before", utc(2026, 6, 9, 23, 59)),
            ("first", utc(2026, 6, 10, 0, 0)),
            ("last", utc(2026, 6, 16, 23, 59)),
            ("after", utc(2026, 6, 17, 0, 0)),
        ]);
        assert_eq!(ids(&weekly_events(&store, &d).unwrap()), vec!["first", "last"]);
    }

    #[test]
    fn test_period_dispatches_to_matching_window() {
        let at = utc(2026, 4, 30, 10, 0);
        let store = store_with(&[("may-29", utc(2026, 5, 29, 9, 0)), ("may-31", utc(2026, 5, 31, 9, 0))]);

        assert_eq!(Period::Weekly.window(&at).unwrap(), Window::weekly(&at).unwrap());
        // April 30 + one month is May 30
        assert_eq!(ids(&Period::Monthly.events(&store, &at).unwrap()), vec!["may-29"]);
        assert!(Period::Daily.events(&store, &at).unwrap().is_empty());
        assert_eq!(serde_json::to_string(&Period::Daily).unwrap(), "\"daily\"");
    }

    #[test]
    fn test_monthly_events_span_february() {
        let store = store_with(&[
            ("feb-1", utc(2028, 2, 1, 0, 0)),
            ("leap-day", utc(2028, 2, 29, 18, 0)),
            ("mar-1", utc(2028, 3, 1, 0, 0)),
        ]);
        assert_eq!(
            ids(&monthly_events(&store, &utc(2028, 2, 1, 9, 0)).unwrap()),
            vec!["feb-1", "leap-day"]
        );
    }
}
