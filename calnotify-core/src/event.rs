//! The event record shared by the store, the dispatcher and the notifier.
//!
//! Serialized with camelCase field names; this is both the HTTP body and the
//! notification channel message format.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// A calendar event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Caller-assigned identifier, unique within the store
    pub id: String,
    pub header: String,
    /// When the event happens
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner: String,
    /// Minutes before `scheduled_at` at which the reminder fires
    #[serde(default)]
    pub lead_minutes: i32,
    pub duration: EventDuration,
}

/// Start and end of the event itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDuration {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EventDuration {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        EventDuration { start, end }
    }
}

impl Event {
    /// Create an event occupying `[scheduled_at, scheduled_at + length]`
    /// with no lead time.
    pub fn new(id: impl Into<String>, header: impl Into<String>, scheduled_at: DateTime<Utc>, length: Duration) -> Self {
        Event {
            id: id.into(),
            header: header.into(),
            scheduled_at,
            description: String::new(),
            owner: String::new(),
            lead_minutes: 0,
            duration: EventDuration::new(scheduled_at, scheduled_at + length),
        }
    }

    /// The instant at which the reminder becomes due.
    pub fn notify_at(&self) -> DateTime<Utc> {
        self.scheduled_at - Duration::minutes(i64::from(self.lead_minutes))
    }

    /// Check record invariants. Called on every write path.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if self.lead_minutes < 0 {
            return Err(ValidationError::NegativeLead {
                id: self.id.clone(),
                minutes: self.lead_minutes,
            });
        }
        if self.duration.start > self.duration.end {
            return Err(ValidationError::InvalidDuration(self.id.clone()));
        }

        let timestamps = [
            self.scheduled_at,
            self.notify_at(),
            self.duration.start,
            self.duration.end,
        ];
        if timestamps.iter().any(|ts| ts.timestamp_nanos_opt().is_none()) {
            return Err(ValidationError::TimestampOutOfRange(self.id.clone()));
        }

        Ok(())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.header, self.id)
    }
}
