//! Scan loop that hands due reminders to the notification channel.
//!
//! Each tick queries events whose notification instant lies in the current
//! cursor window, publishes the ones not yet dispatched and advances the
//! cursor. The cursor and the dispatched set live in the store, so a
//! restarted dispatcher picks up where the previous one stopped without
//! publishing anything twice.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::channel::NotificationChannel;
use crate::error::DispatchError;
use crate::event::Event;
use crate::store::{self, EventStore};
use crate::window::Window;

/// Outcome of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// The window that was scanned
    pub window: Window,
    pub matched: usize,
    pub published: usize,
    /// Already dispatched by an earlier tick or process
    pub skipped: usize,
    pub failed: usize,
}

impl TickReport {
    fn empty(window: Window) -> Self {
        TickReport {
            window,
            matched: 0,
            published: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

pub struct Dispatcher {
    store: Arc<dyn EventStore>,
    channel: Arc<dyn NotificationChannel>,
    interval: Duration,
    step: TimeDelta,
    cursor: Window,
}

impl Dispatcher {
    /// Build a dispatcher positioned at `now`, or at the start of the saved
    /// window when `resume` is set. The saved window is the one the previous
    /// process had not scanned yet, so its start is how far scanning got.
    /// A saved start ahead of the clock falls back to `now`, which only
    /// rescans.
    pub fn new(
        store: Arc<dyn EventStore>,
        channel: Arc<dyn NotificationChannel>,
        interval: Duration,
        resume: bool,
        now: DateTime<Utc>,
    ) -> Result<Self, DispatchError> {
        let saved = if resume { store.load_cursor()? } else { None };

        let cursor = match saved {
            Some(saved) if saved.start <= now => {
                tracing::info!(from = %saved.start, "resuming dispatch from saved cursor");
                Window::empty_at(saved.start)
            }
            Some(saved) => {
                tracing::warn!(saved_start = %saved.start, "saved cursor is ahead of the clock, starting from now");
                Window::empty_at(now)
            }
            None => Window::empty_at(now),
        };

        Self::with_cursor(store, channel, interval, cursor)
    }

    pub fn with_cursor(
        store: Arc<dyn EventStore>,
        channel: Arc<dyn NotificationChannel>,
        interval: Duration,
        cursor: Window,
    ) -> Result<Self, DispatchError> {
        let step = TimeDelta::from_std(interval)
            .ok()
            .filter(|step| *step > TimeDelta::zero())
            .ok_or(DispatchError::InvalidInterval(interval))?;

        Ok(Dispatcher {
            store,
            channel,
            interval,
            step,
            cursor,
        })
    }

    /// The window the next tick will scan.
    pub fn cursor(&self) -> Window {
        self.cursor
    }

    pub async fn tick(&mut self) -> TickReport {
        self.tick_at(Utc::now()).await
    }

    /// Scan the current window, then advance. When the cursor lags behind
    /// `now` (after a restart) the next window stretches to `now` so the
    /// backlog is covered in one scan.
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> TickReport {
        let window = self.cursor;
        let mut report = TickReport::empty(window);

        let query = store::blocking(self.store.clone(), move |store| {
            store.query_notify_range(window.start, window.end)
        });
        match query.await {
            Ok(events) => {
                report.matched = events.len();
                for event in events {
                    self.dispatch(&event, now, &mut report).await;
                }
            }
            Err(e) => {
                tracing::error!(start = %window.start, end = %window.end, error = %e, "failed to query due events");
            }
        }

        let mut next = window.advance(self.step);
        if next.end < now {
            next.end = now;
        }
        self.cursor = next;

        let saved = store::blocking(self.store.clone(), move |store| store.save_cursor(&next)).await;
        if let Err(e) = saved {
            tracing::error!(error = %e, "failed to save dispatch cursor");
        }

        if report.matched > 0 {
            tracing::info!(
                start = %window.start,
                end = %window.end,
                matched = report.matched,
                published = report.published,
                skipped = report.skipped,
                failed = report.failed,
                "dispatch tick"
            );
        } else {
            tracing::debug!(start = %window.start, end = %window.end, "dispatch tick");
        }

        report
    }

    async fn dispatch(&self, event: &Event, now: DateTime<Utc>, report: &mut TickReport) {
        let notify_at = event.notify_at();

        let id = event.id.clone();
        match store::blocking(self.store.clone(), move |store| store.is_dispatched(&id, notify_at)).await {
            Ok(true) => {
                report.skipped += 1;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(id = %event.id, error = %e, "failed to check dispatch record");
                report.failed += 1;
                return;
            }
        }

        if let Err(e) = self.channel.publish(event).await {
            tracing::error!(id = %event.id, error = %e, "failed to publish notification");
            report.failed += 1;
            return;
        }

        report.published += 1;
        tracing::debug!(id = %event.id, %notify_at, "published notification");

        let id = event.id.clone();
        let marked = store::blocking(self.store.clone(), move |store| store.mark_dispatched(&id, notify_at, now)).await;
        if let Err(e) = marked {
            tracing::error!(id = %event.id, error = %e, "failed to record dispatched notification");
        }
    }

    /// Tick, then sleep one interval, until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(interval = %humantime::format_duration(self.interval), "dispatcher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.tick() => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("dispatcher stopped");
    }
}
