//! Drains the notification channel and delivers one message per event.

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use futures::StreamExt;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::channel::{self, NotificationChannel};
use crate::error::DeliveryError;
use crate::event::Event;

/// What the user is told about an upcoming event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: String,
    pub owner: String,
    pub at: DateTime<Utc>,
    pub header: String,
    pub description: String,
}

impl From<&Event> for Notification {
    fn from(event: &Event) -> Self {
        Notification {
            id: event.id.clone(),
            owner: event.owner.clone(),
            at: event.scheduled_at,
            header: event.header.clone(),
            description: event.description.clone(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = self.at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        write!(
            f,
            "New meeting for {} at {}\nSubject: {}\nDescription: {}",
            self.owner, at, self.header, self.description
        )
    }
}

/// Final destination of a notification.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Emits each notification as a structured log record.
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn deliver(&self, n: &Notification) -> Result<(), DeliveryError> {
        tracing::info!(
            id = %n.id,
            owner = %n.owner,
            at = %n.at,
            header = %n.header,
            description = %n.description,
            "new meeting"
        );
        Ok(())
    }
}

/// Prints the rendered notification to stdout.
pub struct StdoutSink;

#[async_trait]
impl NotificationSink for StdoutSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{notification}\n")?;
        out.flush()?;
        Ok(())
    }
}

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct Notifier {
    channel: Arc<dyn NotificationChannel>,
    sink: Arc<dyn NotificationSink>,
    retry_delay: Duration,
}

impl Notifier {
    pub fn new(channel: Arc<dyn NotificationChannel>, sink: Arc<dyn NotificationSink>) -> Self {
        Notifier {
            channel,
            sink,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Pause after a failed receive before asking the channel again.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Deliver a single received event. Sink failures are logged, never
    /// retried.
    pub async fn handle(&self, event: &Event) {
        let notification = Notification::from(event);
        if let Err(e) = self.sink.deliver(&notification).await {
            tracing::error!(id = %event.id, error = %e, "failed to deliver notification");
        }
    }

    /// Receive and deliver until `cancel` fires or the channel closes.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!("notifier started");
        let mut events = Box::pin(channel::stream(self.channel.clone()));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = events.next() => match next {
                    Some(Ok(event)) => self.handle(&event).await,
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "failed to receive notification");
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(self.retry_delay) => {}
                        }
                    }
                    None => break,
                },
            }
        }

        tracing::info!("notifier stopped");
    }
}
