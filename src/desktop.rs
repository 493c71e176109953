//! Desktop notification sink.

use async_trait::async_trait;
use calnotify_core::DeliveryError;
use calnotify_core::notifier::{Notification, NotificationSink};

pub struct DesktopSink;

#[async_trait]
impl NotificationSink for DesktopSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let summary = format!("{} ({})", notification.header, notification.owner);
        let body = notification.to_string();

        // Talks to the session bus synchronously
        tokio::task::spawn_blocking(move || {
            notify_rust::Notification::new()
                .appname("calnotify")
                .summary(&summary)
                .body(&body)
                .show()
                .map(|_| ())
                .map_err(|e| DeliveryError::Failed(e.to_string()))
        })
        .await
        .map_err(|e| DeliveryError::Failed(e.to_string()))?
    }
}
