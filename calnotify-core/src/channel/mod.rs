//! Ordered hand-off between the dispatcher (sole producer) and the notifier
//! (sole consumer).
//!
//! Every message is one JSON-encoded `Event`. Both implementations are
//! bounded; what happens when a publisher finds the channel full is decided
//! by the configured `OverflowPolicy`.

mod memory;
mod sqlite;

pub use memory::MemoryChannel;
pub use sqlite::SqliteChannel;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ChannelResult;
use crate::event::Event;

/// What `publish` does when the channel already holds `capacity` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait until the consumer makes room.
    #[default]
    Block,
    /// Evict the oldest queued message.
    DropOldest,
    /// Fail the publish with `ChannelError::Full`.
    Reject,
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Enqueue `event`. Returns once the message is accepted.
    async fn publish(&self, event: &Event) -> ChannelResult<()>;

    /// Wait for the next message and decode it. Messages that do not decode
    /// are logged and skipped.
    async fn receive(&self) -> ChannelResult<Event>;

    /// Number of messages currently queued.
    async fn len(&self) -> ChannelResult<usize>;
}

/// The endless sequence of received events. Ends only if the channel
/// reports `Closed`.
pub fn stream(channel: Arc<dyn NotificationChannel>) -> impl Stream<Item = ChannelResult<Event>> {
    futures::stream::unfold(Some(channel), |channel| async move {
        let channel = channel?;
        match channel.receive().await {
            Err(crate::error::ChannelError::Closed) => None,
            result => Some((result, Some(channel))),
        }
    })
}

fn encode(event: &Event) -> ChannelResult<String> {
    Ok(serde_json::to_string(event)?)
}

fn decode(body: &str) -> Option<Event> {
    match serde_json::from_str(body) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::error!(error = %e, "dropping undecodable notification message");
            None
        }
    }
}
