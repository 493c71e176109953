//! In-process channel.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

use super::{NotificationChannel, OverflowPolicy, decode, encode};
use crate::error::{ChannelError, ChannelResult};
use crate::event::Event;

/// Bounded FIFO living in process memory. Holds encoded messages so the
/// payload is identical to what the durable channel carries.
pub struct MemoryChannel {
    queue: Mutex<VecDeque<String>>,
    capacity: usize,
    overflow: OverflowPolicy,
    not_empty: Notify,
    not_full: Notify,
}

impl MemoryChannel {
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Self {
        MemoryChannel {
            queue: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            overflow,
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    fn queue(&self) -> ChannelResult<MutexGuard<'_, VecDeque<String>>> {
        self.queue.lock().map_err(|_| ChannelError::Closed)
    }

    /// Try to enqueue without waiting. Returns the body back when the
    /// channel is full and the policy is `Block`.
    fn try_push(&self, body: String) -> ChannelResult<Option<String>> {
        let mut queue = self.queue()?;

        if queue.len() >= self.capacity {
            match self.overflow {
                OverflowPolicy::Block => return Ok(Some(body)),
                OverflowPolicy::Reject => return Err(ChannelError::Full(queue.len())),
                OverflowPolicy::DropOldest => {
                    queue.pop_front();
                    tracing::warn!(capacity = self.capacity, "notification channel full, dropped oldest message");
                }
            }
        }

        queue.push_back(body);
        self.not_empty.notify_one();
        Ok(None)
    }
}

#[async_trait]
impl NotificationChannel for MemoryChannel {
    async fn publish(&self, event: &Event) -> ChannelResult<()> {
        let mut body = encode(event)?;

        loop {
            match self.try_push(body)? {
                None => return Ok(()),
                Some(returned) => body = returned,
            }
            self.not_full.notified().await;
        }
    }

    async fn receive(&self) -> ChannelResult<Event> {
        loop {
            let next = self.queue()?.pop_front();

            match next {
                Some(body) => {
                    self.not_full.notify_one();
                    if let Some(event) = decode(&body) {
                        return Ok(event);
                    }
                }
                None => self.not_empty.notified().await,
            }
        }
    }

    async fn len(&self) -> ChannelResult<usize> {
        Ok(self.queue()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::contract;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_roundtrip_preserves_fields() {
        contract::roundtrip_preserves_fields(&MemoryChannel::new(8, OverflowPolicy::Block)).await;
    }

    #[tokio::test]
    async fn test_delivers_in_order() {
        contract::delivers_in_order(Arc::new(MemoryChannel::new(8, OverflowPolicy::Block))).await;
    }

    #[tokio::test]
    async fn test_reject_when_full() {
        contract::reject_when_full(&MemoryChannel::new(2, OverflowPolicy::Reject)).await;
    }

    #[tokio::test]
    async fn test_drop_oldest_when_full() {
        contract::drop_oldest_when_full(&MemoryChannel::new(2, OverflowPolicy::DropOldest)).await;
    }

    #[tokio::test]
    async fn test_block_until_room() {
        contract::block_until_room(Arc::new(MemoryChannel::new(2, OverflowPolicy::Block))).await;
    }

    #[tokio::test]
    async fn test_receive_waits_for_publish() {
        let channel = Arc::new(MemoryChannel::new(4, OverflowPolicy::Block));
        let receiver = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.receive().await })
        };
        tokio::task::yield_now().await;

        channel.publish(&contract::event(7)).await.unwrap();
        assert_eq!(receiver.await.unwrap().unwrap().id, "evt-7");
    }
}
