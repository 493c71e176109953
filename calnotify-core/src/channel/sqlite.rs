//! Durable channel backed by an outbox table.
//!
//! The dispatcher and notifier may run in different processes as long as
//! they open the same database file. Receivers poll when the outbox is
//! empty; a row is read and deleted in one transaction. Writers take the
//! write lock up front so another connection's writer waits on the busy
//! timeout instead of failing the lock upgrade.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{NotificationChannel, OverflowPolicy, decode, encode};
use crate::error::{ChannelError, ChannelResult};
use crate::event::Event;
use crate::store::open_connection;

enum Push {
    Accepted,
    Full,
}

pub struct SqliteChannel {
    outbox: Arc<Outbox>,
    poll_interval: Duration,
}

/// The connection side, driven from the blocking thread pool.
struct Outbox {
    conn: Mutex<Connection>,
    capacity: usize,
    overflow: OverflowPolicy,
}

impl SqliteChannel {
    pub fn open(
        path: impl AsRef<Path>,
        capacity: usize,
        overflow: OverflowPolicy,
        poll_interval: Duration,
    ) -> ChannelResult<Self> {
        let conn = open_connection(path.as_ref())?;

        Ok(SqliteChannel {
            outbox: Arc::new(Outbox {
                conn: Mutex::new(conn),
                capacity: capacity.max(1),
                overflow,
            }),
            poll_interval,
        })
    }

    async fn blocking<T, F>(&self, f: F) -> ChannelResult<T>
    where
        F: FnOnce(&Outbox) -> ChannelResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let outbox = self.outbox.clone();
        tokio::task::spawn_blocking(move || f(outbox.as_ref())).await?
    }
}

impl Outbox {
    fn try_push(&self, body: &str) -> ChannelResult<Push> {
        let mut conn = self.conn.lock().map_err(|_| ChannelError::Closed)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let queued = count(&tx)?;
        if queued >= self.capacity {
            match self.overflow {
                OverflowPolicy::Block => return Ok(Push::Full),
                OverflowPolicy::Reject => return Err(ChannelError::Full(queued)),
                OverflowPolicy::DropOldest => {
                    tx.execute(
                        "DELETE FROM outbox WHERE seq = (SELECT MIN(seq) FROM outbox)",
                        [],
                    )?;
                    tracing::warn!(capacity = self.capacity, "outbox full, dropped oldest message");
                }
            }
        }

        tx.execute(
            "INSERT INTO outbox (body, enqueued_at) VALUES (?1, ?2)",
            params![body, Utc::now().timestamp_millis()],
        )?;
        tx.commit()?;
        Ok(Push::Accepted)
    }

    fn try_pop(&self) -> ChannelResult<Option<String>> {
        let mut conn = self.conn.lock().map_err(|_| ChannelError::Closed)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let next: Option<(i64, String)> = tx
            .query_row(
                "SELECT seq, body FROM outbox ORDER BY seq LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((seq, body)) = next else {
            return Ok(None);
        };
        tx.execute("DELETE FROM outbox WHERE seq = ?1", params![seq])?;
        tx.commit()?;
        Ok(Some(body))
    }
}

#[async_trait]
impl NotificationChannel for SqliteChannel {
    async fn publish(&self, event: &Event) -> ChannelResult<()> {
        let body = encode(event)?;

        loop {
            let body = body.clone();
            match self.blocking(move |outbox| outbox.try_push(&body)).await? {
                Push::Accepted => return Ok(()),
                Push::Full => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }

    async fn receive(&self) -> ChannelResult<Event> {
        loop {
            match self.blocking(Outbox::try_pop).await? {
                Some(body) => {
                    if let Some(event) = decode(&body) {
                        return Ok(event);
                    }
                }
                None => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }

    async fn len(&self) -> ChannelResult<usize> {
        self.blocking(|outbox| {
            let conn = outbox.conn.lock().map_err(|_| ChannelError::Closed)?;
            count(&conn)
        })
        .await
    }
}

fn count(conn: &Connection) -> ChannelResult<usize> {
    let queued: i64 = conn.query_row("SELECT COUNT(*) FROM outbox", [], |row| row.get(0))?;
    Ok(usize::try_from(queued).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::contract;
    use std::sync::Arc;

    const POLL: Duration = Duration::from_millis(10);

    fn channel(capacity: usize, overflow: OverflowPolicy) -> SqliteChannel {
        SqliteChannel::open(":memory:", capacity, overflow, POLL).unwrap()
    }

    #[tokio::test]
    async fn test_roundtrip_preserves_fields() {
        contract::roundtrip_preserves_fields(&channel(8, OverflowPolicy::Block)).await;
    }

    #[tokio::test]
    async fn test_delivers_in_order() {
        contract::delivers_in_order(Arc::new(channel(8, OverflowPolicy::Block))).await;
    }

    #[tokio::test]
    async fn test_reject_when_full() {
        contract::reject_when_full(&channel(2, OverflowPolicy::Reject)).await;
    }

    #[tokio::test]
    async fn test_drop_oldest_when_full() {
        contract::drop_oldest_when_full(&channel(2, OverflowPolicy::DropOldest)).await;
    }

    #[tokio::test]
    async fn test_block_until_room() {
        contract::block_until_room(Arc::new(channel(2, OverflowPolicy::Block))).await;
    }

    #[tokio::test]
    async fn test_messages_cross_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calnotify.db");

        let producer = SqliteChannel::open(&path, 8, OverflowPolicy::Block, POLL).unwrap();
        let consumer = SqliteChannel::open(&path, 8, OverflowPolicy::Block, POLL).unwrap();

        producer.publish(&contract::event(3)).await.unwrap();
        assert_eq!(consumer.receive().await.unwrap(), contract::event(3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_producer_and_consumer_connections_do_not_lock_each_other_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calnotify.db");
        let producer = Arc::new(SqliteChannel::open(&path, 4096, OverflowPolicy::Block, POLL).unwrap());
        let consumer = SqliteChannel::open(&path, 4096, OverflowPolicy::Block, POLL).unwrap();
        const MESSAGES: u32 = 500;

        let publishing = tokio::spawn({
            let producer = producer.clone();
            async move {
                for i in 0..MESSAGES {
                    producer.publish(&contract::event(i)).await.unwrap();
                }
            }
        });

        for i in 0..MESSAGES {
            assert_eq!(consumer.receive().await.unwrap().id, format!("evt-{i}"));
        }
        publishing.await.unwrap();
        assert_eq!(producer.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_rows_are_skipped() {
        let channel = channel(8, OverflowPolicy::Block);
        {
            let conn = channel.outbox.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO outbox (body, enqueued_at) VALUES ('not json', 0)",
                [],
            )
            .unwrap();
        }
        channel.publish(&contract::event(4)).await.unwrap();
        assert_eq!(channel.receive().await.unwrap().id, "evt-4");
    }
}
