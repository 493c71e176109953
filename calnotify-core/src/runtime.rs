//! Builds the configured store and channel for a process.

use std::sync::Arc;

use crate::channel::{MemoryChannel, NotificationChannel, SqliteChannel};
use crate::config::{ChannelKind, DatabaseConfig, Settings, StoreBackend};
use crate::error::{ChannelResult, StoreResult};
use crate::store::{EventStore, MemoryEventStore, SqliteEventStore};

pub fn open_store(database: &DatabaseConfig) -> StoreResult<Arc<dyn EventStore>> {
    match database.backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory event store");
            Ok(Arc::new(MemoryEventStore::new()))
        }
        StoreBackend::Sqlite => {
            let path = database.resolved_path();
            tracing::info!(path = %path.display(), "opening sqlite event store");
            Ok(Arc::new(SqliteEventStore::open(&path)?))
        }
    }
}

pub fn open_channel(settings: &Settings) -> ChannelResult<Arc<dyn NotificationChannel>> {
    let config = &settings.channel;

    match config.kind {
        ChannelKind::Memory => Ok(Arc::new(MemoryChannel::new(config.capacity, config.overflow))),
        ChannelKind::Sqlite => {
            let path = settings.database.resolved_path();
            Ok(Arc::new(SqliteChannel::open(
                &path,
                config.capacity,
                config.overflow,
                config.poll_interval,
            )?))
        }
    }
}
