//! Error types for the calnotify ecosystem.

use std::path::PathBuf;

use thiserror::Error;

/// Reasons an event record is refused before it reaches storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Event id must not be empty")]
    EmptyId,

    #[error("Event '{0}': duration ends before it starts")]
    InvalidDuration(String),

    #[error("Event '{id}': lead time must be non-negative, got {minutes} minutes")]
    NegativeLead { id: String, minutes: i32 },

    #[error("Event '{0}': timestamp outside the supported range")]
    TimestampOutOfRange(String),
}

/// Errors that can occur in event store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Event with id '{0}' already exists")]
    DuplicateId(String),

    #[error("Event with id '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Database schema version {db_version} is newer than supported {latest}")]
    UnsupportedSchema { db_version: u32, latest: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Event store is closed")]
    Closed,

    #[error("Event store lock poisoned")]
    Poisoned,

    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur when deriving a query window.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("Window bounds overflow the calendar range")]
    Overflow,

    #[error("No valid local midnight for {0}")]
    NoLocalMidnight(chrono::NaiveDate),
}

pub type WindowResult<T> = Result<T, WindowError>;

/// Errors that can occur on the notification channel.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Notification channel is full ({0} messages queued)")]
    Full(usize),

    #[error("Notification channel is closed")]
    Closed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Channel storage error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Channel task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors returned by a notification sink.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Delivery failed: {0}")]
    Failed(String),
}

/// Errors that can occur while constructing the dispatcher.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Tick interval {0:?} is out of range")]
    InvalidInterval(std::time::Duration),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Configuration and process bootstrap errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("Could not load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Another dispatcher is already running.\nIf you believe this is an error, remove: {}", .0.display())]
    AlreadyRunning(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
