//! Core of the calnotify ecosystem.
//!
//! This crate provides everything except the transports:
//! - `Event` and its validation rules
//! - `store` for persisting events and dispatch bookkeeping
//! - `window` for day/week/month queries
//! - `dispatcher`, `channel` and `notifier` for the reminder pipeline
//! - `config` and `logging` shared by the server and the CLI

pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod logging;
pub mod notifier;
pub mod runtime;
pub mod singleton;
pub mod store;
pub mod window;

pub use channel::{NotificationChannel, OverflowPolicy};
pub use self::config::Settings;
pub use dispatcher::{Dispatcher, TickReport};
pub use error::*;
pub use event::{Event, EventDuration};
pub use notifier::{Notification, NotificationSink, Notifier};
pub use store::EventStore;
pub use window::Window;
