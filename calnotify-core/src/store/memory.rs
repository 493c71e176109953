//! In-memory event store.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{EventStore, sort_by_instant};
use crate::error::{StoreError, StoreResult};
use crate::event::Event;
use crate::window::Window;

#[derive(Default)]
struct State {
    events: HashMap<String, Event>,
    cursor: Option<Window>,
    dispatched: HashSet<(String, DateTime<Utc>)>,
    closed: bool,
}

/// Event store kept entirely in process memory. Contents are lost on exit.
#[derive(Default)]
pub struct MemoryEventStore {
    state: RwLock<State>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        let state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state)
    }

    fn select(&self, window: Window, key: fn(&Event) -> DateTime<Utc>) -> StoreResult<Vec<Event>> {
        let state = self.read()?;
        let mut events: Vec<Event> = state
            .events
            .values()
            .filter(|event| window.contains(key(event)))
            .cloned()
            .collect();
        sort_by_instant(&mut events, key);
        Ok(events)
    }
}

impl EventStore for MemoryEventStore {
    fn insert(&self, event: &Event) -> StoreResult<()> {
        event.validate()?;
        let mut state = self.write()?;

        if state.events.contains_key(&event.id) {
            return Err(StoreError::DuplicateId(event.id.clone()));
        }
        state.events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    fn update(&self, id: &str, event: &Event) -> StoreResult<()> {
        event.validate()?;
        let mut state = self.write()?;

        if !state.events.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        if event.id != id && state.events.contains_key(&event.id) {
            return Err(StoreError::DuplicateId(event.id.clone()));
        }

        state.events.remove(id);
        state.events.insert(event.id.clone(), event.clone());

        if event.id != id {
            let carried: Vec<_> = state
                .dispatched
                .iter()
                .filter(|(owner, _)| owner == id)
                .cloned()
                .collect();
            for (old, notify_at) in carried {
                state.dispatched.remove(&(old, notify_at));
                state.dispatched.insert((event.id.clone(), notify_at));
            }
        }
        Ok(())
    }

    fn remove(&self, id: &str) -> StoreResult<()> {
        let mut state = self.write()?;

        if state.events.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        state.dispatched.retain(|(owner, _)| owner != id);
        Ok(())
    }

    fn get(&self, id: &str) -> StoreResult<Option<Event>> {
        Ok(self.read()?.events.get(id).cloned())
    }

    fn query_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<Vec<Event>> {
        self.select(Window::new(start, end), |event| event.scheduled_at)
    }

    fn query_notify_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<Vec<Event>> {
        self.select(Window::new(start, end), Event::notify_at)
    }

    fn load_cursor(&self) -> StoreResult<Option<Window>> {
        Ok(self.read()?.cursor)
    }

    fn save_cursor(&self, cursor: &Window) -> StoreResult<()> {
        self.write()?.cursor = Some(*cursor);
        Ok(())
    }

    fn is_dispatched(&self, id: &str, notify_at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self
            .read()?
            .dispatched
            .contains(&(id.to_string(), notify_at)))
    }

    fn mark_dispatched(&self, id: &str, notify_at: DateTime<Utc>, _at: DateTime<Utc>) -> StoreResult<()> {
        self.write()?.dispatched.insert((id.to_string(), notify_at));
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        *state = State {
            closed: true,
            ..State::default()
        };
        Ok(())
    }
}
