use calnotify_core::StoreResult;
use calnotify_core::store::{self, EventStore};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn EventStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        AppState { store }
    }

    /// Run a store call on the blocking pool so a locked database file does
    /// not stall the request workers.
    pub async fn with_store<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn EventStore) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        store::blocking(self.store.clone(), f).await
    }
}
