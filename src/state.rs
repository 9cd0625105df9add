//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! Handlers never touch the store: reads and writes go through the
//! coordinator handle, and page bookkeeping through the registry the
//! coordinator broadcasts over.

use std::sync::Arc;

use crate::coordinator::{CoordinatorHandle, spawn_coordinator};
use crate::pages::PageRegistry;
use crate::store::PolicyStore;

/// Clone is required by Axum; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: CoordinatorHandle,
    pub pages: PageRegistry,
    /// Outbound frame buffer per websocket connection.
    pub page_queue_capacity: usize,
}

impl AppState {
    /// Wire a registry to a freshly spawned coordinator over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn PolicyStore>, coordinator_queue_capacity: usize, page_queue_capacity: usize) -> Self {
        let pages = PageRegistry::new();
        let (coordinator, _task) = spawn_coordinator(store, Arc::new(pages.clone()), coordinator_queue_capacity);
        Self { coordinator, pages, page_queue_capacity: page_queue_capacity.max(1) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
