//! Application state for spatial service.

use std::sync::Arc;

use crate::store::SpatialStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SpatialStore>,
}

impl AppState {
    /// Creates a new application state around a storage backend.
    pub fn new(store: Arc<dyn SpatialStore>) -> Self {
        Self { store }
    }
}
