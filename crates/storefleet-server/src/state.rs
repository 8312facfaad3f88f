//! Application state.

use std::sync::Arc;
use std::time::{Duration, Instant};
use storefleet_core::{Database, StoreOrchestrator};

/// Shared application state
pub struct AppState {
    /// Database connection (health reporting)
    pub db: Arc<Database>,
    /// Store lifecycle orchestrator
    pub orchestrator: StoreOrchestrator,
    /// Upper bound on a synchronous store teardown
    pub delete_timeout: Duration,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(
        db: Arc<Database>,
        orchestrator: StoreOrchestrator,
        delete_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            db,
            orchestrator,
            delete_timeout,
            start_time: Instant::now(),
        })
    }
}
