//! Application state shared by every request handler.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::db::Database;
use crate::prediction::PredictionBackend;

/// Built once at startup and wrapped in `Arc`. Holds no locks: the
/// database handle opens connections per operation and the prediction
/// backend is `Send + Sync`.
pub struct CoreState {
    pub config: Config,
    pub db: Database,
    backend: Arc<dyn PredictionBackend>,
    started_at: Instant,
}

impl CoreState {
    pub fn new(config: Config, db: Database, backend: Arc<dyn PredictionBackend>) -> Self {
        Self {
            config,
            db,
            backend,
            started_at: Instant::now(),
        }
    }

    pub fn backend(&self) -> &dyn PredictionBackend {
        self.backend.as_ref()
    }

    /// When this process started serving, for uptime reporting.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}
