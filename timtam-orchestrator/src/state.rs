//! Application state.

use std::sync::Arc;
use std::time::Instant;

use timtam_core::config::ConfigStore;
use timtam_core::ingest::ChannelQueue;
use timtam_core::meeting::OrchestratorManager;

use crate::adapters::MetricsRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<OrchestratorManager>,
    pub store: Arc<dyn ConfigStore>,
    /// Transcript queue fed by `POST /v1/transcripts`
    pub transcripts: Arc<ChannelQueue>,
    /// Control queue fed by `POST /v1/control`
    pub control: Arc<ChannelQueue>,
    pub metrics: Arc<MetricsRegistry>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        manager: Arc<OrchestratorManager>,
        store: Arc<dyn ConfigStore>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            manager,
            store,
            transcripts: Arc::new(ChannelQueue::new()),
            control: Arc::new(ChannelQueue::new()),
            metrics,
            start_time: Instant::now(),
        }
    }
}
