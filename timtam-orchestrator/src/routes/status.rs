//! Engine status endpoint.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::sync::Arc;
use timtam_core::meeting::ManagerStatus;

use crate::adapters::MetricsSnapshot;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(get_status))
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub manager: ManagerStatus,
    pub metrics: MetricsSnapshot,
    /// Transcript messages received but not yet acknowledged
    pub transcripts_in_flight: usize,
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        manager: state.manager.status().await,
        metrics: state.metrics.snapshot(),
        transcripts_in_flight: state.transcripts.in_flight(),
    })
}
