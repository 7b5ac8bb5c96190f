//! Transcript intake. Events are queued for the ingestion loop.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use timtam_core::types::TranscriptEvent;

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/transcripts", post(push_transcripts))
}

/// One event or a batch of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TranscriptPayload {
    Batch(Vec<TranscriptEvent>),
    One(TranscriptEvent),
}

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: usize,
}

pub async fn push_transcripts(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TranscriptPayload>,
) -> Result<(StatusCode, Json<QueuedResponse>), (StatusCode, String)> {
    let events = match payload {
        TranscriptPayload::Batch(events) => events,
        TranscriptPayload::One(event) => vec![event],
    };

    for event in &events {
        let body = serde_json::to_string(event)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        state
            .transcripts
            .send(body)
            .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(QueuedResponse {
            queued: events.len(),
        }),
    ))
}
