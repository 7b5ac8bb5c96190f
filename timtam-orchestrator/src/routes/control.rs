//! Control intake. Messages are validated, then queued for the ingestion
//! loop, which applies them between transcript batches.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::Serialize;
use std::sync::Arc;
use timtam_core::config::parse_grasp_group;
use timtam_core::ingest::ControlMessage;

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/control", post(push_control))
}

#[derive(Debug, Serialize)]
pub struct ControlAccepted {
    pub accepted: bool,
}

pub async fn push_control(
    State(state): State<Arc<AppState>>,
    Json(message): Json<ControlMessage>,
) -> Result<(StatusCode, Json<ControlAccepted>), (StatusCode, String)> {
    match &message {
        ControlMessage::GraspConfig { body } | ControlMessage::ApplyGraspConfig { body, .. } => {
            parse_grasp_group(body).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        }
        ControlMessage::EndMeeting { .. } => {}
    }

    let body = serde_json::to_string(&message)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    state
        .control
        .send(body)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;

    Ok((StatusCode::ACCEPTED, Json(ControlAccepted { accepted: true })))
}
