//! Grasp group versions and meeting assignments.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use timtam_core::config::{GraspGroupDefinition, StoredConfig, parse_grasp_group};
use timtam_core::error::StoreError;
use timtam_core::types::MeetingId;

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/configs", post(create_config))
        .route("/configs/{id}", get(get_config).delete(delete_config))
        .route("/meetings/{id}/config", put(assign_config))
}

/// One line of a group summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraspSummary {
    pub node_id: String,
    pub interval_sec: f64,
    pub output_handler: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_tag: Option<String>,
}

pub fn summarize(definition: &GraspGroupDefinition) -> Vec<GraspSummary> {
    definition
        .grasps
        .iter()
        .map(|g| GraspSummary {
            node_id: g.node_id.clone(),
            interval_sec: g.interval_sec,
            output_handler: g.output_handler.to_string(),
            note_tag: g.written_tag().map(str::to_string),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct CreateConfigRequest {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    #[serde(flatten)]
    pub config: StoredConfig,
    pub grasps: Vec<GraspSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub version_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResponse {
    pub meeting_id: MeetingId,
    pub version_id: String,
}

fn store_error(e: StoreError) -> (StatusCode, String) {
    let status = match &e {
        StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

fn respond(config: StoredConfig) -> Result<Json<ConfigResponse>, (StatusCode, String)> {
    // stored bodies were validated on save
    let definition =
        parse_grasp_group(&config.body).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(ConfigResponse {
        grasps: summarize(&definition),
        config,
    }))
}

/// Validate and save a new version
pub async fn create_config(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateConfigRequest>,
) -> Result<(StatusCode, Json<ConfigResponse>), (StatusCode, String)> {
    if req.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "name must not be empty".to_string()));
    }
    let config = state
        .store
        .save_config(&req.name, &req.body)
        .await
        .map_err(store_error)?;
    tracing::info!(version_id = %config.version_id, name = %config.name, "config.saved");
    Ok((StatusCode::CREATED, respond(config)?))
}

pub async fn get_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ConfigResponse>, (StatusCode, String)> {
    let config = state
        .store
        .version_by_id(&id)
        .await
        .map_err(store_error)?
        .ok_or((StatusCode::NOT_FOUND, format!("Configuration not found: {}", id)))?;
    respond(config)
}

pub async fn delete_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.store.delete_version(&id).await.map_err(store_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("Configuration not found: {}", id)))
    }
}

/// Pin a meeting to a version. Takes effect when the meeting is next created.
pub async fn assign_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<AssignResponse>, (StatusCode, String)> {
    let meeting_id = MeetingId::new(id);
    state
        .store
        .assign(&meeting_id, &req.version_id)
        .await
        .map_err(store_error)?;
    tracing::info!(meeting_id = %meeting_id, version_id = %req.version_id, "config.assigned");
    Ok(Json(AssignResponse {
        meeting_id,
        version_id: req.version_id,
    }))
}
