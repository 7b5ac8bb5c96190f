//! API route modules.

pub mod configs;
pub mod control;
pub mod health;
pub mod status;
pub mod transcripts;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .merge(status::router())
        .merge(transcripts::router())
        .merge(control::router())
        .merge(configs::router());

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use timtam_core::config::{ConfigResolver, InMemoryConfigStore};
    use timtam_core::meeting::OrchestratorManager;
    use timtam_core::settings::EngineConfig;
    use timtam_core::testing::{RecordingNotifier, ScriptedJudge};
    use tower::ServiceExt;

    use crate::adapters::MetricsRegistry;
    use crate::state::AppState;

    pub fn state() -> Arc<AppState> {
        let store = Arc::new(InMemoryConfigStore::new());
        let metrics = Arc::new(MetricsRegistry::new());
        let manager = Arc::new(OrchestratorManager::new(
            EngineConfig::default(),
            ConfigResolver::new(store.clone()),
            Arc::new(ScriptedJudge::decline()),
            Arc::new(RecordingNotifier::default()),
            metrics.clone(),
        ));
        Arc::new(AppState::new(manager, store, metrics))
    }

    pub async fn send(
        state: Arc<AppState>,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, String) {
        let app: Router = super::create_router(state);
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }
}
