//! Health check endpoints

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::http::AppState;

/// Health check router
pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/stats", get(health_stats))
}

/// Basic health check (always returns OK if server is running)
pub async fn health_check() -> impl IntoResponse {
    "OK"
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStats {
    pub conferences: usize,
    pub sessions: usize,
    pub connections: usize,
}

/// In-memory occupancy of this coordinator
pub async fn health_stats(State(state): State<AppState>) -> Json<HealthStats> {
    let coordinator = &state.coordinator;
    Json(HealthStats {
        conferences: coordinator.directory().len(),
        sessions: coordinator.sessions().len(),
        connections: coordinator.hub().connection_count(),
    })
}
