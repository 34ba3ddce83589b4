//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub model: String,
    pub active_sessions: usize,
}

/// Liveness check - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: lexroute_common::VERSION.to_string(),
    })
}

/// Readiness check
///
/// The engine is built before the listener binds, so a reachable server
/// already has its corpus indexed.
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        status: "ready".to_string(),
        model: state.engine.model_name().to_string(),
        active_sessions: state.sessions.len().await,
    })
}
