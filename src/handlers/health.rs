//! Health check endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health probe response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"` when the service answers at all.
    pub status: &'static str,
    /// Whether any transcription engine is currently loaded.
    pub model_loaded: bool,
}

/// Liveness probe. Reports whether an engine instance is loaded; never
/// errors and never triggers a load.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_loaded: state.transcriber.any_loaded(),
    })
}
