use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{health, transcribe};
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/transcribe", post(transcribe::transcribe_handler))
        .route(
            "/transcribe-optimized",
            post(transcribe::transcribe_optimized_handler),
        )
        .layer(TraceLayer::new_for_http())
}
