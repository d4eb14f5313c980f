//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::EventStore;
use serde::Serialize;

use super::accounts::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Lowest global sequence every projection has applied.
    pub checkpoint: u64,
    pub projections: usize,
}

/// GET /health: returns service status and projection progress.
pub async fn check<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    let processor = &state.projection_processor;
    Json(HealthResponse {
        status: "ok",
        checkpoint: processor.checkpoint().await,
        projections: processor.projection_count(),
    })
}
