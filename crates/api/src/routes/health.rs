//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use orchestrator::SupplierId;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub orchestrator_id: i64,
    pub suppliers: Vec<SupplierId>,
}

/// GET /health: liveness plus the suppliers this server orchestrates.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        orchestrator_id: state.orchestrator.id(),
        suppliers: state.orchestrator.supplier_ids(),
    })
}
