//! Workflow registration and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use orchestrator::{OrderStep, StepStatus, WorkflowId};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub steps: Vec<OrderStep>,
}

// -- Response types --

#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterResponse {
    pub workflow_id: WorkflowId,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StatusResponse {
    pub workflow_id: WorkflowId,
    pub statuses: Vec<StepStatus>,
}

// -- Handlers --

/// POST /workflows: register a workflow and start it in the background.
#[tracing::instrument(skip(state, req), fields(steps = req.steps.len()))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let workflow_id = state.orchestrator.register(req.steps)?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { workflow_id })))
}

/// GET /workflows/{id}: current status of every step.
#[tracing::instrument(skip(state))]
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<StatusResponse>, ApiError> {
    let workflow_id = WorkflowId::new(id);
    let statuses = state.orchestrator.status(workflow_id).await?;
    Ok(Json(StatusResponse {
        workflow_id,
        statuses,
    }))
}

/// POST /workflows/await: block until every registered workflow has settled.
#[tracing::instrument(skip(state))]
pub async fn await_completion(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    state.orchestrator.await_completion().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /workflows/reset: forget every workflow.
#[tracing::instrument(skip(state))]
pub async fn reset(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    state.orchestrator.reset().await?;
    Ok(StatusCode::NO_CONTENT)
}
