//! Endpoints of the supplier ledgers hosted by this server.
//!
//! These are the routes a [`RemoteSupplier`](orchestrator::RemoteSupplier)
//! in another process talks to.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use ledger::Ledger;
use orchestrator::{ItemQuantity, OrderStep, OrdersRequest, SupplierId};

use crate::AppState;
use crate::error::ApiError;

fn ledger(state: &AppState, supplier_id: i64) -> Result<&Arc<Ledger>, ApiError> {
    state
        .ledgers
        .get(&SupplierId::new(supplier_id))
        .ok_or_else(|| ApiError::NotFound(format!("Supplier {supplier_id} is not hosted here")))
}

/// POST /suppliers/{id}/steps: apply an order step to the ledger.
#[tracing::instrument(skip(state, step))]
pub async fn execute_step(
    State(state): State<Arc<AppState>>,
    Path(supplier_id): Path<i64>,
    Json(step): Json<OrderStep>,
) -> Result<StatusCode, ApiError> {
    ledger(&state, supplier_id)?.apply_step(&step).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /suppliers/{id}/orders: total ordered quantity per requested item.
#[tracing::instrument(skip(state, request))]
pub async fn get_orders(
    State(state): State<Arc<AppState>>,
    Path(supplier_id): Path<i64>,
    Json(request): Json<OrdersRequest>,
) -> Result<Json<Vec<ItemQuantity>>, ApiError> {
    let quantities = ledger(&state, supplier_id)?
        .get_quantities(&request.item_ids)
        .await?;
    Ok(Json(quantities))
}

/// POST /suppliers/{id}/reset: forget every order of the ledger.
#[tracing::instrument(skip(state))]
pub async fn reset(
    State(state): State<Arc<AppState>>,
    Path(supplier_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    ledger(&state, supplier_id)?.clear();
    Ok(StatusCode::NO_CONTENT)
}
