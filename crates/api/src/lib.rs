//! HTTP API server for the supply-chain broker.
//!
//! One process hosts a set of supplier ledgers and an orchestrator. The
//! orchestrator drives the local ledgers in-process and any remote suppliers
//! over HTTP, through the same `/suppliers/{id}/...` routes this server
//! exposes for its own ledgers.

pub mod config;
pub mod error;
pub mod routes;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use ledger::Ledger;
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{
    ItemSupplier, Orchestrator, OrchestratorConfig, OrchestratorError, RemoteSupplier, SupplierId,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: Orchestrator,
    /// Ledgers hosted by this process, also registered with the orchestrator.
    pub ledgers: BTreeMap<SupplierId, Arc<Ledger>>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/suppliers/{id}/steps", post(routes::suppliers::execute_step))
        .route("/suppliers/{id}/orders", post(routes::suppliers::get_orders))
        .route("/suppliers/{id}/reset", post(routes::suppliers::reset))
        .route("/workflows", post(routes::workflows::register))
        .route("/workflows/await", post(routes::workflows::await_completion))
        .route("/workflows/reset", post(routes::workflows::reset))
        .route("/workflows/{id}", get(routes::workflows::status))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the local ledgers, the remote supplier clients and the orchestrator
/// driving them.
pub fn create_state(config: &Config) -> Result<Arc<AppState>, OrchestratorError> {
    let ledgers: BTreeMap<SupplierId, Arc<Ledger>> = config
        .local_suppliers
        .iter()
        .map(|&id| (id, Arc::new(Ledger::new(id))))
        .collect();

    let mut suppliers: Vec<Arc<dyn ItemSupplier>> = ledgers
        .values()
        .map(|ledger| ledger.clone() as Arc<dyn ItemSupplier>)
        .collect();
    for remote in &config.remote_suppliers {
        let client = RemoteSupplier::new(
            remote.supplier_id,
            remote.base_url.as_str(),
            config.remote_timeout,
        )
        .map_err(|e| OrchestratorError::Internal(e.to_string()))?;
        suppliers.push(Arc::new(client));
    }

    let orchestrator_config = OrchestratorConfig::default().with_pool_size(config.pool_size);
    let orchestrator = Orchestrator::new(config.orchestrator_id, suppliers, orchestrator_config)?;

    Ok(Arc::new(AppState {
        orchestrator,
        ledgers,
    }))
}
