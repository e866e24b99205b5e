//! API error types with HTTP response mapping.
//!
//! Every error reply carries an [`ErrorBody`] whose `kind` lets a
//! [`RemoteSupplier`](orchestrator::RemoteSupplier) rebuild the original error.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ledger::LedgerError;
use orchestrator::{ErrorBody, ErrorKind, ItemId, OrchestratorError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Supplier ledger error.
    Ledger(LedgerError),
    /// Orchestration error.
    Orchestrator(OrchestratorError),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, ErrorKind, Option<ItemId>) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorKind::NotFound, None),
            ApiError::Ledger(err) => match err {
                LedgerError::Validation { .. } => {
                    (StatusCode::BAD_REQUEST, ErrorKind::Validation, None)
                }
                LedgerError::UnknownItem { item_id, .. } => {
                    (StatusCode::NOT_FOUND, ErrorKind::UnknownItem, Some(*item_id))
                }
                LedgerError::LockTable(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Internal, None)
                }
            },
            ApiError::Orchestrator(err) => match err {
                OrchestratorError::Validation(_) => {
                    (StatusCode::BAD_REQUEST, ErrorKind::Validation, None)
                }
                OrchestratorError::UnknownWorkflow(_) => {
                    (StatusCode::NOT_FOUND, ErrorKind::UnknownWorkflow, None)
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Internal, None),
            },
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::NotFound(msg) => msg.clone(),
            ApiError::Ledger(err) => err.to_string(),
            ApiError::Orchestrator(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, item_id) = self.parts();
        let error = self.message();
        if status.is_server_error() {
            tracing::error!(%error, "internal server error");
        }

        let body = ErrorBody {
            error,
            kind,
            item_id,
        };
        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        ApiError::Orchestrator(err)
    }
}
