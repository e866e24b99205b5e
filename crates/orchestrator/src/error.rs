//! Orchestrator error types.

use common::{StepStatus, WorkflowId};
use thiserror::Error;

/// Errors that can occur during orchestration.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    /// The request was malformed. Nothing was recorded.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No workflow is registered under the id.
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(WorkflowId),

    /// A status write addressed a step the workflow does not have.
    #[error("Workflow {workflow_id} has {len} steps, no step at index {index}")]
    StepIndexOutOfRange {
        workflow_id: WorkflowId,
        index: usize,
        len: usize,
    },

    /// A status write tried to leave a terminal status.
    #[error("Step {index} of workflow {workflow_id} cannot move from {from} to {to}")]
    InvalidTransition {
        workflow_id: WorkflowId,
        index: usize,
        from: StepStatus,
        to: StepStatus,
    },

    /// The scheduler no longer accepts work.
    #[error("Scheduler has been shut down")]
    SchedulerShutDown,

    /// Unexpected failure inside a worker.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for orchestrator results.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
