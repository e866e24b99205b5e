//! In-memory table of registered workflows and their step statuses.

use std::sync::Arc;

use common::{OrderStep, StepStatus, WorkflowId};
use ledger::KeyedLockTable;

use crate::error::{OrchestratorError, Result};

/// A registered workflow: immutable steps and one status per step.
#[derive(Debug)]
pub struct WorkflowRecord {
    steps: Arc<[OrderStep]>,
    statuses: Vec<StepStatus>,
}

impl WorkflowRecord {
    fn new(steps: Vec<OrderStep>) -> Self {
        let statuses = vec![StepStatus::Registered; steps.len()];
        Self {
            steps: steps.into(),
            statuses,
        }
    }
}

/// Workflows keyed by id, each behind its own read/write lock.
///
/// A workflow's status vector has exactly one writer (its executor) and any
/// number of readers; the per-workflow lock keeps readers from seeing a
/// vector mid-update.
#[derive(Debug, Default)]
pub struct WorkflowStore {
    workflows: KeyedLockTable<WorkflowId, WorkflowRecord>,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new workflow with every step `Registered`.
    ///
    /// Returns false, leaving the existing workflow untouched, if the id is
    /// already taken.
    pub fn insert(&self, workflow_id: WorkflowId, steps: Vec<OrderStep>) -> bool {
        self.workflows
            .ensure_with(workflow_id, || WorkflowRecord::new(steps))
    }

    /// Returns the steps of a workflow.
    pub async fn steps(&self, workflow_id: WorkflowId) -> Result<Arc<[OrderStep]>> {
        let record = self
            .workflows
            .read(&workflow_id)
            .await
            .map_err(|_| OrchestratorError::UnknownWorkflow(workflow_id))?;
        Ok(record.steps.clone())
    }

    /// Returns a snapshot of the step statuses of a workflow.
    pub async fn status(&self, workflow_id: WorkflowId) -> Result<Vec<StepStatus>> {
        let record = self
            .workflows
            .read(&workflow_id)
            .await
            .map_err(|_| OrchestratorError::UnknownWorkflow(workflow_id))?;
        Ok(record.statuses.clone())
    }

    /// Sets the status of one step.
    pub async fn set_status(
        &self,
        workflow_id: WorkflowId,
        index: usize,
        status: StepStatus,
    ) -> Result<()> {
        let mut record = self
            .workflows
            .write(&workflow_id)
            .await
            .map_err(|_| OrchestratorError::UnknownWorkflow(workflow_id))?;

        let len = record.statuses.len();
        let current = record
            .statuses
            .get_mut(index)
            .ok_or(OrchestratorError::StepIndexOutOfRange {
                workflow_id,
                index,
                len,
            })?;

        if !current.can_transition_to(status) {
            return Err(OrchestratorError::InvalidTransition {
                workflow_id,
                index,
                from: *current,
                to: status,
            });
        }
        *current = status;
        Ok(())
    }

    pub fn contains(&self, workflow_id: WorkflowId) -> bool {
        self.workflows.contains(&workflow_id)
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    /// Forgets every workflow.
    pub fn clear(&self) {
        self.workflows.clear();
    }
}
