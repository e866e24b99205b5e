//! Sequential runner for the steps of one workflow.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use common::{OrderStep, StepStatus, WorkflowId};
use futures_util::FutureExt;
use ledger::{AuditKind, AuditRecord, AuditSink, AuditSource};

use crate::error::{OrchestratorError, Result};
use crate::store::WorkflowStore;
use crate::suppliers::{SupplierError, SupplierRegistry};

/// Runs every step of one workflow, in order, exactly once.
///
/// Each step ends `Successful` or `Failed`. A failed step is never retried
/// and never stops the steps after it.
pub struct StepExecutor {
    workflow_id: WorkflowId,
    store: Arc<WorkflowStore>,
    suppliers: SupplierRegistry,
    audit: Arc<dyn AuditSink>,
    source: AuditSource,
}

impl StepExecutor {
    pub fn new(
        workflow_id: WorkflowId,
        store: Arc<WorkflowStore>,
        suppliers: SupplierRegistry,
        audit: Arc<dyn AuditSink>,
        source: AuditSource,
    ) -> Self {
        Self {
            workflow_id,
            store,
            suppliers,
            audit,
            source,
        }
    }

    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    /// Executes the workflow to completion.
    ///
    /// Step failures are recorded as `Failed` statuses, not returned. An error
    /// is only returned when a status cannot be recorded.
    #[tracing::instrument(skip(self), fields(workflow_id = %self.workflow_id))]
    pub async fn run(self) -> Result<()> {
        let started = std::time::Instant::now();
        let steps = match self.store.steps(self.workflow_id).await {
            Ok(steps) => steps,
            Err(OrchestratorError::UnknownWorkflow(_)) => {
                tracing::warn!("workflow vanished before execution, nothing to run");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        for (index, step) in steps.iter().enumerate() {
            let status = self.execute(index, step).await;

            match self.store.set_status(self.workflow_id, index, status).await {
                Ok(()) => {}
                Err(OrchestratorError::UnknownWorkflow(_)) => {
                    tracing::warn!(index, "workflow cleared while running, abandoning it");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }

            self.audit.record(AuditRecord::new(
                self.source,
                AuditKind::Update {
                    workflow_id: self.workflow_id,
                    index,
                    status,
                },
            ));
            metrics::counter!("workflow_steps_total", "status" => status.as_str()).increment(1);
        }

        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("workflow_duration_seconds").record(duration);
        tracing::info!(steps = steps.len(), duration, "workflow finished");
        Ok(())
    }

    /// Executes one step and classifies the outcome.
    async fn execute(&self, index: usize, step: &OrderStep) -> StepStatus {
        let Some(supplier) = self.suppliers.get(step.supplier_id) else {
            tracing::error!(index, supplier_id = %step.supplier_id, "step targets an unregistered supplier");
            return StepStatus::Failed;
        };

        // A panicking supplier must not take the worker down with it.
        let outcome = AssertUnwindSafe(supplier.execute_step(step))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => StepStatus::Successful,
            // No retry here: the step is marked failed and the workflow moves on.
            Ok(Err(SupplierError::Network(reason))) => {
                tracing::warn!(index, supplier_id = %step.supplier_id, %reason, "supplier unreachable, step failed");
                StepStatus::Failed
            }
            Ok(Err(e @ (SupplierError::Validation(_) | SupplierError::UnknownItem(_)))) => {
                tracing::info!(index, supplier_id = %step.supplier_id, error = %e, "supplier rejected step");
                StepStatus::Failed
            }
            Ok(Err(e @ SupplierError::Internal(_))) => {
                tracing::error!(index, supplier_id = %step.supplier_id, error = %e, "supplier failed, step failed");
                StepStatus::Failed
            }
            Err(_) => {
                tracing::error!(index, supplier_id = %step.supplier_id, "supplier panicked, step failed");
                StepStatus::Failed
            }
        }
    }
}
