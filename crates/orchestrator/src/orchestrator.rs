//! The workflow orchestrator.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use common::{OrderStep, StepStatus, SupplierId, WorkflowId};
use ledger::{AuditKind, AuditRecord, AuditSink, AuditSource, TracingAuditSink};

use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::executor::StepExecutor;
use crate::scheduler::Scheduler;
use crate::store::WorkflowStore;
use crate::suppliers::{ItemSupplier, SupplierRegistry};

/// Accepts workflows, runs them in the background and answers status queries.
///
/// Several orchestrators can live in one process; each owns its suppliers,
/// workflows, worker pool and id counter.
pub struct Orchestrator {
    id: i64,
    suppliers: SupplierRegistry,
    store: Arc<WorkflowStore>,
    scheduler: Mutex<Arc<Scheduler>>,
    next_workflow_id: AtomicI64,
    config: OrchestratorConfig,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("id", &self.id)
            .field("suppliers", &self.suppliers)
            .field("workflows", &self.store.len())
            .field("next_workflow_id", &self.next_workflow_id)
            .field("config", &self.config)
            .finish()
    }
}

impl Orchestrator {
    /// Creates an orchestrator that audits through `tracing`.
    pub fn new(
        id: i64,
        suppliers: Vec<Arc<dyn ItemSupplier>>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        Self::with_audit(id, suppliers, config, Arc::new(TracingAuditSink))
    }

    /// Creates an orchestrator with a custom audit sink.
    ///
    /// Fails with [`OrchestratorError::Validation`] if `suppliers` is empty or
    /// names the same supplier id twice.
    pub fn with_audit(
        id: i64,
        suppliers: Vec<Arc<dyn ItemSupplier>>,
        config: OrchestratorConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        let suppliers = SupplierRegistry::new(suppliers)?;
        let orchestrator = Self {
            id,
            suppliers,
            store: Arc::new(WorkflowStore::new()),
            scheduler: Mutex::new(Arc::new(Scheduler::new(config.pool_size))),
            next_workflow_id: AtomicI64::new(0),
            config,
            audit,
        };

        tracing::info!(
            orchestrator_id = id,
            suppliers = ?orchestrator.suppliers.ids(),
            pool_size = orchestrator.config.pool_size,
            "orchestrator started"
        );
        orchestrator.audit(AuditKind::OrchestratorInit);
        Ok(orchestrator)
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn supplier(&self, supplier_id: SupplierId) -> Option<Arc<dyn ItemSupplier>> {
        self.suppliers.get(supplier_id)
    }

    /// Returns the registered supplier ids in ascending order.
    pub fn supplier_ids(&self) -> Vec<SupplierId> {
        self.suppliers.ids()
    }

    fn audit(&self, kind: AuditKind) {
        self.audit
            .record(AuditRecord::new(AuditSource::Orchestrator(self.id), kind));
    }

    fn scheduler(&self) -> Arc<Scheduler> {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn validate(&self, steps: &[OrderStep]) -> Result<()> {
        if steps.is_empty() {
            return Err(OrchestratorError::Validation(
                "a workflow needs at least one step".to_string(),
            ));
        }
        for (index, step) in steps.iter().enumerate() {
            if !self.suppliers.contains(step.supplier_id) {
                return Err(OrchestratorError::Validation(format!(
                    "step {index} targets unknown supplier {}",
                    step.supplier_id
                )));
            }
        }
        Ok(())
    }

    /// Registers a workflow and schedules it for execution.
    ///
    /// Returns as soon as the workflow is recorded and queued. A rejected
    /// workflow leaves no trace and consumes no id.
    #[tracing::instrument(skip(self, steps), fields(orchestrator_id = self.id, steps = steps.len()))]
    pub fn register(&self, steps: Vec<OrderStep>) -> Result<WorkflowId> {
        self.validate(&steps)?;

        // Recording and queueing happen under the scheduler lock so a
        // concurrent reset either sees the whole workflow or none of it.
        let scheduler = self.scheduler.lock().unwrap_or_else(PoisonError::into_inner);
        let workflow_id = WorkflowId::new(self.next_workflow_id.fetch_add(1, Ordering::SeqCst));
        if !self.store.insert(workflow_id, steps.clone()) {
            return Err(OrchestratorError::Internal(format!(
                "workflow id {workflow_id} allocated twice"
            )));
        }
        self.audit(AuditKind::Register {
            workflow_id,
            steps,
        });

        scheduler.submit(StepExecutor::new(
            workflow_id,
            self.store.clone(),
            self.suppliers.clone(),
            self.audit.clone(),
            AuditSource::Orchestrator(self.id),
        ))?;
        drop(scheduler);

        metrics::counter!("workflows_registered_total").increment(1);
        tracing::info!(%workflow_id, "workflow registered");
        Ok(workflow_id)
    }

    /// Returns a snapshot of a workflow's step statuses.
    pub async fn status(&self, workflow_id: WorkflowId) -> Result<Vec<StepStatus>> {
        self.store.status(workflow_id).await
    }

    /// Waits until every workflow registered so far has settled.
    pub async fn await_completion(&self) -> Result<()> {
        self.scheduler().await_all().await
    }

    /// Forgets every workflow.
    ///
    /// Workflows registered before the reset are dropped, and the ones still
    /// running stop at their next step. Workflows registered once `reset` has
    /// begun are kept and run on a fresh pool. Workflow ids keep increasing
    /// across resets; suppliers are left untouched.
    #[tracing::instrument(skip(self), fields(orchestrator_id = self.id))]
    pub async fn reset(&self) -> Result<()> {
        let previous = {
            let mut scheduler = self.scheduler.lock().unwrap_or_else(PoisonError::into_inner);
            self.store.clear();
            std::mem::replace(
                &mut *scheduler,
                Arc::new(Scheduler::new(self.config.pool_size)),
            )
        };
        self.audit(AuditKind::Cleared);

        let drained = previous.shutdown().await;
        tracing::info!("orchestrator reset");
        drained
    }
}
