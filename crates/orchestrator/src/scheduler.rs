//! Bounded worker pool for workflow executions.

use std::sync::Arc;

use tokio::sync::{Semaphore, watch};

use crate::error::{OrchestratorError, Result};
use crate::executor::StepExecutor;

/// Bookkeeping shared by the scheduler and its worker tasks.
#[derive(Debug)]
struct PoolState {
    accepting: bool,
    pending: usize,
    /// First executor failure since the pool was last idle.
    first_error: Option<OrchestratorError>,
}

/// Marks one execution as finished when dropped.
///
/// A worker that panics or is aborted never sets an outcome and is reported
/// as an internal error.
struct Completion {
    state: Arc<watch::Sender<PoolState>>,
    outcome: Option<Result<()>>,
}

impl Drop for Completion {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or_else(|| {
            Err(OrchestratorError::Internal(
                "worker task panicked or was aborted".to_string(),
            ))
        });
        if let Err(e) = &outcome {
            tracing::error!(error = %e, "workflow execution failed");
        }
        self.state.send_modify(|state| {
            state.pending -= 1;
            if let Err(e) = outcome {
                state.first_error.get_or_insert(e);
            }
        });
    }
}

/// Runs submitted workflows with at most `pool_size` executing at once.
///
/// Submissions beyond the pool size queue on the semaphore and start as
/// permits free up. Any number of callers may wait for the pool to drain.
#[derive(Debug)]
pub struct Scheduler {
    permits: Arc<Semaphore>,
    pool_size: usize,
    state: Arc<watch::Sender<PoolState>>,
}

impl Scheduler {
    /// Creates a scheduler. A pool size of zero is raised to one.
    pub fn new(pool_size: usize) -> Self {
        let pool_size = pool_size.max(1);
        let (state, _) = watch::channel(PoolState {
            accepting: true,
            pending: 0,
            first_error: None,
        });
        Self {
            permits: Arc::new(Semaphore::new(pool_size)),
            pool_size,
            state: Arc::new(state),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Number of submitted executions that have not finished yet.
    pub fn pending(&self) -> usize {
        self.state.borrow().pending
    }

    /// Queues an execution. Returns without waiting for it to start.
    pub fn submit(&self, executor: StepExecutor) -> Result<()> {
        let accepted = self.state.send_if_modified(|state| {
            if !state.accepting {
                return false;
            }
            // A new batch starts once the previous one has been fully drained.
            if state.pending == 0 {
                state.first_error = None;
            }
            state.pending += 1;
            true
        });
        if !accepted {
            return Err(OrchestratorError::SchedulerShutDown);
        }

        let mut completion = Completion {
            state: self.state.clone(),
            outcome: None,
        };
        let permits = self.permits.clone();
        let workflow_id = executor.workflow_id();
        tokio::spawn(async move {
            let outcome = match permits.acquire_owned().await {
                Ok(_permit) => {
                    tracing::debug!(%workflow_id, "worker picked up workflow");
                    executor.run().await
                }
                Err(_) => Err(OrchestratorError::SchedulerShutDown),
            };
            completion.outcome = Some(outcome);
        });
        Ok(())
    }

    /// Waits until every submitted execution has finished, including ones
    /// submitted while waiting.
    ///
    /// Every concurrent caller waits for the same drain and sees the same
    /// first executor error, if any.
    pub async fn await_all(&self) -> Result<()> {
        let mut changes = self.state.subscribe();
        let idle = changes
            .wait_for(|state| state.pending == 0)
            .await
            .map_err(|_| OrchestratorError::Internal("scheduler state dropped".to_string()))?;

        match &idle.first_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Stops accepting work, waits for everything already submitted, then
    /// releases the pool.
    pub async fn shutdown(&self) -> Result<()> {
        self.state.send_modify(|state| state.accepting = false);
        let outcome = self.await_all().await;
        self.permits.close();
        tracing::debug!(pool_size = self.pool_size, "scheduler shut down");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WorkflowStore;
    use crate::suppliers::{ItemSupplier, SupplierError, SupplierRegistry};
    use async_trait::async_trait;
    use common::{ItemId, ItemQuantity, OrderStep, StepStatus, SupplierId, WorkflowId};
    use ledger::{AuditSource, MemoryAuditSink};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts how many steps run at the same time.
    #[derive(Default)]
    struct SlowSupplier {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ItemSupplier for SlowSupplier {
        fn id(&self) -> SupplierId {
            SupplierId::new(0)
        }

        async fn execute_step(&self, _step: &OrderStep) -> std::result::Result<(), SupplierError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        async fn get_orders(
            &self,
            _item_ids: &[ItemId],
        ) -> std::result::Result<Vec<ItemQuantity>, SupplierError> {
            Ok(vec![])
        }

        async fn reset(&self) -> std::result::Result<(), SupplierError> {
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<WorkflowStore>,
        supplier: Arc<SlowSupplier>,
        suppliers: SupplierRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let supplier = Arc::new(SlowSupplier::default());
            let suppliers = SupplierRegistry::new(vec![supplier.clone() as Arc<dyn ItemSupplier>]).unwrap();
            Self {
                store: Arc::new(WorkflowStore::new()),
                supplier,
                suppliers,
            }
        }

        fn workflow(&self, id: i64) -> StepExecutor {
            let workflow_id = WorkflowId::new(id);
            self.store.insert(
                workflow_id,
                vec![OrderStep::new(0, vec![ItemQuantity::new(0, 1)])],
            );
            StepExecutor::new(
                workflow_id,
                self.store.clone(),
                self.suppliers.clone(),
                Arc::new(MemoryAuditSink::new()),
                AuditSource::Orchestrator(0),
            )
        }
    }

    #[tokio::test]
    async fn test_pool_bounds_concurrency() {
        let fx = Fixture::new();
        let scheduler = Scheduler::new(3);

        for id in 0..12 {
            scheduler.submit(fx.workflow(id)).unwrap();
        }
        scheduler.await_all().await.unwrap();

        let peak = fx.supplier.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak} exceeded the pool");
        assert_eq!(scheduler.pending(), 0);
        for id in 0..12 {
            assert_eq!(
                fx.store.status(WorkflowId::new(id)).await.unwrap(),
                vec![StepStatus::Successful]
            );
        }
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let fx = Fixture::new();
        let scheduler = Scheduler::new(2);
        scheduler.submit(fx.workflow(0)).unwrap();

        scheduler.shutdown().await.unwrap();
        assert_eq!(
            fx.store.status(WorkflowId::new(0)).await.unwrap(),
            vec![StepStatus::Successful]
        );
        assert!(matches!(
            scheduler.submit(fx.workflow(1)),
            Err(OrchestratorError::SchedulerShutDown)
        ));
    }

    #[tokio::test]
    async fn test_await_all_reports_execution_errors() {
        let fx = Fixture::new();
        let scheduler = Scheduler::new(1);

        let executor = fx.workflow(0);
        fx.store
            .set_status(WorkflowId::new(0), 0, StepStatus::Failed)
            .await
            .unwrap();
        scheduler.submit(executor).unwrap();

        let err = scheduler.await_all().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_every_waiter_blocks_until_drained() {
        let fx = Fixture::new();
        let scheduler = Arc::new(Scheduler::new(1));
        for id in 0..4 {
            scheduler.submit(fx.workflow(id)).unwrap();
        }

        let first = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.await_all().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        scheduler.await_all().await.unwrap();

        assert_eq!(scheduler.pending(), 0);
        for id in 0..4 {
            assert_eq!(
                fx.store.status(WorkflowId::new(id)).await.unwrap(),
                vec![StepStatus::Successful]
            );
        }
        first.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_every_waiter_sees_the_first_error() {
        let fx = Fixture::new();
        let scheduler = Scheduler::new(2);

        let broken = fx.workflow(0);
        fx.store
            .set_status(WorkflowId::new(0), 0, StepStatus::Failed)
            .await
            .unwrap();
        scheduler.submit(broken).unwrap();
        scheduler.submit(fx.workflow(1)).unwrap();

        let (a, b) = tokio::join!(scheduler.await_all(), scheduler.await_all());
        assert!(matches!(a, Err(OrchestratorError::InvalidTransition { .. })));
        assert!(matches!(b, Err(OrchestratorError::InvalidTransition { .. })));

        // The next batch starts with a clean slate.
        scheduler.submit(fx.workflow(2)).unwrap();
        scheduler.await_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_pool_size_still_runs() {
        let scheduler = Scheduler::new(0);
        assert_eq!(scheduler.pool_size(), 1);
        scheduler.await_all().await.unwrap();
    }
}
