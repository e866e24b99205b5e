//! Workflow orchestration for the supply-chain broker.
//!
//! An [`Orchestrator`] accepts workflows (ordered lists of order steps, each
//! addressed to one supplier), records a status per step, and runs each
//! workflow's steps sequentially on a bounded pool of workers:
//!
//! 1. `register` validates the steps, allocates a workflow id and returns
//!    immediately
//! 2. a [`StepExecutor`] applies each step against its [`ItemSupplier`]
//! 3. each step ends `Successful` or `Failed`; a failed step never stops the
//!    remaining ones and is never retried
//!
//! Suppliers are reached through one capability trait, implemented in-process
//! by [`ledger::Ledger`] and over HTTP by [`RemoteSupplier`].

pub mod config;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod scheduler;
pub mod store;
pub mod suppliers;

pub use common::{ItemId, ItemQuantity, OrderStep, StepStatus, SupplierId, WorkflowId};
pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result};
pub use executor::StepExecutor;
pub use orchestrator::Orchestrator;
pub use scheduler::Scheduler;
pub use store::WorkflowStore;
pub use suppliers::remote::{ErrorBody, ErrorKind, OrdersRequest};
pub use suppliers::{ItemSupplier, RemoteSupplier, SupplierError, SupplierRegistry};
