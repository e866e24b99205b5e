//! Identifiers and order value types shared by the ledger, the orchestrator
//! and the HTTP layer.

pub mod order;
pub mod status;
pub mod types;

pub use order::{ItemQuantity, OrderStep};
pub use status::StepStatus;
pub use types::{ItemId, SupplierId, WorkflowId};
