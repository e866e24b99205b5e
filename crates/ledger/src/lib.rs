//! In-memory inventory ledger for a single supplier.
//!
//! The crate provides:
//! - [`KeyedLockTable`], a registry of independent read/write locks indexed by
//!   key, with ordered multi-key acquisition
//! - [`Ledger`], cumulative ordered quantities per item with all-or-nothing
//!   application of multi-item order steps
//! - [`AuditSink`], the seam through which ledger and orchestrator activity is
//!   recorded

pub mod audit;
pub mod error;
pub mod ledger;
pub mod lock_table;

pub use audit::{AuditKind, AuditRecord, AuditSink, AuditSource, MemoryAuditSink, TracingAuditSink};
pub use common::{ItemId, ItemQuantity, OrderStep, SupplierId};
pub use error::{LedgerError, LockTableError, Result};
pub use ledger::Ledger;
pub use lock_table::{KeyedLockTable, MultiReadGuard, MultiWriteGuard};
