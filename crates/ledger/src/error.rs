use thiserror::Error;

use crate::{ItemId, SupplierId};

/// Errors raised by a [`KeyedLockTable`](crate::KeyedLockTable).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockTableError {
    /// A lock was requested for a key that was never ensured.
    #[error("No lock entry exists for key {key}")]
    KeyNotEnsured { key: String },
}

/// Errors that can occur when interacting with a ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The order step was malformed. Nothing was applied.
    #[error("Supplier {supplier_id}: {reason}")]
    Validation {
        supplier_id: SupplierId,
        reason: String,
    },

    /// The supplier has no committed orders for the item.
    #[error("Supplier {supplier_id} has no record of any orders on item {item_id}")]
    UnknownItem {
        supplier_id: SupplierId,
        item_id: ItemId,
    },

    /// Locking failed.
    #[error("Lock table error: {0}")]
    LockTable(#[from] LockTableError),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
