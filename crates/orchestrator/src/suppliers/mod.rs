//! Supplier capability trait, its error taxonomy and the supplier registry.

pub mod local;
pub mod remote;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ItemId, ItemQuantity, OrderStep, SupplierId};
use thiserror::Error;

use crate::error::OrchestratorError;

pub use remote::RemoteSupplier;

/// Errors a supplier can report, whatever the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupplierError {
    /// The supplier rejected the request as malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The supplier has no record of the item.
    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),

    /// The supplier could not be reached or its reply could not be understood.
    #[error("Network error: {0}")]
    Network(String),

    /// Any other failure inside the supplier.
    #[error("Internal supplier error: {0}")]
    Internal(String),
}

/// Operations the orchestrator needs from a supplier.
#[async_trait]
pub trait ItemSupplier: Send + Sync {
    /// Returns the id of this supplier.
    fn id(&self) -> SupplierId;

    /// Applies an order step to the supplier's inventory.
    async fn execute_step(&self, step: &OrderStep) -> Result<(), SupplierError>;

    /// Returns the total ordered quantity per requested item.
    async fn get_orders(&self, item_ids: &[ItemId]) -> Result<Vec<ItemQuantity>, SupplierError>;

    /// Returns the supplier to its initial state.
    async fn reset(&self) -> Result<(), SupplierError>;
}

/// Immutable mapping from supplier id to supplier, fixed at construction.
#[derive(Clone)]
pub struct SupplierRegistry {
    suppliers: Arc<BTreeMap<SupplierId, Arc<dyn ItemSupplier>>>,
}

impl SupplierRegistry {
    /// Builds a registry, rejecting an empty list or duplicated ids.
    pub fn new(suppliers: Vec<Arc<dyn ItemSupplier>>) -> Result<Self, OrchestratorError> {
        if suppliers.is_empty() {
            return Err(OrchestratorError::Validation(
                "the supplier list cannot be empty".to_string(),
            ));
        }

        let mut map = BTreeMap::new();
        for supplier in suppliers {
            let id = supplier.id();
            if map.insert(id, supplier).is_some() {
                return Err(OrchestratorError::Validation(format!(
                    "supplier {id} is listed more than once"
                )));
            }
        }

        Ok(Self {
            suppliers: Arc::new(map),
        })
    }

    pub fn get(&self, id: SupplierId) -> Option<Arc<dyn ItemSupplier>> {
        self.suppliers.get(&id).cloned()
    }

    pub fn contains(&self, id: SupplierId) -> bool {
        self.suppliers.contains_key(&id)
    }

    /// Returns every supplier id in ascending order.
    pub fn ids(&self) -> Vec<SupplierId> {
        self.suppliers.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ItemSupplier>> {
        self.suppliers.values()
    }

    pub fn len(&self) -> usize {
        self.suppliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suppliers.is_empty()
    }
}

impl std::fmt::Debug for SupplierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupplierRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}
