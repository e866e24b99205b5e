//! In-process supplier backed by a [`Ledger`].

use async_trait::async_trait;
use common::{ItemId, ItemQuantity, OrderStep, SupplierId};
use ledger::{Ledger, LedgerError};

use super::{ItemSupplier, SupplierError};

impl From<LedgerError> for SupplierError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation { .. } => SupplierError::Validation(err.to_string()),
            LedgerError::UnknownItem { item_id, .. } => SupplierError::UnknownItem(item_id),
            LedgerError::LockTable(_) => SupplierError::Internal(err.to_string()),
        }
    }
}

#[async_trait]
impl ItemSupplier for Ledger {
    fn id(&self) -> SupplierId {
        self.supplier_id()
    }

    async fn execute_step(&self, step: &OrderStep) -> Result<(), SupplierError> {
        Ok(self.apply_step(step).await?)
    }

    async fn get_orders(&self, item_ids: &[ItemId]) -> Result<Vec<ItemQuantity>, SupplierError> {
        Ok(self.get_quantities(item_ids).await?)
    }

    async fn reset(&self) -> Result<(), SupplierError> {
        self.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger::LockTableError;

    #[tokio::test]
    async fn test_ledger_as_supplier() {
        let supplier: &dyn ItemSupplier = &Ledger::new(SupplierId::new(3));
        assert_eq!(supplier.id(), SupplierId::new(3));

        supplier
            .execute_step(&OrderStep::new(3, vec![ItemQuantity::new(1, 2)]))
            .await
            .unwrap();
        assert_eq!(
            supplier.get_orders(&[ItemId::new(1)]).await.unwrap(),
            vec![ItemQuantity::new(1, 2)]
        );

        supplier.reset().await.unwrap();
        assert_eq!(
            supplier.get_orders(&[ItemId::new(1)]).await,
            Err(SupplierError::UnknownItem(ItemId::new(1)))
        );
    }

    #[tokio::test]
    async fn test_validation_maps_to_validation() {
        let supplier = Ledger::new(SupplierId::new(3));
        let err = supplier
            .execute_step(&OrderStep::new(3, vec![ItemQuantity::new(1, -5)]))
            .await
            .unwrap_err();
        assert!(matches!(err, SupplierError::Validation(_)));
    }

    #[test]
    fn test_lock_table_error_maps_to_internal() {
        let err = SupplierError::from(LedgerError::LockTable(LockTableError::KeyNotEnsured {
            key: "1".to_string(),
        }));
        assert!(matches!(err, SupplierError::Internal(_)));
    }
}
