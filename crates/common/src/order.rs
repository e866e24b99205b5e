//! Order value types: an item/quantity pair and a step aimed at one supplier.

use serde::{Deserialize, Serialize};

use crate::types::{ItemId, SupplierId};

/// A quantity of one item.
///
/// Quantities of any sign can be constructed; only quantities of at least one
/// are accepted by a supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemQuantity {
    pub item_id: ItemId,
    pub quantity: i64,
}

impl ItemQuantity {
    pub fn new(item_id: i64, quantity: i64) -> Self {
        Self {
            item_id: ItemId::new(item_id),
            quantity,
        }
    }
}

/// An order directed at a single supplier, carrying one or more items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStep {
    pub supplier_id: SupplierId,
    pub items: Vec<ItemQuantity>,
}

impl OrderStep {
    /// Creates a new order step.
    pub fn new(supplier_id: i64, items: Vec<ItemQuantity>) -> Self {
        Self {
            supplier_id: SupplierId::new(supplier_id),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_json_shape() {
        let step = OrderStep::new(3, vec![ItemQuantity::new(7, 10)]);
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"supplier_id": 3, "items": [{"item_id": 7, "quantity": 10}]})
        );
    }
}
