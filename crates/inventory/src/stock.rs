use serde::{Deserialize, Serialize};

use wms_core::{DomainError, DomainResult, Entity, WarehouseId};
use wms_products::ProductId;

/// Quantity of one product held at one warehouse.
///
/// Created lazily the first time a product is stocked at a warehouse. The
/// quantity is unsigned and every change goes through the checked helpers below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    product_id: ProductId,
    warehouse_id: WarehouseId,
    quantity: u32,
}

impl Entity for ProductStock {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }
}

impl ProductStock {
    pub(crate) fn new(product_id: ProductId, warehouse_id: WarehouseId, quantity: u32) -> Self {
        Self {
            product_id,
            warehouse_id,
            quantity,
        }
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Quantity after adding `amount`, or an invariant error on overflow.
    pub fn checked_increase(&self, amount: u32) -> DomainResult<u32> {
        self.quantity.checked_add(amount).ok_or_else(|| {
            DomainError::invariant(format!(
                "stock of {} would overflow ({} + {amount})",
                self.product_id, self.quantity
            ))
        })
    }

    /// Quantity after taking `amount`, or `InsufficientStock`.
    pub fn checked_decrease(&self, amount: u32) -> DomainResult<u32> {
        self.quantity.checked_sub(amount).ok_or_else(|| {
            DomainError::insufficient_stock(self.product_id.as_str(), amount, self.quantity)
        })
    }

    pub(crate) fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(quantity: u32) -> ProductStock {
        ProductStock::new(ProductId::new("SKU-1").unwrap(), WarehouseId::new(), quantity)
    }

    #[test]
    fn decrease_below_zero_is_insufficient_stock() {
        let err = stock(3).checked_decrease(4).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock("SKU-1", 4, 3));
    }

    #[test]
    fn increase_overflow_is_an_invariant_violation() {
        let err = stock(u32::MAX).checked_increase(1).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn entity_id_is_the_product() {
        let s = stock(1);
        assert_eq!(s.id().as_str(), "SKU-1");
    }
}
