use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wms_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, OrderId, ReserveId, WarehouseId,
};
use wms_events::Event;
use wms_products::ProductId;

use crate::warehouse::Warehouse;

/// Reserve status lifecycle: `New` → `Completed` | `Canceled`, both terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReserveStatus {
    New,
    Completed,
    Canceled,
}

impl ReserveStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ReserveStatus::New)
    }
}

/// A pending claim against one warehouse's stock for one order.
///
/// Refers to its order and warehouse by id only. The stock itself has already been
/// taken off the warehouse shelf when the reserve exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductReserve {
    id: ReserveId,
    order_id: OrderId,
    warehouse_id: WarehouseId,
    product_id: ProductId,
    quantity: u32,
    status: ReserveStatus,
    version: u64,
}

impl ProductReserve {
    pub fn new(
        id: ReserveId,
        order_id: OrderId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: u32,
    ) -> Self {
        Self {
            id,
            order_id,
            warehouse_id,
            product_id,
            quantity,
            status: ReserveStatus::New,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> ReserveId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn status(&self) -> ReserveStatus {
        self.status
    }

    /// Mark the reserve as fulfilled. Rejected once the reserve is terminal.
    pub fn complete(&mut self, occurred_at: DateTime<Utc>) -> DomainResult<()> {
        self.execute(&ReserveCommand::Complete(CompleteReserve {
            reserve_id: self.id,
            occurred_at,
        }))?;
        Ok(())
    }

    /// Give the reserved units back to `warehouse` and mark the reserve canceled.
    ///
    /// `warehouse` must be the one the units were taken from. A second cancel is
    /// rejected, so units are never returned twice.
    pub fn cancel(&mut self, warehouse: &mut Warehouse, occurred_at: DateTime<Utc>) -> DomainResult<()> {
        let events = self.handle(&ReserveCommand::Cancel(CancelReserve {
            reserve_id: self.id,
            occurred_at,
        }))?;
        self.return_stock(warehouse, occurred_at)?;
        for event in &events {
            self.apply(event);
        }
        Ok(())
    }

    /// Release this reserve's units at `warehouse` without touching the reserve.
    ///
    /// Callers that wrap reserve events in their own aggregate (the order) use this
    /// between deciding and applying a cancel.
    pub fn return_stock(&self, warehouse: &mut Warehouse, occurred_at: DateTime<Utc>) -> DomainResult<()> {
        if warehouse.id_typed() != self.warehouse_id {
            return Err(DomainError::invariant(format!(
                "reserve {} belongs to warehouse {}, not {}",
                self.id,
                self.warehouse_id,
                warehouse.id_typed()
            )));
        }
        warehouse.release(&self.product_id, self.quantity, Some(self.id), occurred_at)
    }
}

impl AggregateRoot for ProductReserve {
    type Id = ReserveId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CompleteReserve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteReserve {
    pub reserve_id: ReserveId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelReserve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReserve {
    pub reserve_id: ReserveId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReserveCommand {
    Complete(CompleteReserve),
    Cancel(CancelReserve),
}

/// Event: ReserveCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveCompleted {
    pub reserve_id: ReserveId,
    pub order_id: OrderId,
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReserveCanceled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveCanceled {
    pub reserve_id: ReserveId,
    pub order_id: OrderId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReserveEvent {
    ReserveCompleted(ReserveCompleted),
    ReserveCanceled(ReserveCanceled),
}

impl ReserveEvent {
    pub fn reserve_id(&self) -> ReserveId {
        match self {
            ReserveEvent::ReserveCompleted(e) => e.reserve_id,
            ReserveEvent::ReserveCanceled(e) => e.reserve_id,
        }
    }
}

impl Event for ReserveEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReserveEvent::ReserveCompleted(_) => "inventory.reserve.completed",
            ReserveEvent::ReserveCanceled(_) => "inventory.reserve.canceled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReserveEvent::ReserveCompleted(e) => e.occurred_at,
            ReserveEvent::ReserveCanceled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProductReserve {
    type Command = ReserveCommand;
    type Event = ReserveEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReserveEvent::ReserveCompleted(_) => {
                self.status = ReserveStatus::Completed;
            }
            ReserveEvent::ReserveCanceled(_) => {
                self.status = ReserveStatus::Canceled;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReserveCommand::Complete(cmd) => {
                self.ensure_open(cmd.reserve_id, "complete")?;
                Ok(vec![ReserveEvent::ReserveCompleted(ReserveCompleted {
                    reserve_id: self.id,
                    order_id: self.order_id,
                    warehouse_id: self.warehouse_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            ReserveCommand::Cancel(cmd) => {
                self.ensure_open(cmd.reserve_id, "cancel")?;
                Ok(vec![ReserveEvent::ReserveCanceled(ReserveCanceled {
                    reserve_id: self.id,
                    order_id: self.order_id,
                    warehouse_id: self.warehouse_id,
                    product_id: self.product_id.clone(),
                    quantity: self.quantity,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl ProductReserve {
    fn ensure_open(&self, reserve_id: ReserveId, action: &'static str) -> Result<(), DomainError> {
        if self.id != reserve_id {
            return Err(DomainError::invariant("reserve_id mismatch"));
        }
        if self.status.is_terminal() {
            return Err(DomainError::invalid_transition(
                "product reserve",
                self.status,
                action,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn product_x() -> ProductId {
        ProductId::new("SKU-X").unwrap()
    }

    fn stocked_warehouse(city: &str, quantity: u32) -> Warehouse {
        let address = Address::new(city, "Dock Rd", "1").unwrap();
        let mut warehouse = Warehouse::new(format!("{city} DC"), address).unwrap();
        warehouse.add_stock(&product_x(), quantity, test_time()).unwrap();
        warehouse
    }

    #[test]
    fn complete_moves_new_to_completed() {
        let mut warehouse = stocked_warehouse("CityA", 5);
        let mut reserve = warehouse
            .reserve(&product_x(), 2, OrderId::new(), test_time())
            .unwrap();

        reserve.complete(test_time()).unwrap();

        assert_eq!(reserve.status(), ReserveStatus::Completed);
        assert_eq!(reserve.version(), 1);
        // Completion does not give units back.
        assert_eq!(warehouse.available(&product_x()), 3);
    }

    #[test]
    fn completing_twice_is_an_invalid_transition() {
        let mut warehouse = stocked_warehouse("CityA", 5);
        let mut reserve = warehouse
            .reserve(&product_x(), 2, OrderId::new(), test_time())
            .unwrap();
        reserve.complete(test_time()).unwrap();

        let err = reserve.complete(test_time()).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidStateTransition {
                entity: "product reserve",
                from: "Completed".to_string(),
                action: "complete",
            }
        );
    }

    #[test]
    fn cancel_restores_exactly_the_reserved_quantity() {
        let mut warehouse = stocked_warehouse("CityA", 5);
        let mut reserve = warehouse
            .reserve(&product_x(), 4, OrderId::new(), test_time())
            .unwrap();
        assert_eq!(warehouse.available(&product_x()), 1);

        reserve.cancel(&mut warehouse, test_time()).unwrap();

        assert_eq!(reserve.status(), ReserveStatus::Canceled);
        assert_eq!(warehouse.available(&product_x()), 5);
    }

    #[test]
    fn second_cancel_is_rejected_and_does_not_double_restore() {
        let mut warehouse = stocked_warehouse("CityA", 5);
        let mut reserve = warehouse
            .reserve(&product_x(), 4, OrderId::new(), test_time())
            .unwrap();
        reserve.cancel(&mut warehouse, test_time()).unwrap();

        let err = reserve.cancel(&mut warehouse, test_time()).unwrap_err();

        assert!(matches!(err, DomainError::InvalidStateTransition { action: "cancel", .. }));
        assert_eq!(warehouse.available(&product_x()), 5);
    }

    #[test]
    fn completed_reserve_cannot_be_canceled() {
        let mut warehouse = stocked_warehouse("CityA", 5);
        let mut reserve = warehouse
            .reserve(&product_x(), 4, OrderId::new(), test_time())
            .unwrap();
        reserve.complete(test_time()).unwrap();

        let err = reserve.cancel(&mut warehouse, test_time()).unwrap_err();

        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert_eq!(warehouse.available(&product_x()), 1);
    }

    #[test]
    fn cancel_against_the_wrong_warehouse_changes_nothing() {
        let mut home = stocked_warehouse("CityA", 5);
        let mut other = stocked_warehouse("CityB", 5);
        let mut reserve = home
            .reserve(&product_x(), 2, OrderId::new(), test_time())
            .unwrap();

        let err = reserve.cancel(&mut other, test_time()).unwrap_err();

        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(reserve.status(), ReserveStatus::New);
        assert_eq!(other.available(&product_x()), 5);
        assert_eq!(home.available(&product_x()), 3);
    }
}
