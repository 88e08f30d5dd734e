use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wms_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, OrderId, ReserveId, WarehouseId,
};
use wms_events::{Event, Recorded};
use wms_products::ProductId;

use crate::address::Address;
use crate::reserve::ProductReserve;
use crate::stock::ProductStock;

/// Aggregate root: Warehouse.
///
/// Owns its stock lines exclusively. Every stock mutation goes through a command so
/// that rejected requests leave the stock untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warehouse {
    id: WarehouseId,
    name: String,
    address: Address,
    stock: Vec<ProductStock>,
    version: u64,
    pending: Vec<Recorded<WarehouseEvent>>,
}

impl Warehouse {
    pub fn new(name: impl Into<String>, address: Address) -> DomainResult<Self> {
        Self::with_id(WarehouseId::new(), name, address)
    }

    pub fn with_id(
        id: WarehouseId,
        name: impl Into<String>,
        address: Address,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("warehouse name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            address,
            stock: Vec::new(),
            version: 0,
            pending: Vec::new(),
        })
    }

    pub fn id_typed(&self) -> WarehouseId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn stock(&self) -> &[ProductStock] {
        &self.stock
    }

    pub fn get_stock(&self, product_id: &ProductId) -> Option<&ProductStock> {
        self.stock.iter().find(|s| s.product_id() == product_id)
    }

    /// Quantity available for `product_id`; zero when the product was never stocked here.
    pub fn available(&self, product_id: &ProductId) -> u32 {
        self.get_stock(product_id).map_or(0, ProductStock::quantity)
    }

    /// Put `quantity` units of a product on the shelf.
    pub fn add_stock(
        &mut self,
        product_id: &ProductId,
        quantity: u32,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.record(&WarehouseCommand::AddStock(AddStock {
            warehouse_id: self.id,
            product_id: product_id.clone(),
            quantity,
            occurred_at,
        }))?;
        Ok(())
    }

    /// Take `quantity` units off the shelf on behalf of `order_id`.
    ///
    /// Fails with `NotFound` when the product was never stocked here and with
    /// `InsufficientStock` when the shelf holds less than requested.
    pub fn reserve(
        &mut self,
        product_id: &ProductId,
        quantity: u32,
        order_id: OrderId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<ProductReserve> {
        let reserve_id = ReserveId::new();
        self.record(&WarehouseCommand::ReserveStock(ReserveStock {
            warehouse_id: self.id,
            reserve_id,
            order_id,
            product_id: product_id.clone(),
            quantity,
            occurred_at,
        }))?;
        Ok(ProductReserve::new(
            reserve_id,
            order_id,
            self.id,
            product_id.clone(),
            quantity,
        ))
    }

    /// Return previously reserved units to the shelf.
    pub fn release(
        &mut self,
        product_id: &ProductId,
        quantity: u32,
        reserve_id: Option<ReserveId>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.record(&WarehouseCommand::ReleaseStock(ReleaseStock {
            warehouse_id: self.id,
            reserve_id,
            product_id: product_id.clone(),
            quantity,
            occurred_at,
        }))?;
        Ok(())
    }

    /// Events applied through the convenience methods and not yet drained.
    pub fn pending_events(&self) -> &[Recorded<WarehouseEvent>] {
        &self.pending
    }

    /// Drain accumulated domain events.
    pub fn drain_events(&mut self) -> Vec<Recorded<WarehouseEvent>> {
        std::mem::take(&mut self.pending)
    }

    fn record(&mut self, command: &WarehouseCommand) -> DomainResult<Vec<WarehouseEvent>> {
        let events = self.handle(command)?;
        for event in &events {
            self.apply(event);
            self.pending.push(Recorded::new(self.version, event.clone()));
        }
        Ok(events)
    }
}

impl AggregateRoot for Warehouse {
    type Id = WarehouseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AddStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddStock {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub warehouse_id: WarehouseId,
    pub reserve_id: ReserveId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseStock {
    pub warehouse_id: WarehouseId,
    /// The reserve being undone, when the release comes from a cancel or rollback.
    pub reserve_id: Option<ReserveId>,
    pub product_id: ProductId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarehouseCommand {
    AddStock(AddStock),
    ReserveStock(ReserveStock),
    ReleaseStock(ReleaseStock),
}

/// Event: StockAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdded {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub warehouse_id: WarehouseId,
    pub reserve_id: ReserveId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReleased {
    pub warehouse_id: WarehouseId,
    pub reserve_id: Option<ReserveId>,
    pub product_id: ProductId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarehouseEvent {
    StockAdded(StockAdded),
    StockReserved(StockReserved),
    StockReleased(StockReleased),
}

impl Event for WarehouseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WarehouseEvent::StockAdded(_) => "inventory.warehouse.stock_added",
            WarehouseEvent::StockReserved(_) => "inventory.warehouse.stock_reserved",
            WarehouseEvent::StockReleased(_) => "inventory.warehouse.stock_released",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            WarehouseEvent::StockAdded(e) => e.occurred_at,
            WarehouseEvent::StockReserved(e) => e.occurred_at,
            WarehouseEvent::StockReleased(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Warehouse {
    type Command = WarehouseCommand;
    type Event = WarehouseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            WarehouseEvent::StockAdded(e) => self.credit(&e.product_id, e.quantity),
            WarehouseEvent::StockReleased(e) => self.credit(&e.product_id, e.quantity),
            WarehouseEvent::StockReserved(e) => {
                if let Some(stock) = self.stock.iter_mut().find(|s| s.product_id() == &e.product_id) {
                    stock.set_quantity(stock.quantity().saturating_sub(e.quantity));
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            WarehouseCommand::AddStock(cmd) => self.handle_add(cmd),
            WarehouseCommand::ReserveStock(cmd) => self.handle_reserve(cmd),
            WarehouseCommand::ReleaseStock(cmd) => self.handle_release(cmd),
        }
    }
}

impl Warehouse {
    fn credit(&mut self, product_id: &ProductId, quantity: u32) {
        match self.stock.iter_mut().find(|s| s.product_id() == product_id) {
            Some(stock) => stock.set_quantity(stock.quantity().saturating_add(quantity)),
            None => self
                .stock
                .push(ProductStock::new(product_id.clone(), self.id, quantity)),
        }
    }

    fn ensure_warehouse_id(&self, warehouse_id: WarehouseId) -> Result<(), DomainError> {
        if self.id != warehouse_id {
            return Err(DomainError::invariant("warehouse_id mismatch"));
        }
        Ok(())
    }

    fn ensure_credit_fits(&self, product_id: &ProductId, quantity: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if let Some(stock) = self.get_stock(product_id) {
            stock.checked_increase(quantity)?;
        }
        Ok(())
    }

    fn handle_add(&self, cmd: &AddStock) -> Result<Vec<WarehouseEvent>, DomainError> {
        self.ensure_warehouse_id(cmd.warehouse_id)?;
        self.ensure_credit_fits(&cmd.product_id, cmd.quantity)?;

        Ok(vec![WarehouseEvent::StockAdded(StockAdded {
            warehouse_id: cmd.warehouse_id,
            product_id: cmd.product_id.clone(),
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<WarehouseEvent>, DomainError> {
        self.ensure_warehouse_id(cmd.warehouse_id)?;

        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let stock = self.get_stock(&cmd.product_id).ok_or_else(|| {
            DomainError::not_found(format!(
                "stock of {} at warehouse '{}'",
                cmd.product_id, self.name
            ))
        })?;
        stock.checked_decrease(cmd.quantity)?;

        Ok(vec![WarehouseEvent::StockReserved(StockReserved {
            warehouse_id: cmd.warehouse_id,
            reserve_id: cmd.reserve_id,
            order_id: cmd.order_id,
            product_id: cmd.product_id.clone(),
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseStock) -> Result<Vec<WarehouseEvent>, DomainError> {
        self.ensure_warehouse_id(cmd.warehouse_id)?;
        self.ensure_credit_fits(&cmd.product_id, cmd.quantity)?;

        Ok(vec![WarehouseEvent::StockReleased(StockReleased {
            warehouse_id: cmd.warehouse_id,
            reserve_id: cmd.reserve_id,
            product_id: cmd.product_id.clone(),
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reserve::ReserveStatus;

    fn test_warehouse() -> Warehouse {
        let address = Address::new("CityA", "Dock Rd", "7").unwrap();
        Warehouse::new("Main", address).unwrap()
    }

    fn product_x() -> ProductId {
        ProductId::new("SKU-X").unwrap()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn add_stock_creates_entry_lazily() {
        let mut warehouse = test_warehouse();
        assert!(warehouse.get_stock(&product_x()).is_none());
        assert_eq!(warehouse.available(&product_x()), 0);

        warehouse.add_stock(&product_x(), 5, test_time()).unwrap();

        let stock = warehouse.get_stock(&product_x()).unwrap();
        assert_eq!(stock.quantity(), 5);
        assert_eq!(stock.warehouse_id(), warehouse.id_typed());
        assert_eq!(warehouse.stock().len(), 1);
    }

    #[test]
    fn add_stock_twice_accumulates_on_the_same_entry() {
        let mut warehouse = test_warehouse();
        warehouse.add_stock(&product_x(), 5, test_time()).unwrap();
        warehouse.add_stock(&product_x(), 3, test_time()).unwrap();

        assert_eq!(warehouse.available(&product_x()), 8);
        assert_eq!(warehouse.stock().len(), 1);
    }

    #[test]
    fn add_zero_stock_is_rejected() {
        let mut warehouse = test_warehouse();
        let err = warehouse.add_stock(&product_x(), 0, test_time()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(warehouse.stock().is_empty());
    }

    #[test]
    fn reserve_decrements_stock_and_returns_new_reserve() {
        let mut warehouse = test_warehouse();
        warehouse.add_stock(&product_x(), 5, test_time()).unwrap();
        let order_id = OrderId::new();

        let reserve = warehouse
            .reserve(&product_x(), 3, order_id, test_time())
            .unwrap();

        assert_eq!(warehouse.available(&product_x()), 2);
        assert_eq!(reserve.status(), ReserveStatus::New);
        assert_eq!(reserve.quantity(), 3);
        assert_eq!(reserve.order_id(), order_id);
        assert_eq!(reserve.warehouse_id(), warehouse.id_typed());
        assert_eq!(reserve.product_id(), &product_x());
    }

    #[test]
    fn reserve_more_than_available_fails_and_leaves_stock_unchanged() {
        let mut warehouse = test_warehouse();
        warehouse.add_stock(&product_x(), 3, test_time()).unwrap();
        let version = warehouse.version();

        let err = warehouse
            .reserve(&product_x(), 5, OrderId::new(), test_time())
            .unwrap_err();

        assert_eq!(err, DomainError::insufficient_stock("SKU-X", 5, 3));
        assert_eq!(warehouse.available(&product_x()), 3);
        assert_eq!(warehouse.version(), version);
    }

    #[test]
    fn reserve_without_stock_entry_is_not_found() {
        let mut warehouse = test_warehouse();
        let err = warehouse
            .reserve(&product_x(), 1, OrderId::new(), test_time())
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(msg) if msg.contains("SKU-X")));
    }

    #[test]
    fn release_returns_units_and_recreates_missing_entry() {
        let mut warehouse = test_warehouse();
        warehouse
            .release(&product_x(), 4, Some(ReserveId::new()), test_time())
            .unwrap();
        assert_eq!(warehouse.available(&product_x()), 4);
    }

    #[test]
    fn command_for_another_warehouse_is_rejected() {
        let warehouse = test_warehouse();
        let cmd = WarehouseCommand::AddStock(AddStock {
            warehouse_id: WarehouseId::new(),
            product_id: product_x(),
            quantity: 1,
            occurred_at: test_time(),
        });
        let err = warehouse.handle(&cmd).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(msg) if msg.contains("warehouse_id")));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let mut warehouse = test_warehouse();
        warehouse.add_stock(&product_x(), 5, test_time()).unwrap();
        let before = warehouse.clone();

        let cmd = WarehouseCommand::ReserveStock(ReserveStock {
            warehouse_id: warehouse.id_typed(),
            reserve_id: ReserveId::new(),
            order_id: OrderId::new(),
            product_id: product_x(),
            quantity: 2,
            occurred_at: test_time(),
        });
        let events1 = warehouse.handle(&cmd).unwrap();
        let events2 = warehouse.handle(&cmd).unwrap();

        assert_eq!(warehouse, before);
        assert_eq!(events1, events2);
    }

    #[test]
    fn recorded_events_carry_sequence_numbers_and_drain_once() {
        let mut warehouse = test_warehouse();
        warehouse.add_stock(&product_x(), 5, test_time()).unwrap();
        warehouse
            .reserve(&product_x(), 2, OrderId::new(), test_time())
            .unwrap();

        assert_eq!(warehouse.pending_events().len(), 2);
        let drained = warehouse.drain_events();
        assert_eq!(
            drained.iter().map(|r| r.sequence).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(matches!(drained[0].event, WarehouseEvent::StockAdded(_)));
        assert!(matches!(drained[1].event, WarehouseEvent::StockReserved(_)));
        assert!(warehouse.drain_events().is_empty());
    }

    #[test]
    fn failed_commands_record_nothing() {
        let mut warehouse = test_warehouse();
        let _ = warehouse.reserve(&product_x(), 1, OrderId::new(), test_time());
        assert!(warehouse.pending_events().is_empty());
        assert_eq!(warehouse.version(), 0);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: add_stock(n) then add_stock(m) leaves n + m on the shelf.
            #[test]
            fn consecutive_additions_sum(n in 1u32..1_000_000, m in 1u32..1_000_000) {
                let mut warehouse = test_warehouse();
                warehouse.add_stock(&product_x(), n, test_time()).unwrap();
                warehouse.add_stock(&product_x(), m, test_time()).unwrap();
                prop_assert_eq!(warehouse.available(&product_x()), n + m);
            }

            /// Property: a reserve either takes exactly q units or changes nothing.
            #[test]
            fn reserve_is_exact_or_a_no_op(stocked in 1u32..500, q in 1u32..1_000) {
                let mut warehouse = test_warehouse();
                warehouse.add_stock(&product_x(), stocked, test_time()).unwrap();

                match warehouse.reserve(&product_x(), q, OrderId::new(), test_time()) {
                    Ok(reserve) => {
                        prop_assert!(q <= stocked);
                        prop_assert_eq!(reserve.quantity(), q);
                        prop_assert_eq!(warehouse.available(&product_x()), stocked - q);
                    }
                    Err(err) => {
                        prop_assert!(q > stocked);
                        prop_assert_eq!(err, DomainError::insufficient_stock("SKU-X", q, stocked));
                        prop_assert_eq!(warehouse.available(&product_x()), stocked);
                    }
                }
            }
        }
    }
}
