use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use wms_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, MovingId, OrderId, ReserveId,
    ValueObject, WarehouseId,
};
use wms_events::{Event, Recorded};
use wms_inventory::{
    Address, CancelReserve, CompleteReserve, FinishMoving, MovingCommand, MovingEvent,
    ProductReserve, ReserveCommand, ReserveEvent, ReserveMoving, ReserveStatus, StartMoving,
    Warehouse,
};
use wms_products::{Product, ProductId};

use crate::allocation;

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    New,
    Completing,
    Delivering,
    Finished,
}

/// Order line: product and requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    product: Product,
    quantity: u32,
}

impl ValueObject for Item {}

impl Item {
    pub fn new(product: Product, quantity: u32) -> DomainResult<Self> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(Self { product, quantity })
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn total_price(&self) -> DomainResult<u64> {
        self.product.price_for(self.quantity).ok_or_else(|| {
            DomainError::invariant(format!("price of {} overflows", self.product.id()))
        })
    }
}

/// Aggregate root: Order.
///
/// Owns its items, the reserves drawn for them and the movings that carry completed
/// reserves to the destination. Warehouses are referenced by id only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    address: Address,
    home_warehouse: WarehouseId,
    items: Vec<Item>,
    status: OrderStatus,
    reserves: Vec<ProductReserve>,
    movings: Vec<ReserveMoving>,
    version: u64,
    pending: Vec<Recorded<OrderEvent>>,
}

impl Order {
    /// Place a new order for `address`, served first by `home_warehouse`.
    pub fn place(
        id: OrderId,
        address: Address,
        home_warehouse: WarehouseId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        let mut order = Self {
            id,
            address: address.clone(),
            home_warehouse,
            items: Vec::new(),
            status: OrderStatus::New,
            reserves: Vec::new(),
            movings: Vec::new(),
            version: 0,
            pending: Vec::new(),
        };
        let placed = OrderEvent::OrderPlaced(OrderPlaced {
            order_id: id,
            address,
            home_warehouse,
            occurred_at,
        });
        order.apply(&placed);
        order.pending.push(Recorded::new(order.version, placed));
        order
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn home_warehouse(&self) -> WarehouseId {
        self.home_warehouse
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn reserves(&self) -> &[ProductReserve] {
        &self.reserves
    }

    pub fn reserve(&self, reserve_id: ReserveId) -> Option<&ProductReserve> {
        self.reserves.iter().find(|r| r.id_typed() == reserve_id)
    }

    pub fn movings(&self) -> &[ReserveMoving] {
        &self.movings
    }

    pub fn moving(&self, moving_id: MovingId) -> Option<&ReserveMoving> {
        self.movings.iter().find(|m| m.id_typed() == moving_id)
    }

    pub fn moving_for_reserve(&self, reserve_id: ReserveId) -> Option<&ReserveMoving> {
        self.movings.iter().find(|m| m.reserve_id() == reserve_id)
    }

    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, OrderStatus::New)
    }

    pub fn all_reserves_completed(&self) -> bool {
        !self.reserves.is_empty()
            && self
                .reserves
                .iter()
                .all(|r| r.status() == ReserveStatus::Completed)
    }

    /// Sum of `price * quantity` over all items.
    pub fn total_price(&self) -> DomainResult<u64> {
        self.items.iter().try_fold(0u64, |acc, item| {
            acc.checked_add(item.total_price()?)
                .ok_or_else(|| DomainError::invariant("order total overflows"))
        })
    }

    pub fn add_item(
        &mut self,
        product: Product,
        quantity: u32,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.record(&OrderCommand::AddItem(AddItem {
            order_id: self.id,
            product,
            quantity,
            occurred_at,
        }))?;
        Ok(())
    }

    /// Reserve every item against `candidates` and move the order to `Completing`.
    ///
    /// `candidates[0]` must be the home warehouse; the rest are fallbacks in the
    /// order they should be consulted. On failure every reserve made by this call is
    /// released and the order stays `New`.
    pub fn start_completing(
        &mut self,
        candidates: &mut [&mut Warehouse],
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_can_start_completing()?;
        if let Some(first) = candidates.first() {
            if first.id_typed() != self.home_warehouse {
                return Err(DomainError::invariant(
                    "home warehouse must be the first candidate",
                ));
            }
        }

        let reserves = allocation::reserve_items(self.id, &self.items, candidates, occurred_at)?;

        let cmd = OrderCommand::StartCompleting(StartCompleting {
            order_id: self.id,
            reserves: reserves.clone(),
            occurred_at,
        });
        if let Err(err) = self.record(&cmd) {
            allocation::release_reserves(&reserves, candidates, occurred_at)?;
            return Err(err);
        }
        Ok(())
    }

    pub fn complete_reserve(
        &mut self,
        reserve_id: ReserveId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.record(&OrderCommand::Reserve(ReserveCommand::Complete(
            CompleteReserve {
                reserve_id,
                occurred_at,
            },
        )))?;
        Ok(())
    }

    /// Cancel one reserve and give its units back to `warehouse`.
    pub fn cancel_reserve(
        &mut self,
        reserve_id: ReserveId,
        warehouse: &mut Warehouse,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let cmd = OrderCommand::Reserve(ReserveCommand::Cancel(CancelReserve {
            reserve_id,
            occurred_at,
        }));
        let events = self.handle(&cmd)?;
        let reserve = self
            .reserve(reserve_id)
            .ok_or_else(|| DomainError::not_found(format!("reserve {reserve_id}")))?;
        reserve.return_stock(warehouse, occurred_at)?;
        self.commit(events);
        Ok(())
    }

    pub fn start_moving(
        &mut self,
        moving_id: MovingId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.record(&OrderCommand::Moving(MovingCommand::Start(StartMoving {
            moving_id,
            occurred_at,
        })))?;
        Ok(())
    }

    pub fn finish_moving(
        &mut self,
        moving_id: MovingId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.record(&OrderCommand::Moving(MovingCommand::Finish(FinishMoving {
            moving_id,
            occurred_at,
        })))?;
        Ok(())
    }

    /// Events applied through the convenience methods and not yet drained.
    pub fn pending_events(&self) -> &[Recorded<OrderEvent>] {
        &self.pending
    }

    /// Drain accumulated domain events.
    pub fn drain_events(&mut self) -> Vec<Recorded<OrderEvent>> {
        std::mem::take(&mut self.pending)
    }

    fn record(&mut self, command: &OrderCommand) -> DomainResult<Vec<OrderEvent>> {
        let events = self.handle(command)?;
        self.commit(events.clone());
        Ok(events)
    }

    fn commit(&mut self, events: Vec<OrderEvent>) {
        for event in events {
            self.apply(&event);
            self.pending.push(Recorded::new(self.version, event));
        }
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AddItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub order_id: OrderId,
    pub product: Product,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartCompleting.
///
/// Carries the reserves already taken from the warehouses for this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCompleting {
    pub order_id: OrderId,
    pub reserves: Vec<ProductReserve>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    AddItem(AddItem),
    StartCompleting(StartCompleting),
    /// Routed to the reserve named in the inner command.
    Reserve(ReserveCommand),
    /// Routed to the moving named in the inner command.
    Moving(MovingCommand),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub address: Address,
    pub home_warehouse: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub order_id: OrderId,
    pub product: Product,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CompletingStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletingStarted {
    pub order_id: OrderId,
    pub reserves: Vec<ProductReserve>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MovingOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovingOpened {
    pub order_id: OrderId,
    pub moving_id: MovingId,
    pub reserve_id: ReserveId,
    pub warehouse_id: WarehouseId,
    pub destination: Address,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveringStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveringStarted {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderFinished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFinished {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    ItemAdded(ItemAdded),
    CompletingStarted(CompletingStarted),
    Reserve(ReserveEvent),
    MovingOpened(MovingOpened),
    Moving(MovingEvent),
    DeliveringStarted(DeliveringStarted),
    OrderFinished(OrderFinished),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "sales.order.placed",
            OrderEvent::ItemAdded(_) => "sales.order.item_added",
            OrderEvent::CompletingStarted(_) => "sales.order.completing_started",
            OrderEvent::Reserve(e) => e.event_type(),
            OrderEvent::MovingOpened(_) => "sales.order.moving_opened",
            OrderEvent::Moving(e) => e.event_type(),
            OrderEvent::DeliveringStarted(_) => "sales.order.delivering_started",
            OrderEvent::OrderFinished(_) => "sales.order.finished",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::ItemAdded(e) => e.occurred_at,
            OrderEvent::CompletingStarted(e) => e.occurred_at,
            OrderEvent::Reserve(e) => e.occurred_at(),
            OrderEvent::MovingOpened(e) => e.occurred_at,
            OrderEvent::Moving(e) => e.occurred_at(),
            OrderEvent::DeliveringStarted(e) => e.occurred_at,
            OrderEvent::OrderFinished(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.address = e.address.clone();
                self.home_warehouse = e.home_warehouse;
                self.status = OrderStatus::New;
                self.items.clear();
                self.reserves.clear();
                self.movings.clear();
            }
            OrderEvent::ItemAdded(e) => {
                self.items.push(Item {
                    product: e.product.clone(),
                    quantity: e.quantity,
                });
            }
            OrderEvent::CompletingStarted(e) => {
                self.reserves = e.reserves.clone();
                self.status = OrderStatus::Completing;
            }
            OrderEvent::Reserve(e) => {
                let reserve_id = e.reserve_id();
                if let Some(reserve) = self.reserves.iter_mut().find(|r| r.id_typed() == reserve_id) {
                    reserve.apply(e);
                }
            }
            OrderEvent::MovingOpened(e) => {
                self.movings.push(ReserveMoving::new(
                    e.moving_id,
                    e.reserve_id,
                    e.warehouse_id,
                    e.destination.clone(),
                ));
            }
            OrderEvent::Moving(e) => {
                let moving_id = e.moving_id();
                if let Some(moving) = self.movings.iter_mut().find(|m| m.id_typed() == moving_id) {
                    moving.apply(e);
                }
            }
            OrderEvent::DeliveringStarted(_) => {
                self.status = OrderStatus::Delivering;
            }
            OrderEvent::OrderFinished(_) => {
                self.status = OrderStatus::Finished;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::AddItem(cmd) => self.handle_add_item(cmd),
            OrderCommand::StartCompleting(cmd) => self.handle_start_completing(cmd),
            OrderCommand::Reserve(cmd) => self.handle_reserve(cmd),
            OrderCommand::Moving(cmd) => self.handle_moving(cmd),
        }
    }
}

impl Order {
    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_can_start_completing(&self) -> Result<(), DomainError> {
        if self.status != OrderStatus::New {
            return Err(DomainError::invalid_transition(
                "order",
                self.status,
                "start completing",
            ));
        }
        if self.items.is_empty() {
            return Err(DomainError::validation(
                "cannot start completing an order without items",
            ));
        }
        Ok(())
    }

    fn handle_add_item(&self, cmd: &AddItem) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_order_id(cmd.order_id)?;

        if !self.is_modifiable() {
            return Err(DomainError::invalid_transition(
                "order",
                self.status,
                "add item to",
            ));
        }

        let item = Item::new(cmd.product.clone(), cmd.quantity)?;
        item.total_price()?;

        Ok(vec![OrderEvent::ItemAdded(ItemAdded {
            order_id: cmd.order_id,
            product: item.product,
            quantity: item.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_completing(
        &self,
        cmd: &StartCompleting,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_can_start_completing()?;

        for reserve in &cmd.reserves {
            if reserve.order_id() != self.id {
                return Err(DomainError::invariant(format!(
                    "reserve {} belongs to another order",
                    reserve.id_typed()
                )));
            }
            if reserve.status() != ReserveStatus::New {
                return Err(DomainError::invariant(format!(
                    "reserve {} is already {:?}",
                    reserve.id_typed(),
                    reserve.status()
                )));
            }
        }

        if quantities_by_product(self.items.iter().map(|i| (i.product.id(), i.quantity)))
            != quantities_by_product(cmd.reserves.iter().map(|r| (r.product_id(), r.quantity())))
        {
            return Err(DomainError::invariant(
                "reserves do not cover the order items exactly",
            ));
        }

        Ok(vec![OrderEvent::CompletingStarted(CompletingStarted {
            order_id: cmd.order_id,
            reserves: cmd.reserves.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &ReserveCommand) -> Result<Vec<OrderEvent>, DomainError> {
        let (reserve_id, occurred_at) = match cmd {
            ReserveCommand::Complete(c) => (c.reserve_id, c.occurred_at),
            ReserveCommand::Cancel(c) => (c.reserve_id, c.occurred_at),
        };
        let reserve = self
            .reserve(reserve_id)
            .ok_or_else(|| DomainError::not_found(format!("reserve {reserve_id}")))?;

        let mut events: Vec<OrderEvent> = reserve
            .handle(cmd)?
            .into_iter()
            .map(OrderEvent::Reserve)
            .collect();

        if let ReserveCommand::Complete(_) = cmd {
            events.push(OrderEvent::MovingOpened(MovingOpened {
                order_id: self.id,
                // One moving per reserve, so the moving reuses the reserve's UUID.
                moving_id: MovingId::from_uuid(Uuid::from(reserve_id)),
                reserve_id,
                warehouse_id: reserve.warehouse_id(),
                destination: self.address.clone(),
                occurred_at,
            }));
            events.extend(self.notify_reserve_completed(reserve_id, occurred_at));
        }

        Ok(events)
    }

    /// Delivery starts once every reserve is completed, counting `completed` as done.
    fn notify_reserve_completed(
        &self,
        completed: ReserveId,
        occurred_at: DateTime<Utc>,
    ) -> Option<OrderEvent> {
        if self.status != OrderStatus::Completing {
            return None;
        }
        let all_done = self
            .reserves
            .iter()
            .all(|r| r.id_typed() == completed || r.status() == ReserveStatus::Completed);
        all_done.then(|| {
            OrderEvent::DeliveringStarted(DeliveringStarted {
                order_id: self.id,
                occurred_at,
            })
        })
    }

    fn handle_moving(&self, cmd: &MovingCommand) -> Result<Vec<OrderEvent>, DomainError> {
        let moving_id = match cmd {
            MovingCommand::Start(c) => c.moving_id,
            MovingCommand::Finish(c) => c.moving_id,
        };
        let moving = self
            .moving(moving_id)
            .ok_or_else(|| DomainError::not_found(format!("moving {moving_id}")))?;

        let mut events: Vec<OrderEvent> = moving
            .handle(cmd)?
            .into_iter()
            .map(OrderEvent::Moving)
            .collect();

        if let MovingCommand::Finish(c) = cmd {
            let all_arrived = self.status == OrderStatus::Delivering
                && self
                    .movings
                    .iter()
                    .all(|m| m.id_typed() == moving_id || m.is_finished());
            if all_arrived {
                events.push(OrderEvent::OrderFinished(OrderFinished {
                    order_id: self.id,
                    occurred_at: c.occurred_at,
                }));
            }
        }

        Ok(events)
    }
}

fn quantities_by_product<'a>(
    lines: impl Iterator<Item = (&'a ProductId, u32)>,
) -> BTreeMap<&'a ProductId, u64> {
    let mut totals = BTreeMap::new();
    for (product_id, quantity) in lines {
        *totals.entry(product_id).or_insert(0u64) += u64::from(quantity);
    }
    totals
}
