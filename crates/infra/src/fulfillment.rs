//! Order fulfillment orchestration.
//!
//! `FulfillmentService` is the only place that touches shared state. Each operation:
//!
//! ```text
//! 1. Look up the order / warehouse handles (registry and order map read locks)
//!   ↓
//! 2. Lock the order, then the warehouses it needs in registry order
//!   ↓
//! 3. Run the pure domain transition (stock and order mutate together or not at all)
//!   ↓
//! 4. Drain recorded events and publish them as JSON envelopes
//! ```
//!
//! Locks are always taken order first, then warehouses in registry order, so two
//! operations can never wait on each other in a cycle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use wms_core::{DomainError, MovingId, OrderId, ReserveId, WarehouseId};
use wms_events::{Event, EventBus, EventEnvelope, Recorded};
use wms_inventory::{Address, Warehouse};
use wms_products::{Product, ProductId};
use wms_sales::Order;

use crate::config::FulfillmentConfig;
use crate::error::{FulfillmentError, FulfillmentResult};
use crate::registry::{WarehouseHandle, WarehouseRegistry};

pub const WAREHOUSE_AGGREGATE: &str = "inventory.warehouse";
pub const ORDER_AGGREGATE: &str = "sales.order";

type OrderHandle = Arc<Mutex<Order>>;

/// Drives orders through reservation and delivery against a shared registry.
#[derive(Debug)]
pub struct FulfillmentService<B> {
    registry: Arc<WarehouseRegistry>,
    orders: RwLock<HashMap<OrderId, OrderHandle>>,
    bus: B,
    config: FulfillmentConfig,
}

impl<B> FulfillmentService<B> {
    pub fn new(registry: Arc<WarehouseRegistry>, bus: B, config: FulfillmentConfig) -> Self {
        Self {
            registry,
            orders: RwLock::new(HashMap::new()),
            bus,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<WarehouseRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &FulfillmentConfig {
        &self.config
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<B> FulfillmentService<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Register a warehouse, publishing any stock events it already carries.
    ///
    /// Pending events are drained only once the warehouse is registered.
    pub fn register_warehouse(&self, warehouse: Warehouse) -> FulfillmentResult<WarehouseId> {
        let id = self.registry.register(warehouse)?;
        tracing::info!(warehouse_id = %id, "warehouse registered");

        let handle = self.registry.get(id)?;
        let mut warehouse = lock_warehouse(&handle)?;
        self.publish_warehouse(&mut warehouse).map(|()| id)
    }

    pub fn add_stock(
        &self,
        warehouse_id: WarehouseId,
        product_id: &ProductId,
        quantity: u32,
    ) -> FulfillmentResult<()> {
        let handle = self.registry.get(warehouse_id)?;
        let mut warehouse = lock_warehouse(&handle)?;
        warehouse.add_stock(product_id, quantity, Utc::now())?;
        tracing::debug!(
            warehouse_id = %warehouse_id,
            product = %product_id,
            quantity,
            "stock added"
        );
        self.publish_warehouse(&mut warehouse)
    }

    /// Units of `product_id` on the shelf at `warehouse_id`; zero if never stocked.
    pub fn stock_of(
        &self,
        warehouse_id: WarehouseId,
        product_id: &ProductId,
    ) -> FulfillmentResult<u32> {
        let handle = self.registry.get(warehouse_id)?;
        let warehouse = lock_warehouse(&handle)?;
        Ok(warehouse.available(product_id))
    }

    /// Place an order for `address`; its home warehouse is the first in that city.
    pub fn place_order(&self, address: Address) -> FulfillmentResult<OrderId> {
        let home = self.registry.find_by_city(&address)?;
        let mut order = Order::place(OrderId::new(), address, home, Utc::now());
        let order_id = order.id_typed();
        let events = order.drain_events();

        self.orders
            .write()
            .map_err(|_| FulfillmentError::LockPoisoned("orders"))?
            .insert(order_id, Arc::new(Mutex::new(order)));

        tracing::info!(order_id = %order_id, home_warehouse = %home, "order placed");
        self.publish(order_id.into(), ORDER_AGGREGATE, events)
            .map(|()| order_id)
    }

    pub fn add_item(
        &self,
        order_id: OrderId,
        product: Product,
        quantity: u32,
    ) -> FulfillmentResult<()> {
        self.with_order(order_id, |order| {
            order.add_item(product, quantity, Utc::now())?;
            Ok(())
        })
    }

    /// Reserve every item of the order, home warehouse first, then fallbacks in
    /// registry order (bounded by the config). All or nothing.
    pub fn start_completing(&self, order_id: OrderId) -> FulfillmentResult<()> {
        let handle = self.order_handle(order_id)?;
        let mut order = lock_order(&handle)?;
        let home = order.home_warehouse();

        let candidates = self
            .registry
            .candidates(home, self.config.fallback_limit())?;
        let mut guards = candidates
            .iter()
            .map(|(_, handle)| lock_warehouse(handle))
            .collect::<FulfillmentResult<Vec<_>>>()?;

        let mut warehouses: Vec<&mut Warehouse> = guards.iter_mut().map(|g| &mut **g).collect();
        let home_idx = warehouses
            .iter()
            .position(|w| w.id_typed() == home)
            .ok_or_else(|| DomainError::not_found(format!("warehouse {home}")))?;
        let home_ref = warehouses.remove(home_idx);
        warehouses.insert(0, home_ref);

        tracing::debug!(
            order_id = %order_id,
            candidates = warehouses.len(),
            "reserving order items"
        );
        let outcome = order.start_completing(&mut warehouses, Utc::now());

        // A failed attempt still records its reservations and their rollback. A
        // publication failure never hides the domain outcome.
        let mut published = Ok(());
        for warehouse in warehouses.iter_mut() {
            published = published.and(self.publish_warehouse(warehouse));
        }

        match outcome {
            Ok(()) => {
                for reserve in order.reserves() {
                    tracing::debug!(
                        order_id = %order_id,
                        reserve_id = %reserve.id_typed(),
                        warehouse_id = %reserve.warehouse_id(),
                        product = %reserve.product_id(),
                        quantity = reserve.quantity(),
                        "reserved"
                    );
                }
                tracing::info!(
                    order_id = %order_id,
                    reserves = order.reserves().len(),
                    "order completing"
                );
                let order_published = self.publish_order(&mut order);
                published.and(order_published)
            }
            Err(err) => {
                tracing::warn!(order_id = %order_id, error = %err, "reservation rolled back");
                Err(err.into())
            }
        }
    }

    pub fn complete_reserve(&self, order_id: OrderId, reserve_id: ReserveId) -> FulfillmentResult<()> {
        self.with_order(order_id, |order| {
            order.complete_reserve(reserve_id, Utc::now())?;
            tracing::info!(
                order_id = %order_id,
                reserve_id = %reserve_id,
                status = ?order.status(),
                "reserve completed"
            );
            Ok(())
        })
    }

    /// Cancel a reserve and give its units back to the warehouse it came from.
    pub fn cancel_reserve(&self, order_id: OrderId, reserve_id: ReserveId) -> FulfillmentResult<()> {
        let handle = self.order_handle(order_id)?;
        let mut order = lock_order(&handle)?;
        let warehouse_id = order
            .reserve(reserve_id)
            .map(|r| r.warehouse_id())
            .ok_or_else(|| DomainError::not_found(format!("reserve {reserve_id}")))?;

        let warehouse_handle = self.registry.get(warehouse_id)?;
        let mut warehouse = lock_warehouse(&warehouse_handle)?;
        order.cancel_reserve(reserve_id, &mut warehouse, Utc::now())?;
        tracing::info!(
            order_id = %order_id,
            reserve_id = %reserve_id,
            warehouse_id = %warehouse_id,
            "reserve canceled"
        );

        let published = self.publish_warehouse(&mut warehouse);
        let order_published = self.publish_order(&mut order);
        published.and(order_published)
    }

    pub fn start_moving(&self, order_id: OrderId, moving_id: MovingId) -> FulfillmentResult<()> {
        self.with_order(order_id, |order| {
            order.start_moving(moving_id, Utc::now())?;
            tracing::info!(order_id = %order_id, moving_id = %moving_id, "moving started");
            Ok(())
        })
    }

    pub fn finish_moving(&self, order_id: OrderId, moving_id: MovingId) -> FulfillmentResult<()> {
        self.with_order(order_id, |order| {
            order.finish_moving(moving_id, Utc::now())?;
            tracing::info!(
                order_id = %order_id,
                moving_id = %moving_id,
                status = ?order.status(),
                "moving finished"
            );
            Ok(())
        })
    }

    /// Snapshot of the order's current state.
    pub fn order(&self, order_id: OrderId) -> FulfillmentResult<Order> {
        let handle = self.order_handle(order_id)?;
        let order = lock_order(&handle)?;
        Ok(order.clone())
    }

    pub fn total_price(&self, order_id: OrderId) -> FulfillmentResult<u64> {
        let handle = self.order_handle(order_id)?;
        let order = lock_order(&handle)?;
        Ok(order.total_price()?)
    }

    /// Run `f` under the order lock, then publish whatever it recorded.
    fn with_order(
        &self,
        order_id: OrderId,
        f: impl FnOnce(&mut Order) -> FulfillmentResult<()>,
    ) -> FulfillmentResult<()> {
        let handle = self.order_handle(order_id)?;
        let mut order = lock_order(&handle)?;
        f(&mut *order)?;
        self.publish_order(&mut order)
    }

    fn order_handle(&self, order_id: OrderId) -> FulfillmentResult<OrderHandle> {
        self.orders
            .read()
            .map_err(|_| FulfillmentError::LockPoisoned("orders"))?
            .get(&order_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("order {order_id}")).into())
    }

    fn publish_warehouse(&self, warehouse: &mut Warehouse) -> FulfillmentResult<()> {
        let events = warehouse.drain_events();
        self.publish(warehouse.id_typed().into(), WAREHOUSE_AGGREGATE, events)
    }

    fn publish_order(&self, order: &mut Order) -> FulfillmentResult<()> {
        let events = order.drain_events();
        self.publish(order.id_typed().into(), ORDER_AGGREGATE, events)
    }

    fn publish<E>(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &'static str,
        events: Vec<Recorded<E>>,
    ) -> FulfillmentResult<()>
    where
        E: Event + Serialize,
    {
        for recorded in &events {
            let envelope = EventEnvelope::from_recorded(aggregate_id, aggregate_type, recorded)?;
            self.bus
                .publish(envelope)
                .map_err(|e| FulfillmentError::Publish(format!("{e:?}")))?;
        }
        Ok(())
    }
}

fn lock_order(handle: &OrderHandle) -> FulfillmentResult<MutexGuard<'_, Order>> {
    handle
        .lock()
        .map_err(|_| FulfillmentError::LockPoisoned("order"))
}

fn lock_warehouse(handle: &WarehouseHandle) -> FulfillmentResult<MutexGuard<'_, Warehouse>> {
    handle
        .lock()
        .map_err(|_| FulfillmentError::LockPoisoned("warehouse"))
}
