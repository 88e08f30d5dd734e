//! Registry of warehouses.
//!
//! Owns every registered [`Warehouse`] behind its own `Mutex`. The list itself sits
//! behind an `RwLock`: registration takes the write lock, lookups take the read lock
//! and hand out `Arc` handles so no registry lock is held while a warehouse is.

use std::sync::{Arc, Mutex, RwLock};

use wms_core::{DomainError, WarehouseId};
use wms_inventory::{Address, Warehouse};

use crate::error::{FulfillmentError, FulfillmentResult};

/// Shared, lockable handle to one registered warehouse.
pub type WarehouseHandle = Arc<Mutex<Warehouse>>;

#[derive(Debug)]
struct Entry {
    id: WarehouseId,
    // Warehouse id and address never change, so lookups skip the warehouse lock.
    address: Address,
    handle: WarehouseHandle,
}

/// Warehouses in registration order.
#[derive(Debug, Default)]
pub struct WarehouseRegistry {
    entries: RwLock<Vec<Entry>>,
}

impl WarehouseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `warehouse` and return its id.
    ///
    /// Several warehouses may share a city; lookups return the first registered.
    pub fn register(&self, warehouse: Warehouse) -> FulfillmentResult<WarehouseId> {
        let id = warehouse.id_typed();
        let address = warehouse.address().clone();

        let mut entries = self.write()?;
        if entries.iter().any(|e| e.id == id) {
            return Err(DomainError::invariant(format!("warehouse {id} already registered")).into());
        }
        entries.push(Entry {
            id,
            address,
            handle: Arc::new(Mutex::new(warehouse)),
        });
        Ok(id)
    }

    /// First registered warehouse in `address`'s city (exact match).
    pub fn find_by_city(&self, address: &Address) -> FulfillmentResult<WarehouseId> {
        self.read()?
            .iter()
            .find(|e| e.address.same_city(address))
            .map(|e| e.id)
            .ok_or_else(|| {
                DomainError::not_found(format!("warehouse in city {}", address.city())).into()
            })
    }

    pub fn get(&self, id: WarehouseId) -> FulfillmentResult<WarehouseHandle> {
        self.read()?
            .iter()
            .find(|e| e.id == id)
            .map(|e| Arc::clone(&e.handle))
            .ok_or_else(|| DomainError::not_found(format!("warehouse {id}")).into())
    }

    /// `home` plus up to `fallback_limit` other warehouses (`None` = all), in
    /// registry order. Callers lock the handles in the returned order.
    pub fn candidates(
        &self,
        home: WarehouseId,
        fallback_limit: Option<usize>,
    ) -> FulfillmentResult<Vec<(WarehouseId, WarehouseHandle)>> {
        let entries = self.read()?;
        if !entries.iter().any(|e| e.id == home) {
            return Err(DomainError::not_found(format!("warehouse {home}")).into());
        }

        let mut fallbacks = 0usize;
        let mut picked = Vec::new();
        for entry in entries.iter() {
            if entry.id != home {
                if fallback_limit.is_some_and(|limit| fallbacks >= limit) {
                    continue;
                }
                fallbacks += 1;
            }
            picked.push((entry.id, Arc::clone(&entry.handle)));
        }
        Ok(picked)
    }

    pub fn len(&self) -> usize {
        self.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every warehouse. Outstanding handles stay valid.
    pub fn clear(&self) -> FulfillmentResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn read(&self) -> FulfillmentResult<std::sync::RwLockReadGuard<'_, Vec<Entry>>> {
        self.entries
            .read()
            .map_err(|_| FulfillmentError::LockPoisoned("warehouse registry"))
    }

    fn write(&self) -> FulfillmentResult<std::sync::RwLockWriteGuard<'_, Vec<Entry>>> {
        self.entries
            .write()
            .map_err(|_| FulfillmentError::LockPoisoned("warehouse registry"))
    }
}
