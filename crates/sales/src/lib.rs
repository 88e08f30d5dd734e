//! Orders domain module (event-sourced).
//!
//! Orders, their items and the split reservation that draws stock for them from a
//! home warehouse and its fallbacks. Pure, deterministic domain logic (no IO, no
//! locking, no storage).

pub mod allocation;
pub mod order;

pub use allocation::{release_reserves, reserve_items};
pub use order::{
    AddItem, CompletingStarted, DeliveringStarted, Item, ItemAdded, MovingOpened, Order,
    OrderCommand, OrderEvent, OrderFinished, OrderPlaced, OrderStatus, StartCompleting,
};
