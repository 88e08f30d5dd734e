//! Inventory domain module.
//!
//! Warehouses, the stock they hold, the reserves drawn against that stock and the
//! movings that carry completed reserves to their destination. Pure, deterministic
//! domain logic (no IO, no locking, no storage).

pub mod address;
pub mod moving;
pub mod reserve;
pub mod stock;
pub mod warehouse;

pub use address::Address;
pub use moving::{
    FinishMoving, MovingCommand, MovingEvent, MovingFinished, MovingStarted, MovingStatus,
    ReserveMoving, StartMoving,
};
pub use reserve::{
    CancelReserve, CompleteReserve, ProductReserve, ReserveCanceled, ReserveCommand,
    ReserveCompleted, ReserveEvent, ReserveStatus,
};
pub use stock::ProductStock;
pub use warehouse::{
    AddStock, ReleaseStock, ReserveStock, StockAdded, StockReleased, StockReserved, Warehouse,
    WarehouseCommand, WarehouseEvent,
};
