//! Infrastructure layer: warehouse registry, fulfillment orchestration, config.
//!
//! The domain crates are pure and lock-free. This crate owns the shared state
//! (registered warehouses, placed orders), serializes access to it and publishes
//! every committed domain event on an [`wms_events::EventBus`].

pub mod config;
pub mod error;
pub mod fulfillment;
pub mod registry;

pub use config::FulfillmentConfig;
pub use error::{FulfillmentError, FulfillmentResult};
pub use fulfillment::FulfillmentService;
pub use registry::WarehouseRegistry;
