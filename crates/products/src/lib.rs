//! Product catalog values.
//!
//! Products are immutable catalog entries. They carry no lifecycle of their own;
//! warehouses stock them and orders request them.

pub mod product;

pub use product::{Product, ProductId};
