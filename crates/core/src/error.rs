//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures. Lock poisoning,
/// publication failures and other infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Not enough stock to satisfy a reservation (at one warehouse or across all
    /// candidate warehouses).
    #[error("insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: u32,
        available: u32,
    },

    /// A requested resource was not found (warehouse, stock entry, order, reserve...).
    #[error("not found: {0}")]
    NotFound(String),

    /// The entity is in a state that does not allow the requested action.
    #[error("invalid state transition: cannot {action} {entity} in state {from}")]
    InvalidStateTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },

    /// A value failed validation (e.g. zero quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn insufficient_stock(product: impl Into<String>, requested: u32, available: u32) -> Self {
        Self::InsufficientStock {
            product: product.into(),
            requested,
            available,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_transition(
        entity: &'static str,
        from: impl core::fmt::Debug,
        action: &'static str,
    ) -> Self {
        Self::InvalidStateTransition {
            entity,
            from: format!("{from:?}"),
            action,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}
