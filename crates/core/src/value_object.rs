//! Value object trait: equality by value, not identity.
//!
//! Value objects are domain objects that have **no identity** - they are defined entirely
//! by their attribute values. Two value objects with the same values are considered equal.

/// Marker trait for value objects.
///
/// - **Value Object**: no identity (`Address`, `Product`, `Item`)
/// - **Entity**: has identity (`ProductReserve`, `ReserveMoving`)
///
/// Value objects are immutable; to "modify" one, build a new one. The trait
/// requires `Clone + PartialEq + Debug` so values can be copied into events and
/// compared in tests.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Address { city: String, street: String, building: String }
///
/// impl ValueObject for Address {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
