use serde::{Deserialize, Serialize};

use wms_core::{DomainError, DomainResult, ValueObject};

/// Postal address of a warehouse or an order destination.
///
/// Compared by value. Only `city` takes part in warehouse resolution, matched by
/// exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    city: String,
    street: String,
    building: String,
}

impl ValueObject for Address {}

impl Address {
    pub fn new(
        city: impl Into<String>,
        street: impl Into<String>,
        building: impl Into<String>,
    ) -> DomainResult<Self> {
        let city = city.into();
        if city.trim().is_empty() {
            return Err(DomainError::validation("city cannot be empty"));
        }
        Ok(Self {
            city,
            street: street.into(),
            building: building.into(),
        })
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn street(&self) -> &str {
        &self.street
    }

    pub fn building(&self) -> &str {
        &self.building
    }

    pub fn same_city(&self, other: &Address) -> bool {
        self.city == other.city
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_is_required() {
        let err = Address::new("", "Main St", "1").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn same_city_ignores_street_and_building() {
        let a = Address::new("Lviv", "Main St", "1").unwrap();
        let b = Address::new("Lviv", "Side St", "42").unwrap();
        let c = Address::new("lviv", "Main St", "1").unwrap();
        assert!(a.same_city(&b));
        assert!(!a.same_city(&c));
    }
}
