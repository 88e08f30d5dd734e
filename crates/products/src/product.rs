use serde::{Deserialize, Serialize};

use wms_core::{DomainError, DomainResult, ValueObject};

/// Product identifier: the SKU.
///
/// Products are identified by value. Two `Product`s with the same SKU refer to the
/// same catalog entry wherever stock or order lines are matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(sku: impl Into<String>) -> DomainResult<Self> {
        let sku = sku.into();
        if sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        Ok(Self(sku))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    /// Price in smallest currency unit (e.g., cents).
    price: u64,
}

impl ValueObject for Product {}

impl Product {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, price: u64) -> DomainResult<Self> {
        let id = ProductId::new(sku)?;
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(Self { id, name, price })
    }

    pub fn id(&self) -> &ProductId {
        &self.id
    }

    pub fn sku(&self) -> &str {
        self.id.as_str()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    /// Price of `quantity` units; `None` on overflow.
    pub fn price_for(&self, quantity: u32) -> Option<u64> {
        self.price.checked_mul(u64::from(quantity))
    }
}
