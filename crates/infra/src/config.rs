//! Fulfillment configuration.

use serde::Deserialize;

/// How far `start_completing` may reach beyond the home warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FulfillmentConfig {
    /// When false only the home warehouse is consulted.
    pub allow_fallback: bool,
    /// Caps the number of fallback warehouses (registry order). `None` means all.
    pub max_fallback_warehouses: Option<usize>,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            allow_fallback: true,
            max_fallback_warehouses: None,
        }
    }
}

impl FulfillmentConfig {
    pub const ALLOW_FALLBACK_VAR: &'static str = "WMS_ALLOW_FALLBACK";
    pub const MAX_FALLBACK_VAR: &'static str = "WMS_MAX_FALLBACK";

    /// Home warehouse only.
    pub fn home_only() -> Self {
        Self {
            allow_fallback: false,
            max_fallback_warehouses: None,
        }
    }

    /// Read `WMS_ALLOW_FALLBACK` and `WMS_MAX_FALLBACK`, keeping defaults for
    /// unset or unparsable values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(Self::ALLOW_FALLBACK_VAR) {
            config.allow_fallback = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    tracing::warn!(
                        var = Self::ALLOW_FALLBACK_VAR,
                        value = other,
                        "unrecognized boolean; keeping default"
                    );
                    config.allow_fallback
                }
            };
        }

        if let Some(raw) = lookup(Self::MAX_FALLBACK_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(max) => config.max_fallback_warehouses = Some(max),
                Err(err) => tracing::warn!(
                    var = Self::MAX_FALLBACK_VAR,
                    value = %raw,
                    error = %err,
                    "invalid fallback limit; keeping default"
                ),
            }
        }

        config
    }

    /// Number of fallback warehouses allowed, `None` for unlimited.
    pub fn fallback_limit(&self) -> Option<usize> {
        if !self.allow_fallback {
            return Some(0);
        }
        self.max_fallback_warehouses
    }
}
