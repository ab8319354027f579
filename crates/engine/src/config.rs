//! Engine configuration loaded from environment variables.

use std::time::Duration;

use pricing::{
    DEFAULT_FLAT_SHIPPING_COST, DEFAULT_FREE_SHIPPING_THRESHOLD, Decimal, Money, PricingConfig,
};

/// Default collaborator base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";

/// Default simulated payment latency.
pub const DEFAULT_PAYMENT_DELAY: Duration = Duration::from_millis(3000);

/// Placeholder used when checkout is started without an address.
pub const DEFAULT_SHIPPING_ADDRESS: &str = "Default address";

/// Default per-request timeout against the collaborator.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Engine configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `CART_API_BASE_URL` (default: `"http://localhost:8080/api"`)
/// - `CART_FREE_SHIPPING_THRESHOLD` (default: `50000`)
/// - `CART_FLAT_SHIPPING_COST` (default: `5000`)
/// - `CART_PAYMENT_DELAY_MS` (default: `3000`)
/// - `CART_DEFAULT_SHIPPING_ADDRESS` (default: `"Default address"`)
/// - `CART_REFRESH_INTERVAL_SECS` (default: unset, no background refresh)
/// - `CART_REQUEST_TIMEOUT_SECS` (default: `10`)
///
/// Values that fail to parse fall back to the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub api_base_url: String,
    pub pricing: PricingConfig,
    pub payment_delay: Duration,
    pub default_shipping_address: String,
    pub refresh_interval: Option<Duration>,
    pub request_timeout: Duration,
}

impl EngineConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let money = |key: &str, fallback: Money| {
            lookup(key)
                .and_then(|v| v.trim().parse::<Decimal>().ok())
                .filter(|d| !d.is_sign_negative())
                .map(Money::new)
                .unwrap_or(fallback)
        };
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            api_base_url: lookup("CART_API_BASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.api_base_url),
            pricing: PricingConfig {
                free_shipping_threshold: money(
                    "CART_FREE_SHIPPING_THRESHOLD",
                    defaults.pricing.free_shipping_threshold,
                ),
                flat_shipping_cost: money(
                    "CART_FLAT_SHIPPING_COST",
                    defaults.pricing.flat_shipping_cost,
                ),
            },
            payment_delay: number("CART_PAYMENT_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.payment_delay),
            default_shipping_address: lookup("CART_DEFAULT_SHIPPING_ADDRESS")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.default_shipping_address),
            refresh_interval: number("CART_REFRESH_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            request_timeout: number("CART_REQUEST_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            pricing: PricingConfig {
                free_shipping_threshold: Money::from_units(DEFAULT_FREE_SHIPPING_THRESHOLD),
                flat_shipping_cost: Money::from_units(DEFAULT_FLAT_SHIPPING_COST),
            },
            payment_delay: DEFAULT_PAYMENT_DELAY,
            default_shipping_address: DEFAULT_SHIPPING_ADDRESS.to_string(),
            refresh_interval: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}
