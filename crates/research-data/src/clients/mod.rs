//! Concrete vendor clients

pub mod alpha_vantage;
pub mod fred;
pub mod sec_edgar;
pub mod yahoo;

pub use alpha_vantage::AlphaVantageClient;
pub use fred::FredClient;
pub use sec_edgar::SecEdgarClient;
pub use yahoo::YahooFinanceClient;

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde_json::Value;

pub(crate) type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

pub(crate) fn per_minute(limit: u32) -> SharedRateLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

pub(crate) fn per_second(limit: u32) -> SharedRateLimiter {
    let quota = Quota::per_second(NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Vendor strings like "123.45", "None" or "-" to JSON values
pub(crate) fn vendor_value(raw: &str) -> Value {
    let raw = raw.trim();
    if raw.is_empty() || matches!(raw, "None" | "-" | "." | "N/A") {
        return Value::Null;
    }
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number),
        _ => Value::String(raw.to_string()),
    }
}
