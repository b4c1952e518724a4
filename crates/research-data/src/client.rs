//! Vendor client seam

use async_trait::async_trait;
use research_core::{DataSourceKind, Payload};

use crate::error::Result;

/// One external data provider
///
/// Clients own authentication and rate limiting; the gateway only sees
/// payloads and typed failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VendorClient: Send + Sync {
    /// Provider this client talks to
    fn source(&self) -> DataSourceKind;

    /// Fetch the provider's view of `symbol`
    async fn fetch(&self, symbol: &str) -> Result<Payload>;
}
