//! Uniform, concurrent access to the vendor clients

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use research_core::{DataSnapshot, DataSourceKind};
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheKey, SnapshotCache};
use crate::client::VendorClient;
use crate::retry::FetchPolicy;

/// Fans a symbol out to the required sources, one snapshot per source
///
/// Fetch failures never propagate; they become the snapshot's status.
pub struct DataSourceGateway {
    clients: HashMap<DataSourceKind, Arc<dyn VendorClient>>,
    policy: FetchPolicy,
    cache: Option<SnapshotCache>,
}

impl DataSourceGateway {
    pub fn builder() -> DataSourceGatewayBuilder {
        DataSourceGatewayBuilder::default()
    }

    /// Sources with a registered client
    pub fn configured_sources(&self) -> Vec<DataSourceKind> {
        DataSourceKind::ALL
            .into_iter()
            .filter(|s| self.clients.contains_key(s))
            .collect()
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Fetch every distinct source concurrently; output follows `sources` order
    #[instrument(skip(self, sources), fields(sources = sources.len()))]
    pub async fn fetch_all(&self, symbol: &str, sources: &[DataSourceKind]) -> Vec<DataSnapshot> {
        let mut distinct = Vec::with_capacity(sources.len());
        for source in sources {
            if !distinct.contains(source) {
                distinct.push(*source);
            }
        }

        info!("Fetching {} source(s) for {}", distinct.len(), symbol);
        let snapshots = join_all(distinct.iter().map(|s| self.fetch_one(*s, symbol))).await;

        let ok = snapshots.iter().filter(|s| s.is_ok()).count();
        info!("Fetched {}/{} source(s) successfully", ok, snapshots.len());
        snapshots
    }

    /// Fetch a single source, mapping any failure onto the snapshot status
    pub async fn fetch_one(&self, source: DataSourceKind, symbol: &str) -> DataSnapshot {
        let Some(client) = self.clients.get(&source) else {
            warn!(%source, "No client configured");
            return DataSnapshot::unavailable(
                source,
                symbol,
                format!("no client configured for {source}"),
            )
            .with_attempts(0);
        };

        let key = CacheKey::new(source, symbol);
        if let Some(cache) = &self.cache {
            if let Some(payload) = cache.get(&key).await {
                debug!(%source, "Cache hit");
                // Served without contacting the vendor
                return DataSnapshot::ok(source, symbol, payload).with_attempts(0);
            }
        }

        let operation = format!("{}:{}", source.code(), symbol);
        let outcome = self
            .policy
            .execute(&operation, || client.fetch(symbol))
            .await;

        match outcome.result {
            Ok(payload) if payload.is_empty() => {
                warn!(%source, "Vendor returned an empty payload");
                DataSnapshot::unavailable(source, symbol, "vendor returned no fields")
                    .with_attempts(outcome.attempts)
            }
            Ok(payload) => {
                debug!(%source, fields = payload.len(), attempts = outcome.attempts, "Fetched payload");
                if let Some(cache) = &self.cache {
                    cache.insert(key, payload.clone()).await;
                }
                DataSnapshot::ok(source, symbol, payload).with_attempts(outcome.attempts)
            }
            Err(e) => {
                let status = e.snapshot_status();
                warn!(%source, ?status, error = %e, "Fetch failed");
                let snapshot = match status {
                    research_core::SnapshotStatus::Unavailable => {
                        DataSnapshot::unavailable(source, symbol, e.to_string())
                    }
                    _ => DataSnapshot::error(source, symbol, e.to_string()),
                };
                snapshot.with_attempts(outcome.attempts)
            }
        }
    }
}

/// Builder for [`DataSourceGateway`]
#[derive(Default)]
pub struct DataSourceGatewayBuilder {
    clients: HashMap<DataSourceKind, Arc<dyn VendorClient>>,
    policy: Option<FetchPolicy>,
    cache: Option<SnapshotCache>,
}

impl DataSourceGatewayBuilder {
    /// Register a client under the source it reports
    pub fn client(mut self, client: Arc<dyn VendorClient>) -> Self {
        self.clients.insert(client.source(), client);
        self
    }

    pub fn policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn cache(mut self, cache: SnapshotCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> DataSourceGateway {
        DataSourceGateway {
            clients: self.clients,
            policy: self.policy.unwrap_or_default(),
            cache: self.cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockVendorClient;
    use crate::error::DataError;
    use research_core::{Payload, SnapshotStatus};
    use serde_json::json;
    use std::time::Duration;

    fn payload() -> Payload {
        Payload::from([("value".to_string(), json!(1))])
    }

    fn mock(source: DataSourceKind) -> MockVendorClient {
        let mut client = MockVendorClient::new();
        client.expect_source().return_const(source);
        client
    }

    fn ok_client(source: DataSourceKind) -> Arc<dyn VendorClient> {
        let mut client = mock(source);
        client.expect_fetch().returning(|_| Ok(payload()));
        Arc::new(client)
    }

    #[tokio::test]
    async fn test_all_sources_ok() {
        let mut builder = DataSourceGateway::builder().policy(FetchPolicy::fast());
        for source in DataSourceKind::ALL {
            builder = builder.client(ok_client(source));
        }
        let gateway = builder.build();

        let snapshots = gateway.fetch_all("AAPL", &DataSourceKind::ALL).await;

        assert_eq!(snapshots.len(), 4);
        assert!(snapshots.iter().all(DataSnapshot::is_ok));
        let order: Vec<_> = snapshots.iter().map(|s| s.source).collect();
        assert_eq!(order, DataSourceKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let mut failing = mock(DataSourceKind::AlphaVantage);
        failing
            .expect_fetch()
            .times(1)
            .returning(|_| Err(DataError::Auth("invalid key".into())));

        let gateway = DataSourceGateway::builder()
            .policy(FetchPolicy::fast())
            .client(ok_client(DataSourceKind::YahooFinance))
            .client(Arc::new(failing))
            .build();

        let snapshots = gateway
            .fetch_all(
                "AAPL",
                &[DataSourceKind::YahooFinance, DataSourceKind::AlphaVantage],
            )
            .await;

        assert_eq!(snapshots[0].status, SnapshotStatus::Ok);
        assert_eq!(snapshots[1].status, SnapshotStatus::Error);
        assert_eq!(snapshots[1].attempts, 1);
        assert!(snapshots[1].detail.as_deref().unwrap().contains("invalid key"));
    }

    #[tokio::test]
    async fn test_transient_failure_retried_at_most_twice() {
        let mut flaky = mock(DataSourceKind::Fred);
        flaky
            .expect_fetch()
            .times(2)
            .returning(|_| Err(DataError::Network("reset".into())));

        let gateway = DataSourceGateway::builder()
            .policy(FetchPolicy::fast())
            .client(Arc::new(flaky))
            .build();

        let snapshot = gateway.fetch_one(DataSourceKind::Fred, "AAPL").await;
        assert_eq!(snapshot.status, SnapshotStatus::Error);
        assert_eq!(snapshot.attempts, 2);
    }

    #[tokio::test]
    async fn test_unavailable_mapping() {
        let mut limited = mock(DataSourceKind::AlphaVantage);
        limited.expect_fetch().returning(|_| {
            Err(DataError::RateLimited {
                provider: "Alpha Vantage".into(),
            })
        });
        let gateway = DataSourceGateway::builder()
            .policy(FetchPolicy::fast())
            .client(Arc::new(limited))
            .build();

        let snapshot = gateway.fetch_one(DataSourceKind::AlphaVantage, "AAPL").await;
        assert_eq!(snapshot.status, SnapshotStatus::Unavailable);

        let missing = gateway.fetch_one(DataSourceKind::SecEdgar, "AAPL").await;
        assert_eq!(missing.status, SnapshotStatus::Unavailable);
        assert_eq!(missing.attempts, 0);
    }

    #[tokio::test]
    async fn test_duplicate_sources_fetched_once() {
        let mut client = mock(DataSourceKind::YahooFinance);
        client.expect_fetch().times(1).returning(|_| Ok(payload()));
        let gateway = DataSourceGateway::builder()
            .policy(FetchPolicy::fast())
            .client(Arc::new(client))
            .build();

        let snapshots = gateway
            .fetch_all(
                "AAPL",
                &[DataSourceKind::YahooFinance, DataSourceKind::YahooFinance],
            )
            .await;
        assert_eq!(snapshots.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_serves_second_fetch() {
        let mut client = mock(DataSourceKind::YahooFinance);
        client.expect_fetch().times(1).returning(|_| Ok(payload()));
        let gateway = DataSourceGateway::builder()
            .policy(FetchPolicy::fast())
            .cache(SnapshotCache::new(Duration::from_secs(60)))
            .client(Arc::new(client))
            .build();

        let first = gateway.fetch_one(DataSourceKind::YahooFinance, "AAPL").await;
        let second = gateway.fetch_one(DataSourceKind::YahooFinance, "aapl").await;

        assert_eq!(first.attempts, 1);
        assert!(second.is_ok());
        assert_eq!(second.attempts, 0);
        assert_eq!(second.payload, first.payload);
        assert_ne!(second.id, first.id);
    }

    #[tokio::test]
    async fn test_empty_payload_is_unavailable() {
        let mut client = mock(DataSourceKind::Fred);
        client.expect_fetch().returning(|_| Ok(Payload::new()));
        let gateway = DataSourceGateway::builder().client(Arc::new(client)).build();

        let snapshot = gateway.fetch_one(DataSourceKind::Fred, "AAPL").await;
        assert_eq!(snapshot.status, SnapshotStatus::Unavailable);
    }
}
