//! Federal Reserve Economic Data (FRED) API client
//!
//! FRED is a database maintained by the Federal Reserve Bank of St. Louis.
//! The research payload is the latest observation of a handful of headline
//! series; the requested symbol only labels the snapshot.
//!
//! API Key: Free registration at https://fred.stlouisfed.org/docs/api/api_key.html
//! Rate Limit: 120 requests per minute

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use research_core::{DataSourceKind, Payload};
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, warn};

use super::{per_minute, vendor_value, SharedRateLimiter};
use crate::client::VendorClient;
use crate::error::{status_error, DataError, Result};

const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// Common FRED series IDs for economic indicators
pub mod series {
    /// Federal Funds Effective Rate
    pub const FED_FUNDS_RATE: &str = "FEDFUNDS";
    /// 10-Year Treasury Constant Maturity Rate
    pub const TREASURY_10Y: &str = "DGS10";
    /// 2-Year Treasury Constant Maturity Rate
    pub const TREASURY_2Y: &str = "DGS2";
    /// 10Y-2Y Treasury Spread (Yield Curve)
    pub const YIELD_SPREAD_10Y_2Y: &str = "T10Y2Y";
    /// Unemployment Rate
    pub const UNEMPLOYMENT_RATE: &str = "UNRATE";
    /// Consumer Price Index (All Urban)
    pub const CPI: &str = "CPIAUCSL";
    /// GDP Growth Rate (Quarterly)
    pub const GDP_GROWTH: &str = "A191RL1Q225SBEA";
}

/// Series fetched for every snapshot, with payload names
const HEADLINE_SERIES: &[(&str, &str)] = &[
    (series::FED_FUNDS_RATE, "fed_funds_rate"),
    (series::TREASURY_10Y, "treasury_10y"),
    (series::TREASURY_2Y, "treasury_2y"),
    (series::YIELD_SPREAD_10Y_2Y, "yield_spread_10y_2y"),
    (series::UNEMPLOYMENT_RATE, "unemployment_rate"),
    (series::CPI, "cpi"),
    (series::GDP_GROWTH, "gdp_growth"),
];

/// Observation data from FRED series
#[derive(Debug, Clone, Deserialize)]
pub struct Observation {
    /// Date of observation (YYYY-MM-DD)
    pub date: String,
    /// Value ("." for missing data)
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

/// FRED API client
#[derive(Debug, Clone)]
pub struct FredClient {
    client: Client,
    api_key: String,
    rate_limiter: SharedRateLimiter,
}

impl FredClient {
    /// Create a new FRED client
    ///
    /// # Arguments
    /// * `api_key` - FRED API key; an empty key makes every fetch unavailable
    /// * `rate_limit` - Requests per minute (default 120)
    pub fn new(api_key: impl Into<String>, rate_limit: Option<u32>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            rate_limiter: per_minute(rate_limit.unwrap_or(120)),
        }
    }

    /// Create from environment variable FRED_API_KEY
    pub fn from_env() -> Self {
        Self::new(std::env::var("FRED_API_KEY").unwrap_or_default(), None)
    }

    /// Most recent observation of a series
    pub async fn get_latest(&self, series_id: &str) -> Result<Option<Observation>> {
        self.rate_limiter.until_ready().await;

        let mut params: HashMap<&str, &str> = HashMap::new();
        params.insert("series_id", series_id);
        params.insert("api_key", &self.api_key);
        params.insert("file_type", "json");
        params.insert("sort_order", "desc");
        params.insert("limit", "1");

        let url = format!("{FRED_BASE_URL}/series/observations");
        let response = self.client.get(&url).query(&params).send().await?;

        if !response.status().is_success() {
            return Err(status_error(DataSourceKind::Fred, response.status()));
        }

        let data: ObservationsResponse = response.json().await?;
        Ok(data.observations.into_iter().next())
    }
}

#[async_trait]
impl VendorClient for FredClient {
    fn source(&self) -> DataSourceKind {
        DataSourceKind::Fred
    }

    #[instrument(skip(self), fields(source = "fred"))]
    async fn fetch(&self, symbol: &str) -> Result<Payload> {
        if self.api_key.trim().is_empty() {
            return Err(DataError::MissingApiKey("FRED_API_KEY".to_string()));
        }

        let mut observations = Vec::new();
        let mut last_error = None;
        for (series_id, name) in HEADLINE_SERIES {
            match self.get_latest(series_id).await {
                Ok(Some(obs)) => observations.push((*name, obs)),
                Ok(None) => {}
                // Transport failures abort so the gateway can retry the whole fetch
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => {
                    warn!("Failed to get {} from FRED: {}", series_id, e);
                    last_error = Some(e);
                }
            }
        }

        build_payload(symbol, &observations, last_error)
    }
}

/// Flatten observations into `<name>` and `<name>_date` fields
fn build_payload(
    symbol: &str,
    observations: &[(&str, Observation)],
    last_error: Option<DataError>,
) -> Result<Payload> {
    let mut payload = Payload::new();
    for (name, obs) in observations {
        let value = vendor_value(&obs.value);
        if value.is_null() {
            continue;
        }
        payload.insert((*name).to_string(), value);
        payload.insert(format!("{name}_date"), json!(obs.date));
    }

    if payload.is_empty() {
        return Err(last_error
            .unwrap_or_else(|| DataError::unavailable(symbol, "no FRED observations returned")));
    }
    Ok(payload)
}
