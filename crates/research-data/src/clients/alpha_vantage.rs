//! Alpha Vantage API client (company overview fundamentals)

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use research_core::{DataSourceKind, Payload};
use serde_json::Value;
use tracing::instrument;

use super::{per_minute, vendor_value, SharedRateLimiter};
use crate::client::VendorClient;
use crate::error::{status_error, DataError, Result};

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// OVERVIEW fields kept in the payload, with their snake_case names
const OVERVIEW_FIELDS: &[(&str, &str)] = &[
    ("Name", "company_name"),
    ("Sector", "sector"),
    ("Industry", "industry"),
    ("Currency", "currency"),
    ("MarketCapitalization", "market_cap"),
    ("PERatio", "pe_ratio"),
    ("ForwardPE", "forward_pe"),
    ("PEGRatio", "peg_ratio"),
    ("EPS", "eps"),
    ("BookValue", "book_value"),
    ("DividendYield", "dividend_yield"),
    ("ProfitMargin", "profit_margin"),
    ("OperatingMarginTTM", "operating_margin"),
    ("ReturnOnEquityTTM", "return_on_equity"),
    ("RevenueTTM", "revenue"),
    ("EBITDA", "ebitda"),
    ("QuarterlyRevenueGrowthYOY", "revenue_growth"),
    ("QuarterlyEarningsGrowthYOY", "earnings_growth"),
    ("Beta", "beta"),
    ("52WeekHigh", "week_52_high"),
    ("52WeekLow", "week_52_low"),
    ("AnalystTargetPrice", "analyst_target_price"),
];

/// Alpha Vantage API client
#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
    rate_limiter: SharedRateLimiter,
}

impl AlphaVantageClient {
    /// Create a new Alpha Vantage client with API key and rate limit
    ///
    /// # Arguments
    /// * `api_key` - Alpha Vantage API key; an empty key makes every fetch unavailable
    /// * `rate_limit` - Maximum requests per minute (5 for free tier)
    pub fn new(api_key: impl Into<String>, rate_limit: u32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            rate_limiter: per_minute(rate_limit),
        }
    }

    /// Create from environment variable ALPHA_VANTAGE_API_KEY with the free tier limit
    pub fn from_env() -> Self {
        Self::new(std::env::var("ALPHA_VANTAGE_API_KEY").unwrap_or_default(), 5)
    }

    /// Get the company overview
    pub async fn get_overview(&self, symbol: &str) -> Result<Value> {
        if self.api_key.trim().is_empty() {
            return Err(DataError::MissingApiKey("ALPHA_VANTAGE_API_KEY".to_string()));
        }

        // Wait for rate limiter
        self.rate_limiter.until_ready().await;

        let mut params = HashMap::new();
        params.insert("function", "OVERVIEW");
        params.insert("symbol", symbol);
        params.insert("apikey", &self.api_key);

        let response = self.client.get(BASE_URL).query(&params).send().await?;

        if !response.status().is_success() {
            return Err(status_error(DataSourceKind::AlphaVantage, response.status()));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl VendorClient for AlphaVantageClient {
    fn source(&self) -> DataSourceKind {
        DataSourceKind::AlphaVantage
    }

    #[instrument(skip(self), fields(source = "alpha_vantage"))]
    async fn fetch(&self, symbol: &str) -> Result<Payload> {
        let data = self.get_overview(symbol).await?;
        parse_overview(symbol, &data)
    }
}

/// Turn an OVERVIEW response into a payload, mapping vendor error bodies
pub fn parse_overview(symbol: &str, data: &Value) -> Result<Payload> {
    let object = data
        .as_object()
        .ok_or_else(|| DataError::Parse("overview is not a JSON object".to_string()))?;

    // Check for API error messages
    if let Some(error) = object.get("Error Message") {
        return Err(DataError::unavailable(symbol, error.to_string()));
    }
    if object.contains_key("Note") || object.contains_key("Information") {
        return Err(DataError::RateLimited {
            provider: DataSourceKind::AlphaVantage.display_name().to_string(),
        });
    }
    if object.is_empty() || !object.contains_key("Symbol") {
        return Err(DataError::unavailable(symbol, "no overview for symbol"));
    }

    let mut payload = Payload::new();
    payload.insert("symbol".into(), Value::String(symbol.to_string()));
    for (vendor_key, key) in OVERVIEW_FIELDS {
        if let Some(raw) = object.get(*vendor_key).and_then(Value::as_str) {
            payload.insert((*key).to_string(), vendor_value(raw));
        }
    }
    Ok(payload)
}
