//! Yahoo Finance API client

use async_trait::async_trait;
use chrono::DateTime;
use research_core::{DataSourceKind, Payload};
use serde_json::json;
use tracing::instrument;
use yahoo_finance_api as yahoo;

use crate::client::VendorClient;
use crate::error::{DataError, Result};

/// Daily bars over this range feed the price summary
const HISTORY_RANGE: &str = "1mo";

/// One daily bar
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Yahoo Finance API client
#[derive(Debug, Clone, Default)]
pub struct YahooFinanceClient {}

impl YahooFinanceClient {
    /// Create a new Yahoo Finance client
    pub fn new() -> Self {
        Self {}
    }

    /// Daily bars for the last month
    pub async fn get_daily_bars(&self, symbol: &str) -> Result<Vec<Bar>> {
        let provider = yahoo::YahooConnector::new().map_err(|e| classify(symbol, &e))?;

        let response = provider
            .get_quote_range(symbol, "1d", HISTORY_RANGE)
            .await
            .map_err(|e| classify(symbol, &e))?;

        let quotes = response.quotes().map_err(|e| classify(symbol, &e))?;

        Ok(quotes
            .iter()
            .map(|q| Bar {
                timestamp: q.timestamp as i64,
                open: q.open,
                high: q.high,
                low: q.low,
                close: q.close,
                volume: q.volume,
            })
            .collect())
    }
}

#[async_trait]
impl VendorClient for YahooFinanceClient {
    fn source(&self) -> DataSourceKind {
        DataSourceKind::YahooFinance
    }

    #[instrument(skip(self), fields(source = "yahoo_finance"))]
    async fn fetch(&self, symbol: &str) -> Result<Payload> {
        let bars = self.get_daily_bars(symbol).await?;
        summarize_bars(symbol, &bars)
    }
}

/// Yahoo errors only surface as strings across crate versions
fn classify(symbol: &str, err: &yahoo::YahooError) -> DataError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains("empty data") || lower.contains("no quotes") || lower.contains("no result") {
        DataError::unavailable(symbol, message)
    } else if lower.contains("too many requests") || lower.contains("429") {
        DataError::RateLimited {
            provider: DataSourceKind::YahooFinance.display_name().to_string(),
        }
    } else if lower.contains("deserializ") || lower.contains("invalid json") {
        DataError::Parse(message)
    } else {
        DataError::Network(message)
    }
}

/// Latest session plus range statistics
pub fn summarize_bars(symbol: &str, bars: &[Bar]) -> Result<Payload> {
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return Err(DataError::unavailable(symbol, "no price history returned"));
    };

    let previous_close = bars.len().checked_sub(2).map(|i| bars[i].close);
    let period_high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let period_low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let average_volume = bars.iter().map(|b| b.volume).sum::<u64>() / bars.len() as u64;
    let price_change = last.close - first.close;
    let price_change_percent = if first.close.abs() > f64::EPSILON {
        Some(price_change * 100.0 / first.close)
    } else {
        None
    };

    let mut payload = Payload::new();
    payload.insert("symbol".into(), json!(symbol));
    payload.insert(
        "as_of".into(),
        json!(DateTime::from_timestamp(last.timestamp, 0).map(|d| d.date_naive().to_string())),
    );
    payload.insert("current_price".into(), json!(last.close));
    payload.insert("previous_close".into(), json!(previous_close));
    payload.insert("open_price".into(), json!(last.open));
    payload.insert("day_high".into(), json!(last.high));
    payload.insert("day_low".into(), json!(last.low));
    payload.insert("volume".into(), json!(last.volume));
    payload.insert("period".into(), json!(HISTORY_RANGE));
    payload.insert("data_points".into(), json!(bars.len()));
    payload.insert("period_high".into(), json!(period_high));
    payload.insert("period_low".into(), json!(period_low));
    payload.insert("average_volume".into(), json!(average_volume));
    payload.insert("price_change".into(), json!(price_change));
    payload.insert("price_change_percent".into(), json!(price_change_percent));
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn bar(timestamp: i64, close: f64, volume: u64) -> Bar {
        Bar {
            timestamp,
            open: close - 1.0,
            high: close + 2.0,
            low: close - 2.0,
            close,
            volume,
        }
    }

    #[test]
    fn test_summarize_bars() {
        let bars = vec![
            bar(1_700_000_000, 100.0, 1_000),
            bar(1_700_086_400, 105.0, 2_000),
            bar(1_700_172_800, 110.0, 3_000),
        ];
        let payload = summarize_bars("AAPL", &bars).unwrap();

        assert_eq!(payload["current_price"], 110.0);
        assert_eq!(payload["previous_close"], 105.0);
        assert_eq!(payload["period_high"], 112.0);
        assert_eq!(payload["period_low"], 98.0);
        assert_eq!(payload["average_volume"], 2_000);
        assert_eq!(payload["price_change_percent"], 10.0);
        assert_eq!(payload["as_of"], "2023-11-16");
    }

    #[test]
    fn test_single_bar_has_no_previous_close() {
        let payload = summarize_bars("AAPL", &[bar(1_700_000_000, 50.0, 10)]).unwrap();
        assert_eq!(payload["previous_close"], Value::Null);
    }

    #[test]
    fn test_empty_history_is_unavailable() {
        let err = summarize_bars("ZZZZ", &[]).unwrap_err();
        assert!(matches!(err, DataError::DataUnavailable { .. }));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_live() {
        let payload = YahooFinanceClient::new().fetch("AAPL").await.unwrap();
        assert!(payload["current_price"].as_f64().unwrap() > 0.0);
    }
}
