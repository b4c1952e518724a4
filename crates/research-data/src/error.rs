//! Error types for vendor data access

use std::time::Duration;

use research_core::{DataSourceKind, ResearchError, SnapshotStatus};
use thiserror::Error;

/// Vendor fetch errors
#[derive(Debug, Error, Clone)]
pub enum DataError {
    /// Network or HTTP transport error
    #[error("Network error: {0}")]
    Network(String),

    /// Attempt exceeded its deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Vendor rejected the credentials
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Response body could not be decoded
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Vendor returned an error payload
    #[error("API error: {0}")]
    Api(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimited { provider: String },

    /// Credential not configured
    #[error("Missing API key: {0}")]
    MissingApiKey(String),
}

/// Result type alias for vendor operations
pub type Result<T> = std::result::Result<T, DataError>;

impl DataError {
    /// Only transport failures are worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    /// Snapshot status this failure maps to
    pub fn snapshot_status(&self) -> SnapshotStatus {
        match self {
            Self::DataUnavailable { .. } | Self::RateLimited { .. } | Self::MissingApiKey(_) => {
                SnapshotStatus::Unavailable
            }
            Self::Network(_) | Self::Timeout(_) | Self::Auth(_) | Self::Parse(_) | Self::Api(_) => {
                SnapshotStatus::Error
            }
        }
    }

    pub fn unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    pub fn into_research_error(self, provider: DataSourceKind) -> ResearchError {
        ResearchError::DataFetch {
            provider,
            reason: self.to_string(),
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Parse(err.to_string());
        }
        match err.status().map(|s| s.as_u16()) {
            Some(401 | 403) => Self::Auth(err.to_string()),
            Some(429) => Self::RateLimited {
                provider: err
                    .url()
                    .and_then(|u| u.host_str())
                    .unwrap_or("vendor")
                    .to_string(),
            },
            _ => Self::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Map a non-success HTTP status to an error
pub(crate) fn status_error(provider: DataSourceKind, status: reqwest::StatusCode) -> DataError {
    match status.as_u16() {
        401 | 403 => DataError::Auth(format!("{provider} returned {status}")),
        404 => DataError::Api(format!("{provider} returned {status}")),
        429 => DataError::RateLimited {
            provider: provider.display_name().to_string(),
        },
        500..=599 => DataError::Network(format!("{provider} returned {status}")),
        _ => DataError::Api(format!("{provider} returned {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DataError::unavailable("AAPL", "No data found");
        assert_eq!(err.to_string(), "Data not available for AAPL: No data found");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            DataError::Network("reset".into()).snapshot_status(),
            SnapshotStatus::Error
        );
        assert_eq!(
            DataError::Auth("bad key".into()).snapshot_status(),
            SnapshotStatus::Error
        );
        assert_eq!(
            DataError::Parse("eof".into()).snapshot_status(),
            SnapshotStatus::Error
        );
        assert_eq!(
            DataError::MissingApiKey("FRED_API_KEY".into()).snapshot_status(),
            SnapshotStatus::Unavailable
        );
        assert_eq!(
            DataError::RateLimited {
                provider: "Alpha Vantage".into()
            }
            .snapshot_status(),
            SnapshotStatus::Unavailable
        );
    }

    #[test]
    fn test_only_transport_errors_are_transient() {
        assert!(DataError::Network("reset".into()).is_transient());
        assert!(DataError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!DataError::Auth("x".into()).is_transient());
        assert!(!DataError::unavailable("AAPL", "none").is_transient());
    }

    #[test]
    fn test_http_status_errors() {
        let provider = DataSourceKind::AlphaVantage;
        assert!(matches!(
            status_error(provider, reqwest::StatusCode::UNAUTHORIZED),
            DataError::Auth(_)
        ));
        assert!(matches!(
            status_error(provider, reqwest::StatusCode::TOO_MANY_REQUESTS),
            DataError::RateLimited { .. }
        ));
        assert!(status_error(provider, reqwest::StatusCode::BAD_GATEWAY).is_transient());
    }

    #[test]
    fn test_into_research_error() {
        let err = DataError::Timeout(Duration::from_secs(2)).into_research_error(DataSourceKind::Fred);
        assert_eq!(err.kind(), "data_fetch_failure");
    }
}
