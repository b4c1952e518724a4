//! SEC EDGAR API client for company filings
//!
//! Rate limit: 10 requests per second (as per SEC fair access policy)
//! User-Agent requirement: Must include company name and contact email

use async_trait::async_trait;
use reqwest::Client;
use research_core::{DataSourceKind, Payload};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use super::{per_second, SharedRateLimiter};
use crate::client::VendorClient;
use crate::error::{status_error, DataError, Result};

const SEC_BASE_URL: &str = "https://data.sec.gov";
const SEC_COMPANY_TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";
const DEFAULT_USER_AGENT: &str = "research-orchestrator (research@example.com)";

/// Recent filings kept in the payload
const RECENT_FILINGS_LIMIT: usize = 10;

/// SEC submissions response
#[derive(Debug, Clone, Deserialize)]
pub struct CompanySubmissions {
    pub cik: String,
    pub name: String,
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub exchanges: Vec<String>,
    pub filings: FilingsData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilingsData {
    pub recent: RecentFilings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFilings {
    pub accession_number: Vec<String>,
    pub filing_date: Vec<String>,
    pub form: Vec<String>,
    #[serde(default)]
    pub primary_doc_description: Vec<Option<String>>,
}

/// SEC EDGAR API client
#[derive(Debug, Clone)]
pub struct SecEdgarClient {
    client: Client,
    user_agent: String,
    rate_limiter: SharedRateLimiter,
}

impl SecEdgarClient {
    /// Create a new SEC EDGAR client
    ///
    /// # Example
    /// ```ignore
    /// let client = SecEdgarClient::new("MyApp (contact@example.com)");
    /// ```
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            user_agent: user_agent.into(),
            // SEC allows 10 requests per second
            rate_limiter: per_second(10),
        }
    }

    /// Create from SEC_USER_AGENT, falling back to a generic agent string
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("SEC_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
        )
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(DataSourceKind::SecEdgar, response.status()));
        }

        Ok(response.json().await?)
    }

    /// Get CIK number from stock ticker
    pub async fn get_cik(&self, ticker: &str) -> Result<String> {
        let data = self.get_json(SEC_COMPANY_TICKERS_URL).await?;
        find_cik(&data, ticker).ok_or_else(|| DataError::unavailable(ticker, "ticker not found in EDGAR"))
    }

    /// Get company submissions (filing history)
    pub async fn get_company_submissions(&self, cik: &str) -> Result<CompanySubmissions> {
        // Pad CIK to 10 digits
        let cik_padded = format!("{:0>10}", cik.trim_start_matches('0'));
        let url = format!("{SEC_BASE_URL}/submissions/CIK{cik_padded}.json");

        let data = self.get_json(&url).await?;
        Ok(serde_json::from_value(data)?)
    }
}

#[async_trait]
impl VendorClient for SecEdgarClient {
    fn source(&self) -> DataSourceKind {
        DataSourceKind::SecEdgar
    }

    #[instrument(skip(self), fields(source = "sec_edgar"))]
    async fn fetch(&self, symbol: &str) -> Result<Payload> {
        if self.user_agent.trim().is_empty() {
            return Err(DataError::MissingApiKey("SEC_USER_AGENT".to_string()));
        }

        let cik = self.get_cik(symbol).await?;
        let submissions = self.get_company_submissions(&cik).await?;
        Ok(summarize_filings(&submissions))
    }
}

/// Search the company ticker list; `cik_str` is numeric in the live feed
fn find_cik(data: &Value, ticker: &str) -> Option<String> {
    let ticker_upper = ticker.to_uppercase();
    data.as_object()?
        .values()
        .find(|company| {
            company
                .get("ticker")
                .and_then(Value::as_str)
                .is_some_and(|t| t.to_uppercase() == ticker_upper)
        })
        .and_then(|company| company.get("cik_str"))
        .and_then(|cik| match cik {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) => Some(s.clone()),
            _ => None,
        })
}

/// Filing counts, latest periodic report dates and recent filings
pub fn summarize_filings(submissions: &CompanySubmissions) -> Payload {
    let recent = &submissions.filings.recent;
    let count = recent.form.len().min(recent.filing_date.len());

    let latest = |form: &str| {
        (0..count)
            .find(|&i| recent.form[i] == form)
            .map(|i| recent.filing_date[i].clone())
    };
    let recent_window = count.min(RECENT_FILINGS_LIMIT * 2);
    let form_8k_count = (0..recent_window).filter(|&i| recent.form[i] == "8-K").count();

    let recent_filings: Vec<Value> = (0..count.min(RECENT_FILINGS_LIMIT))
        .map(|i| {
            json!({
                "form": recent.form[i],
                "filing_date": recent.filing_date[i],
                "description": recent.primary_doc_description.get(i).cloned().flatten(),
            })
        })
        .collect();

    let mut payload = Payload::new();
    payload.insert("company_name".into(), json!(submissions.name));
    payload.insert("cik".into(), json!(submissions.cik));
    payload.insert("exchanges".into(), json!(submissions.exchanges));
    payload.insert("total_recent_filings".into(), json!(count));
    payload.insert("latest_10k_date".into(), json!(latest("10-K")));
    payload.insert("latest_10q_date".into(), json!(latest("10-Q")));
    payload.insert("recent_8k_count".into(), json!(form_8k_count));
    payload.insert("recent_filings".into(), Value::Array(recent_filings));
    payload
}
