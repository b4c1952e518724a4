//! Vendor data access for the research orchestrator
//!
//! Four vendor clients (Yahoo Finance, Alpha Vantage, FRED, SEC EDGAR) sit
//! behind the [`VendorClient`] seam. The [`DataSourceGateway`] fans a symbol
//! out to the sources a plan requires, applies the bounded [`FetchPolicy`]
//! and turns every outcome into a [`research_core::DataSnapshot`].

pub mod cache;
pub mod client;
pub mod clients;
pub mod error;
pub mod gateway;
pub mod retry;

pub use cache::{CacheKey, SnapshotCache, DEFAULT_SNAPSHOT_TTL};
pub use client::VendorClient;
pub use clients::{AlphaVantageClient, FredClient, SecEdgarClient, YahooFinanceClient};
pub use error::{DataError, Result};
pub use gateway::{DataSourceGateway, DataSourceGatewayBuilder};
pub use retry::{FetchOutcome, FetchPolicy, MAX_FETCH_ATTEMPTS};
