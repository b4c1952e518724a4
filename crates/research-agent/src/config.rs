//! Configuration for research runs

use std::path::PathBuf;
use std::time::Duration;

use research_core::{ResearchError, Result};
use research_data::{FetchPolicy, MAX_FETCH_ATTEMPTS};
use research_utils::env_opt;
use research_workflow::{DEFAULT_MAX_ITERATIONS, DEFAULT_QUALITY_THRESHOLD};
use serde::{Deserialize, Serialize};

/// Configuration for a research orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Chat model used for every reasoning call
    pub model: String,

    /// Max tokens per reasoning call
    pub max_tokens: usize,

    /// Sampling temperature
    pub temperature: f32,

    /// Deadline for a single reasoning call
    pub reasoning_timeout: Duration,

    /// Deadline for a single vendor fetch attempt
    pub fetch_timeout: Duration,

    /// Attempts per vendor fetch (1 or 2)
    pub fetch_attempts: u32,

    /// Backoff before the retry of a transient fetch failure
    pub retry_backoff_base: Duration,

    /// Lifetime of cached vendor payloads
    pub cache_ttl: Duration,

    /// Evaluator acceptance threshold
    pub quality_threshold: f64,

    /// Evaluator iterations
    pub max_iterations: u32,

    /// Regulatory specialist reads SEC filings without reasoning calls
    pub regulatory_rule_based: bool,

    /// JSON-lines memory log; in-memory only when unset
    pub memory_path: Option<PathBuf>,

    /// OpenAI-compatible API base (OPENAI_API_BASE)
    pub openai_api_base: Option<String>,

    /// Alpha Vantage API key (optional)
    pub alpha_vantage_api_key: Option<String>,

    /// FRED API key (optional)
    pub fred_api_key: Option<String>,

    /// User-Agent sent to SEC EDGAR
    pub sec_user_agent: Option<String>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 2000,
            temperature: 0.7,
            reasoning_timeout: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(15),
            fetch_attempts: MAX_FETCH_ATTEMPTS,
            retry_backoff_base: Duration::from_millis(500),
            cache_ttl: Duration::from_secs(300), // 5 minutes
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            regulatory_rule_based: true,
            memory_path: None,
            openai_api_base: None,
            alpha_vantage_api_key: None,
            fred_api_key: None,
            sec_user_agent: None,
        }
    }
}

impl ResearchConfig {
    /// Create a new configuration builder
    pub fn builder() -> ResearchConfigBuilder {
        ResearchConfigBuilder::default()
    }

    /// Defaults overridden by every supported environment variable
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env_all_keys().build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ResearchError::Config("model must not be empty".to_string()));
        }

        if self.max_tokens == 0 {
            return Err(ResearchError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ResearchError::Config(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if !(1..=MAX_FETCH_ATTEMPTS).contains(&self.fetch_attempts) {
            return Err(ResearchError::Config(format!(
                "fetch_attempts must be between 1 and {MAX_FETCH_ATTEMPTS}"
            )));
        }

        if self.reasoning_timeout.is_zero() || self.fetch_timeout.is_zero() {
            return Err(ResearchError::Config(
                "timeouts must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.quality_threshold) {
            return Err(ResearchError::Config(
                "quality_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.max_iterations == 0 {
            return Err(ResearchError::Config(
                "max_iterations must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Fetch policy for the data source gateway
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy::new(self.fetch_attempts, self.retry_backoff_base, self.fetch_timeout)
    }
}

/// Builder for ResearchConfig
#[derive(Debug, Default)]
pub struct ResearchConfigBuilder {
    model: Option<String>,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
    reasoning_timeout: Option<Duration>,
    fetch_timeout: Option<Duration>,
    fetch_attempts: Option<u32>,
    retry_backoff_base: Option<Duration>,
    cache_ttl: Option<Duration>,
    quality_threshold: Option<f64>,
    max_iterations: Option<u32>,
    regulatory_rule_based: Option<bool>,
    memory_path: Option<PathBuf>,
    openai_api_base: Option<String>,
    alpha_vantage_api_key: Option<String>,
    fred_api_key: Option<String>,
    sec_user_agent: Option<String>,
}

impl ResearchConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn reasoning_timeout(mut self, duration: Duration) -> Self {
        self.reasoning_timeout = Some(duration);
        self
    }

    pub fn fetch_timeout(mut self, duration: Duration) -> Self {
        self.fetch_timeout = Some(duration);
        self
    }

    pub fn fetch_attempts(mut self, attempts: u32) -> Self {
        self.fetch_attempts = Some(attempts);
        self
    }

    pub fn retry_backoff_base(mut self, duration: Duration) -> Self {
        self.retry_backoff_base = Some(duration);
        self
    }

    pub fn cache_ttl(mut self, duration: Duration) -> Self {
        self.cache_ttl = Some(duration);
        self
    }

    pub fn quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = Some(threshold);
        self
    }

    pub fn max_iterations(mut self, iterations: u32) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    /// Let the regulatory specialist use reasoning calls (`false`) or read
    /// filings directly (`true`, the default)
    pub fn regulatory_rule_based(mut self, enabled: bool) -> Self {
        self.regulatory_rule_based = Some(enabled);
        self
    }

    pub fn memory_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.memory_path = Some(path.into());
        self
    }

    pub fn openai_api_base(mut self, base: impl Into<String>) -> Self {
        self.openai_api_base = Some(base.into());
        self
    }

    pub fn alpha_vantage_api_key(mut self, key: impl Into<String>) -> Self {
        self.alpha_vantage_api_key = Some(key.into());
        self
    }

    pub fn fred_api_key(mut self, key: impl Into<String>) -> Self {
        self.fred_api_key = Some(key.into());
        self
    }

    pub fn sec_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.sec_user_agent = Some(user_agent.into());
        self
    }

    /// Load model, endpoint, vendor keys and memory path from the environment
    ///
    /// Only variables that are set override the builder.
    pub fn with_env_all_keys(mut self) -> Self {
        if let Some(model) = env_opt("OPENAI_MODEL") {
            self.model = Some(model);
        }
        if let Some(base) = env_opt("OPENAI_API_BASE") {
            self.openai_api_base = Some(base);
        }
        if let Some(key) = env_opt("ALPHA_VANTAGE_API_KEY") {
            self.alpha_vantage_api_key = Some(key);
        }
        if let Some(key) = env_opt("FRED_API_KEY") {
            self.fred_api_key = Some(key);
        }
        if let Some(agent) = env_opt("SEC_USER_AGENT") {
            self.sec_user_agent = Some(agent);
        }
        if let Some(path) = env_opt("RESEARCH_MEMORY_PATH") {
            self.memory_path = Some(PathBuf::from(path));
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ResearchConfig> {
        let defaults = ResearchConfig::default();

        let config = ResearchConfig {
            model: self.model.unwrap_or(defaults.model),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            reasoning_timeout: self.reasoning_timeout.unwrap_or(defaults.reasoning_timeout),
            fetch_timeout: self.fetch_timeout.unwrap_or(defaults.fetch_timeout),
            fetch_attempts: self.fetch_attempts.unwrap_or(defaults.fetch_attempts),
            retry_backoff_base: self.retry_backoff_base.unwrap_or(defaults.retry_backoff_base),
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            quality_threshold: self.quality_threshold.unwrap_or(defaults.quality_threshold),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            regulatory_rule_based: self
                .regulatory_rule_based
                .unwrap_or(defaults.regulatory_rule_based),
            memory_path: self.memory_path,
            openai_api_base: self.openai_api_base,
            alpha_vantage_api_key: self.alpha_vantage_api_key,
            fred_api_key: self.fred_api_key,
            sec_user_agent: self.sec_user_agent,
        };

        config.validate()?;
        Ok(config)
    }
}
