//! Data model shared by every stage of a research run

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of distinct insights kept on one memory entry
pub const MAX_INSIGHTS: usize = 10;

/// Ordered field map returned by a vendor
pub type Payload = BTreeMap<String, serde_json::Value>;

/// The four external data providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataSourceKind {
    YahooFinance,
    AlphaVantage,
    Fred,
    SecEdgar,
}

impl DataSourceKind {
    pub const ALL: [Self; 4] = [
        Self::YahooFinance,
        Self::AlphaVantage,
        Self::Fred,
        Self::SecEdgar,
    ];

    /// Human-readable provider name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::YahooFinance => "Yahoo Finance",
            Self::AlphaVantage => "Alpha Vantage",
            Self::Fred => "FRED",
            Self::SecEdgar => "SEC EDGAR",
        }
    }

    /// Identifier used in prompts and reasoning responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::YahooFinance => "yahoo_finance",
            Self::AlphaVantage => "alpha_vantage",
            Self::Fred => "fred",
            Self::SecEdgar => "sec_edgar",
        }
    }
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for DataSourceKind {
    type Err = String;

    /// Lenient parse: "Yahoo Finance", "yahoo_finance", "FRED API" and
    /// "SEC EDGAR filings" all resolve.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = compact(s);
        let kind = if key.starts_with("yahoo") {
            Self::YahooFinance
        } else if key.starts_with("alphavantage") || key == "alpha" {
            Self::AlphaVantage
        } else if key.starts_with("fred") {
            Self::Fred
        } else if key.starts_with("sec") || key.starts_with("edgar") {
            Self::SecEdgar
        } else {
            return Err(format!("unknown data source '{}'", s.trim()));
        };
        Ok(kind)
    }
}

/// Lowercase and strip everything that is not alphanumeric
fn compact(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Outcome of one vendor fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Ok,
    Unavailable,
    Error,
}

/// A single fetch result from one vendor at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSnapshot {
    pub id: Uuid,
    pub source: DataSourceKind,
    pub symbol: String,
    pub fetched_at: DateTime<Utc>,
    pub payload: Payload,
    pub status: SnapshotStatus,
    /// Failure reason when status is not `Ok`
    pub detail: Option<String>,
    pub attempts: u32,
}

impl DataSnapshot {
    fn with_status(
        source: DataSourceKind,
        symbol: impl Into<String>,
        payload: Payload,
        status: SnapshotStatus,
        detail: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            symbol: symbol.into(),
            fetched_at: Utc::now(),
            payload,
            status,
            detail,
            attempts: 1,
        }
    }

    pub fn ok(source: DataSourceKind, symbol: impl Into<String>, payload: Payload) -> Self {
        Self::with_status(source, symbol, payload, SnapshotStatus::Ok, None)
    }

    pub fn unavailable(
        source: DataSourceKind,
        symbol: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::with_status(
            source,
            symbol,
            Payload::new(),
            SnapshotStatus::Unavailable,
            Some(detail.into()),
        )
    }

    pub fn error(
        source: DataSourceKind,
        symbol: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::with_status(
            source,
            symbol,
            Payload::new(),
            SnapshotStatus::Error,
            Some(detail.into()),
        )
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == SnapshotStatus::Ok
    }
}

/// One step of a research plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub description: String,
    pub required_data_source: DataSourceKind,
}

/// Plan produced once per run by the planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub topic: String,
    pub objectives: Vec<String>,
    pub steps: Vec<PlanStep>,
    pub expected_outputs: Vec<String>,
    pub rationale: String,
    pub created_at: DateTime<Utc>,
}

impl ResearchPlan {
    /// Distinct sources referenced by the steps, in first-reference order
    pub fn required_sources(&self) -> Vec<DataSourceKind> {
        let mut sources = Vec::new();
        for step in &self.steps {
            if !sources.contains(&step.required_data_source) {
                sources.push(step.required_data_source);
            }
        }
        sources
    }

    pub fn first_objective(&self) -> Option<&str> {
        self.objectives.first().map(String::as_str)
    }
}

/// The four specialist roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentRole {
    Market,
    Fundamentals,
    EconomicContext,
    Regulatory,
}

impl AgentRole {
    pub const ALL: [Self; 4] = [
        Self::Market,
        Self::Fundamentals,
        Self::EconomicContext,
        Self::Regulatory,
    ];

    /// The data source whose snapshot this role analyses
    pub fn primary_source(&self) -> DataSourceKind {
        match self {
            Self::Market => DataSourceKind::YahooFinance,
            Self::Fundamentals => DataSourceKind::AlphaVantage,
            Self::EconomicContext => DataSourceKind::Fred,
            Self::Regulatory => DataSourceKind::SecEdgar,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Market => "Market",
            Self::Fundamentals => "Fundamentals",
            Self::EconomicContext => "EconomicContext",
            Self::Regulatory => "Regulatory",
        }
    }

    /// One-line description used by the router prompt
    pub fn description(&self) -> &'static str {
        match self {
            Self::Market => "price action, trading volume and market sentiment",
            Self::Fundamentals => "financial statements, valuation and profitability",
            Self::EconomicContext => "macroeconomic conditions, interest rates and inflation",
            Self::Regulatory => "SEC filings, disclosures and compliance events",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AgentRole {
    type Err = String;

    /// Lenient parse: "Market", "MarketDataAgent", "market", "fundamental
    /// analysis" and "economic_context" all resolve.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = compact(s);
        let role = if key.starts_with("market") {
            Self::Market
        } else if key.starts_with("fundamental") {
            Self::Fundamentals
        } else if key.starts_with("economic") || key.starts_with("macro") {
            Self::EconomicContext
        } else if key.starts_with("regulat") || key.starts_with("compliance") {
            Self::Regulatory
        } else {
            return Err(format!("unknown agent role '{}'", s.trim()));
        };
        Ok(role)
    }
}

/// Whether an analysis can be trusted downstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnalysisValidity {
    Valid,
    Invalid { reason: String },
}

/// Structured output of one specialist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAnalysis {
    pub agent_role: AgentRole,
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
    pub confidence: f64,
    pub source_snapshot_ids: BTreeSet<Uuid>,
    pub validity: AnalysisValidity,
}

impl AgentAnalysis {
    /// A valid analysis; confidence is clamped into [0, 1]
    pub fn new(
        agent_role: AgentRole,
        findings: Vec<String>,
        recommendations: Vec<String>,
        confidence: f64,
        source_snapshot_ids: BTreeSet<Uuid>,
    ) -> Self {
        Self {
            agent_role,
            findings,
            recommendations,
            confidence: clamp_unit(confidence),
            source_snapshot_ids,
            validity: AnalysisValidity::Valid,
        }
    }

    /// A flagged analysis with empty findings and zero confidence
    pub fn invalid(
        agent_role: AgentRole,
        reason: impl Into<String>,
        source_snapshot_ids: BTreeSet<Uuid>,
    ) -> Self {
        Self {
            agent_role,
            findings: Vec::new(),
            recommendations: Vec::new(),
            confidence: 0.0,
            source_snapshot_ids,
            validity: AnalysisValidity::Invalid {
                reason: reason.into(),
            },
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validity == AnalysisValidity::Valid
    }

    pub fn invalid_reason(&self) -> Option<&str> {
        match &self.validity {
            AnalysisValidity::Valid => None,
            AnalysisValidity::Invalid { reason } => Some(reason),
        }
    }

    /// A valid analysis must reference at least one `Ok` snapshot
    pub fn is_grounded_in(&self, snapshots: &[DataSnapshot]) -> bool {
        if !self.is_valid() {
            return true;
        }
        snapshots
            .iter()
            .any(|s| s.is_ok() && self.source_snapshot_ids.contains(&s.id))
    }
}

/// Assessment of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub overall_score: f64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggested_improvements: Vec<String>,
    /// Produced by the heuristic fallback instead of a reasoning call
    pub degraded: bool,
}

impl QualityAssessment {
    pub fn new(
        overall_score: f64,
        strengths: Vec<String>,
        weaknesses: Vec<String>,
        suggested_improvements: Vec<String>,
    ) -> Self {
        Self {
            overall_score: clamp_unit(overall_score),
            strengths,
            weaknesses,
            suggested_improvements,
            degraded: false,
        }
    }

    pub fn degraded(mut self) -> Self {
        self.degraded = true;
        self
    }
}

/// Cross-run learning record, immutable once appended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub run_id: Uuid,
    pub topic: String,
    pub insights: Vec<String>,
    pub quality_score: f64,
    pub created_at: DateTime<Utc>,
}

impl MemoryEntry {
    /// Builds an entry, deduplicating insights and keeping the last [`MAX_INSIGHTS`]
    pub fn new(
        run_id: Uuid,
        topic: impl Into<String>,
        insights: impl IntoIterator<Item = String>,
        quality_score: f64,
    ) -> Self {
        let mut kept: Vec<String> = Vec::new();
        for insight in insights {
            let insight = insight.trim().to_string();
            if insight.is_empty() || kept.contains(&insight) {
                continue;
            }
            kept.push(insight);
        }
        if kept.len() > MAX_INSIGHTS {
            kept.drain(..kept.len() - MAX_INSIGHTS);
        }

        Self {
            run_id,
            topic: topic.into(),
            insights: kept,
            quality_score: clamp_unit(quality_score),
            created_at: Utc::now(),
        }
    }

    /// Case-insensitive, whitespace-trimmed topic match
    pub fn matches_topic(&self, topic: &str) -> bool {
        normalize_topic(&self.topic) == normalize_topic(topic)
    }
}

/// Key used to compare topics across runs
pub fn normalize_topic(topic: &str) -> String {
    topic.trim().to_lowercase()
}

/// Clamp into [0, 1], mapping NaN to 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_lenient() {
        assert_eq!("Market".parse::<AgentRole>(), Ok(AgentRole::Market));
        assert_eq!("MarketDataAgent".parse::<AgentRole>(), Ok(AgentRole::Market));
        assert_eq!(" market ".parse::<AgentRole>(), Ok(AgentRole::Market));
        assert_eq!(
            "FundamentalAnalysisAgent".parse::<AgentRole>(),
            Ok(AgentRole::Fundamentals)
        );
        assert_eq!(
            "economic_context".parse::<AgentRole>(),
            Ok(AgentRole::EconomicContext)
        );
        assert_eq!(
            "RegulatoryAgent".parse::<AgentRole>(),
            Ok(AgentRole::Regulatory)
        );
        assert!("Astrology".parse::<AgentRole>().is_err());
    }

    #[test]
    fn test_source_parse_is_lenient() {
        assert_eq!(
            "Yahoo Finance".parse::<DataSourceKind>(),
            Ok(DataSourceKind::YahooFinance)
        );
        assert_eq!(
            "alpha_vantage".parse::<DataSourceKind>(),
            Ok(DataSourceKind::AlphaVantage)
        );
        assert_eq!("FRED API".parse::<DataSourceKind>(), Ok(DataSourceKind::Fred));
        assert_eq!(
            "SEC EDGAR filings".parse::<DataSourceKind>(),
            Ok(DataSourceKind::SecEdgar)
        );
        assert!("Bloomberg".parse::<DataSourceKind>().is_err());
    }

    #[test]
    fn test_required_sources_are_distinct_in_order() {
        let step = |source| PlanStep {
            description: "step".to_string(),
            required_data_source: source,
        };
        let plan = ResearchPlan {
            topic: "AAPL".to_string(),
            objectives: vec!["Assess outlook".to_string()],
            steps: vec![
                step(DataSourceKind::Fred),
                step(DataSourceKind::YahooFinance),
                step(DataSourceKind::Fred),
            ],
            expected_outputs: Vec::new(),
            rationale: "test".to_string(),
            created_at: Utc::now(),
        };

        assert_eq!(
            plan.required_sources(),
            vec![DataSourceKind::Fred, DataSourceKind::YahooFinance]
        );
    }

    #[test]
    fn test_invalid_analysis_is_flagged() {
        let analysis = AgentAnalysis::invalid(AgentRole::Fundamentals, "no data", BTreeSet::new());
        assert!(!analysis.is_valid());
        assert_eq!(analysis.invalid_reason(), Some("no data"));
        assert!(analysis.findings.is_empty());
        assert!(analysis.confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn test_valid_analysis_grounding() {
        let ok = DataSnapshot::ok(DataSourceKind::YahooFinance, "AAPL", Payload::new());
        let failed = DataSnapshot::error(DataSourceKind::YahooFinance, "AAPL", "boom");

        let grounded = AgentAnalysis::new(
            AgentRole::Market,
            vec!["up".to_string()],
            Vec::new(),
            1.7,
            BTreeSet::from([ok.id]),
        );
        assert!((grounded.confidence - 1.0).abs() < f64::EPSILON);
        assert!(grounded.is_grounded_in(&[ok.clone(), failed.clone()]));

        let ungrounded = AgentAnalysis::new(
            AgentRole::Market,
            vec!["up".to_string()],
            Vec::new(),
            0.5,
            BTreeSet::from([failed.id]),
        );
        assert!(!ungrounded.is_grounded_in(&[ok, failed]));
    }

    #[test]
    fn test_memory_entry_caps_and_dedupes_insights() {
        let insights = (0..15)
            .map(|i| format!("insight {}", i % 12))
            .chain(std::iter::once("  ".to_string()));
        let entry = MemoryEntry::new(Uuid::new_v4(), "AAPL", insights, 0.7);

        assert_eq!(entry.insights.len(), MAX_INSIGHTS);
        assert_eq!(entry.insights[0], "insight 2");
        assert_eq!(entry.insights[9], "insight 11");
        assert!(!entry.insights.contains(&"insight 1".to_string()));
        assert!(entry.matches_topic("  aapl "));
        assert!(!entry.matches_topic("MSFT"));
    }

    #[test]
    fn test_clamp_unit() {
        assert!((clamp_unit(f64::NAN)).abs() < f64::EPSILON);
        assert!((clamp_unit(-0.3)).abs() < f64::EPSILON);
        assert!((clamp_unit(0.42) - 0.42).abs() < f64::EPSILON);
    }
}
