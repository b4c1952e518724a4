//! Role-specialised analysers
//!
//! One [`SpecialistAgent`] per [`AgentRole`]. Each reads the snapshot of its
//! role's primary source and produces exactly one [`AgentAnalysis`]. Missing
//! data or a reasoning failure yields an analysis flagged invalid instead of
//! an error.

use std::collections::BTreeSet;
use std::sync::Arc;

use research_core::{
    catalog, reason_structured, AgentAnalysis, AgentRole, DataSnapshot, Payload, Reasoner,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::prompts;

/// 8-K filings in the recent window above which material events are flagged
const ELEVATED_8K_COUNT: u64 = 3;

/// What every specialist knows about the run
#[derive(Debug, Clone, Default)]
pub struct RoleContext {
    pub topic: String,
    pub objectives: Vec<String>,
}

impl RoleContext {
    pub fn new(topic: impl Into<String>, objectives: Vec<String>) -> Self {
        Self {
            topic: topic.into(),
            objectives,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    findings: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
    confidence: f64,
}

pub struct SpecialistAgent {
    role: AgentRole,
    reasoner: Arc<dyn Reasoner>,
    rule_based_only: bool,
}

impl SpecialistAgent {
    pub fn new(role: AgentRole, reasoner: Arc<dyn Reasoner>) -> Self {
        Self {
            role,
            reasoner,
            rule_based_only: false,
        }
    }

    /// Analyse without reasoning calls; only the Regulatory role supports it
    pub fn with_rule_based_only(mut self, enabled: bool) -> Self {
        self.rule_based_only = enabled;
        self
    }

    /// One agent per role, regulatory honouring `regulatory_rule_based`
    pub fn team(reasoner: Arc<dyn Reasoner>, regulatory_rule_based: bool) -> Vec<Self> {
        AgentRole::ALL
            .into_iter()
            .map(|role| {
                Self::new(role, reasoner.clone())
                    .with_rule_based_only(role == AgentRole::Regulatory && regulatory_rule_based)
            })
            .collect()
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn is_rule_based(&self) -> bool {
        self.rule_based_only && self.role == AgentRole::Regulatory
    }

    #[instrument(skip(self, snapshots, context), fields(role = %self.role))]
    pub async fn analyze(&self, snapshots: &[DataSnapshot], context: &RoleContext) -> AgentAnalysis {
        let source = self.role.primary_source();
        let relevant: Vec<&DataSnapshot> = snapshots.iter().filter(|s| s.source == source).collect();
        let usable: Vec<&DataSnapshot> = relevant.iter().copied().filter(|s| s.is_ok()).collect();

        if usable.is_empty() {
            let detail = relevant
                .iter()
                .filter_map(|s| s.detail.as_deref())
                .next()
                .unwrap_or("not fetched");
            let reason = format!("no usable {source} data: {detail}");
            warn!(%reason, "Specialist has no data");
            return AgentAnalysis::invalid(self.role, reason, ids(&relevant));
        }

        let analysis = if self.is_rule_based() {
            regulatory_rules(&usable)
        } else {
            self.reason(&usable, context).await
        };

        match analysis {
            Ok((findings, recommendations, confidence)) => {
                info!(findings = findings.len(), confidence, "Analysis complete");
                AgentAnalysis::new(self.role, findings, recommendations, confidence, ids(&usable))
            }
            Err(reason) => {
                warn!(%reason, "Analysis flagged invalid");
                AgentAnalysis::invalid(self.role, reason, ids(&usable))
            }
        }
    }

    async fn reason(
        &self,
        snapshots: &[&DataSnapshot],
        context: &RoleContext,
    ) -> Result<(Vec<String>, Vec<String>, f64), String> {
        let data = snapshots
            .iter()
            .map(|s| render_payload(&s.payload))
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = prompts::SPECIALIST
            .render(&json!({
                "role": self.role.name(),
                "instructions": prompts::role_instructions(self.role),
                "topic": context.topic,
                "objectives": context.objectives,
                "source": self.role.primary_source().display_name(),
                "data": data,
            }))
            .map_err(|e| e.to_string())?;

        let response: AnalysisResponse =
            reason_structured(self.reasoner.as_ref(), &prompt, &catalog::agent_analysis())
                .await
                .map_err(|e| format!("reasoning failed: {e}"))?;

        let findings = non_empty(response.findings);
        if findings.is_empty() {
            return Err("reasoning returned no findings".to_string());
        }
        Ok((findings, non_empty(response.recommendations), response.confidence))
    }
}

/// Findings read straight from the SEC EDGAR payload
fn regulatory_rules(snapshots: &[&DataSnapshot]) -> Result<(Vec<String>, Vec<String>, f64), String> {
    let mut findings = Vec::new();
    let mut recommendations = Vec::new();
    let mut confidence: f64 = 0.5;

    for snapshot in snapshots {
        let payload = &snapshot.payload;
        let text = |key: &str| payload.get(key).and_then(Value::as_str).map(str::to_string);
        let count = |key: &str| payload.get(key).and_then(Value::as_u64);

        if let Some(name) = text("company_name") {
            let cik = text("cik").unwrap_or_else(|| "unknown".to_string());
            findings.push(format!("{name} is an SEC registrant (CIK {cik})"));
        }

        match text("latest_10k_date") {
            Some(date) => {
                findings.push(format!("Most recent annual report (10-K) filed {date}"));
                confidence = 0.7;
            }
            None => recommendations.push(
                "No 10-K among recent filings; confirm annual reporting status".to_string(),
            ),
        }

        if let Some(date) = text("latest_10q_date") {
            findings.push(format!("Most recent quarterly report (10-Q) filed {date}"));
        }

        if let Some(total) = count("total_recent_filings") {
            findings.push(format!("{total} filings in the recent submission history"));
        }

        if let Some(eight_k) = count("recent_8k_count") {
            findings.push(format!("{eight_k} current reports (8-K) among recent filings"));
            if eight_k >= ELEVATED_8K_COUNT {
                recommendations
                    .push("Review recent 8-K disclosures for material events".to_string());
            }
        }
    }

    if findings.is_empty() {
        return Err("SEC payload has no recognizable filing fields".to_string());
    }
    debug!(findings = findings.len(), "Rule-based regulatory analysis");
    Ok((findings, recommendations, confidence))
}

fn ids(snapshots: &[&DataSnapshot]) -> BTreeSet<Uuid> {
    snapshots.iter().map(|s| s.id).collect()
}

fn non_empty(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn render_payload(payload: &Payload) -> String {
    payload
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| match v {
            Value::String(s) => format!("{k}: {s}"),
            other => format!("{k}: {other}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::testing::ScriptedReasoner;
    use research_core::{DataSourceKind, ReasoningError};

    fn context() -> RoleContext {
        RoleContext::new("AAPL", vec!["Assess recent price action".to_string()])
    }

    fn sec_snapshot() -> DataSnapshot {
        let payload: Payload = [
            ("company_name", json!("Apple Inc.")),
            ("cik", json!("320193")),
            ("latest_10k_date", json!("2023-11-03")),
            ("latest_10q_date", json!("2024-05-03")),
            ("total_recent_filings", json!(10)),
            ("recent_8k_count", json!(4)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        DataSnapshot::ok(DataSourceKind::SecEdgar, "AAPL", payload)
    }

    fn yahoo_snapshot() -> DataSnapshot {
        let payload: Payload = [("current_price".to_string(), json!(189.5))].into();
        DataSnapshot::ok(DataSourceKind::YahooFinance, "AAPL", payload)
    }

    #[tokio::test]
    async fn test_llm_analysis_references_ok_snapshot() {
        let reasoner = Arc::new(ScriptedReasoner::with_defaults());
        let agent = SpecialistAgent::new(AgentRole::Market, reasoner.clone());
        let snapshots = vec![yahoo_snapshot(), sec_snapshot()];

        let analysis = agent.analyze(&snapshots, &context()).await;

        assert!(analysis.is_valid());
        assert!(analysis.is_grounded_in(&snapshots));
        assert_eq!(analysis.source_snapshot_ids.len(), 1);
        assert!((analysis.confidence - 0.8).abs() < f64::EPSILON);

        let prompt = &reasoner.calls()[0].prompt;
        assert!(prompt.contains("current_price: 189.5"));
        assert!(prompt.contains("- Assess recent price action"));
        assert!(!prompt.contains("Apple Inc."));
    }

    #[tokio::test]
    async fn test_failed_source_is_invalid() {
        let reasoner = Arc::new(ScriptedReasoner::with_defaults());
        let agent = SpecialistAgent::new(AgentRole::Fundamentals, reasoner.clone());
        let snapshots = vec![
            yahoo_snapshot(),
            DataSnapshot::error(DataSourceKind::AlphaVantage, "AAPL", "Authentication failed"),
        ];

        let analysis = agent.analyze(&snapshots, &context()).await;

        assert!(!analysis.is_valid());
        assert!(analysis.findings.is_empty());
        assert!(analysis.confidence.abs() < f64::EPSILON);
        assert!(analysis.invalid_reason().unwrap().contains("Authentication failed"));
        assert_eq!(reasoner.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_reasoning_failure_is_invalid() {
        let reasoner = Arc::new(
            ScriptedReasoner::new()
                .fail(catalog::AGENT_ANALYSIS, ReasoningError::Timeout(std::time::Duration::from_secs(60)))
                .respond(catalog::AGENT_ANALYSIS, json!({ "findings": [], "confidence": 0.5 })),
        );
        let agent = SpecialistAgent::new(AgentRole::Market, reasoner.clone());

        let analysis = agent.analyze(&[yahoo_snapshot()], &context()).await;

        assert!(!analysis.is_valid());
        assert!(analysis.invalid_reason().unwrap().starts_with("reasoning failed"));
        assert_eq!(reasoner.call_count(catalog::AGENT_ANALYSIS), 2);
    }

    #[tokio::test]
    async fn test_rule_based_regulatory_makes_no_calls() {
        let reasoner = Arc::new(ScriptedReasoner::with_defaults());
        let agent =
            SpecialistAgent::new(AgentRole::Regulatory, reasoner.clone()).with_rule_based_only(true);

        let analysis = agent.analyze(&[sec_snapshot()], &context()).await;

        assert!(analysis.is_valid());
        assert_eq!(reasoner.total_calls(), 0);
        assert!(analysis.findings[0].contains("Apple Inc."));
        assert!(analysis
            .findings
            .iter()
            .any(|f| f.contains("10-K") && f.contains("2023-11-03")));
        assert_eq!(
            analysis.recommendations,
            vec!["Review recent 8-K disclosures for material events"]
        );
        assert!((analysis.confidence - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_team_flags_only_regulatory() {
        let reasoner: Arc<dyn Reasoner> = Arc::new(ScriptedReasoner::new());
        let team = SpecialistAgent::team(reasoner, true);

        assert_eq!(team.len(), 4);
        let rule_based: Vec<_> = team
            .iter()
            .filter(|a| a.is_rule_based())
            .map(SpecialistAgent::role)
            .collect();
        assert_eq!(rule_based, vec![AgentRole::Regulatory]);
    }
}
