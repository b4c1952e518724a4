//! Research planning

use std::sync::Arc;

use chrono::Utc;
use research_core::{
    catalog, reason_structured, DataSourceKind, MemoryEntry, PlanStep, Reasoner, ResearchError,
    ResearchPlan, Result,
};
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tracing::{info, instrument};

use crate::prompts;

#[derive(Debug, Deserialize)]
struct PlanResponse {
    objectives: Vec<String>,
    steps: Vec<StepResponse>,
    #[serde(default)]
    expected_outputs: Vec<String>,
    rationale: String,
}

#[derive(Debug, Deserialize)]
struct StepResponse {
    description: String,
    #[serde(deserialize_with = "lenient_source")]
    data_source: DataSourceKind,
}

/// Source names like "yahoo_finance" or "SEC EDGAR"; anything else fails decoding
fn lenient_source<'de, D>(deserializer: D) -> std::result::Result<DataSourceKind, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

/// Produces the research plan with one reasoning call
///
/// A failed or schema-invalid response is retried once with a repair prompt;
/// a second failure is a planning failure, which ends the run.
pub struct Planner {
    reasoner: Arc<dyn Reasoner>,
}

impl Planner {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self { reasoner }
    }

    #[instrument(skip(self, history), fields(history = history.len()))]
    pub async fn plan(&self, topic: &str, history: &[MemoryEntry]) -> Result<ResearchPlan> {
        let history: Vec<_> = history
            .iter()
            .map(|e| json!({ "score": format!("{:.2}", e.quality_score), "insights": e.insights }))
            .collect();
        let prompt = prompts::PLAN
            .render(&json!({ "topic": topic, "history": history }))
            .map_err(|e| ResearchError::Planning(e.to_string()))?;

        let response: PlanResponse =
            reason_structured(self.reasoner.as_ref(), &prompt, &catalog::research_plan())
                .await
                .map_err(|e| ResearchError::Planning(e.to_string()))?;

        let plan = ResearchPlan {
            topic: topic.trim().to_string(),
            objectives: clean(response.objectives),
            steps: response
                .steps
                .into_iter()
                .map(|s| PlanStep {
                    description: s.description.trim().to_string(),
                    required_data_source: s.data_source,
                })
                .collect(),
            expected_outputs: clean(response.expected_outputs),
            rationale: response.rationale.trim().to_string(),
            created_at: Utc::now(),
        };

        info!(
            objectives = plan.objectives.len(),
            steps = plan.steps.len(),
            sources = plan.required_sources().len(),
            "Research plan created"
        );
        Ok(plan)
    }
}

fn clean(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
