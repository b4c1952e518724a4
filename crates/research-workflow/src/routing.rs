//! Single-choice routing to a specialist

use std::sync::Arc;
use std::time::Instant;

use research_core::{
    catalog, elapsed_ms, reason_structured, AgentAnalysis, AgentRole, PromptTemplate, Reasoner,
    RoutingResult,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

const ROUTE_PROMPT: PromptTemplate = PromptTemplate::new(
    "route",
    "Select exactly one specialist to answer the research query below.\n\n\
     Query: {{ query }}\n\n\
     Available specialists:\n\
     {% for role in roles %}- {{ role.name }}: {{ role.description }}\n{% endfor %}\n\
     Answer with the specialist name and a one-sentence justification.",
);

#[derive(Debug, Deserialize)]
struct Route {
    role: String,
    rationale: String,
}

/// Role used when the router's answer cannot be honoured
pub fn default_role(available: &[AgentRole]) -> AgentRole {
    if available.is_empty() || available.contains(&AgentRole::Market) {
        AgentRole::Market
    } else {
        available[0]
    }
}

/// Routes a free-text query to one specialist
///
/// Never fails: an unknown or unavailable role, or a reasoning failure,
/// falls back to [`default_role`] and records the anomaly.
pub struct RoutingWorkflow {
    reasoner: Arc<dyn Reasoner>,
}

impl RoutingWorkflow {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self { reasoner }
    }

    /// Select a role from `available`, returning `(role, rationale, anomaly)`
    #[instrument(skip(self, available))]
    pub async fn route(
        &self,
        query: &str,
        available: &[AgentRole],
    ) -> (AgentRole, String, Option<String>) {
        let available: Vec<AgentRole> = if available.is_empty() {
            AgentRole::ALL.to_vec()
        } else {
            available.to_vec()
        };
        let fallback = default_role(&available);

        let roles: Vec<_> = available
            .iter()
            .map(|r| json!({ "name": r.name(), "description": r.description() }))
            .collect();
        let prompt = match ROUTE_PROMPT.render(&json!({ "query": query, "roles": roles })) {
            Ok(prompt) => prompt,
            Err(e) => return anomaly(fallback, format!("route prompt failed: {e}")),
        };

        let route: Route =
            match reason_structured(self.reasoner.as_ref(), &prompt, &catalog::route()).await {
                Ok(route) => route,
                Err(e) => return anomaly(fallback, format!("routing call failed: {e}")),
            };

        match route.role.parse::<AgentRole>() {
            Ok(role) if available.contains(&role) => {
                info!(%role, "Query routed");
                (role, route.rationale.trim().to_string(), None)
            }
            Ok(role) => anomaly(fallback, format!("router chose unavailable role {role}")),
            Err(e) => anomaly(fallback, format!("router returned {e}")),
        }
    }

    /// Route `query` over the run's analyses; the artifact is the selected
    /// specialist's findings
    pub async fn run(&self, query: &str, analyses: &[AgentAnalysis]) -> RoutingResult {
        let started = Instant::now();
        let mut available: Vec<AgentRole> = analyses
            .iter()
            .filter(|a| a.is_valid())
            .map(|a| a.agent_role)
            .collect();
        if available.is_empty() {
            available = analyses.iter().map(|a| a.agent_role).collect();
        }

        let (selected_role, rationale, anomaly) = self.route(query, &available).await;

        let artifact = match analyses.iter().find(|a| a.agent_role == selected_role) {
            Some(analysis) if analysis.is_valid() => analysis.findings.join("\n"),
            Some(analysis) => format!(
                "No findings from {selected_role}: {}",
                analysis.invalid_reason().unwrap_or("analysis invalid")
            ),
            None => format!("No analysis available from {selected_role}"),
        };

        RoutingResult {
            query: query.to_string(),
            selected_role,
            rationale,
            anomaly,
            artifact,
            elapsed_ms: elapsed_ms(started),
        }
    }
}

fn anomaly(fallback: AgentRole, reason: String) -> (AgentRole, String, Option<String>) {
    warn!(%fallback, %reason, "Routing anomaly, using default role");
    (fallback, format!("defaulted to {fallback}"), Some(reason))
}
