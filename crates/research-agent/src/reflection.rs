//! Run-level self-assessment
//!
//! Scores a finished run with one reasoning call. When that fails, a
//! heuristic assessment marked `degraded` is produced instead, so every
//! completed run carries a quality score.

use std::sync::Arc;

use research_core::{
    catalog, reason_structured, AgentAnalysis, ChainStage, MemoryEntry, QualityAssessment,
    Reasoner, ResearchPlan, WorkflowResult,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::prompts;

/// Borrowed view of the run being assessed
#[derive(Debug, Clone, Copy)]
pub struct RunSummary<'a> {
    pub topic: &'a str,
    pub plan: &'a ResearchPlan,
    pub analyses: &'a [AgentAnalysis],
    pub workflows: &'a [WorkflowResult],
}

#[derive(Debug, Deserialize)]
struct AssessmentResponse {
    overall_score: f64,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default)]
    suggested_improvements: Vec<String>,
}

pub struct ReflectionEngine {
    reasoner: Arc<dyn Reasoner>,
}

impl ReflectionEngine {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self { reasoner }
    }

    /// Assess the run; never fails
    #[instrument(skip_all, fields(topic = run.topic))]
    pub async fn assess(&self, run: RunSummary<'_>, history: &[MemoryEntry]) -> QualityAssessment {
        match self.reflect(run, history).await {
            Ok(assessment) => {
                info!(score = assessment.overall_score, "Run assessed");
                assessment
            }
            Err(reason) => {
                warn!(%reason, "Reflection failed, using heuristic assessment");
                heuristic_assessment(run, &reason)
            }
        }
    }

    async fn reflect(
        &self,
        run: RunSummary<'_>,
        history: &[MemoryEntry],
    ) -> Result<QualityAssessment, String> {
        let analyses: Vec<_> = run
            .analyses
            .iter()
            .map(|a| {
                let (status, summary) = match a.invalid_reason() {
                    None => ("valid", a.findings.join("; ")),
                    Some(reason) => ("invalid", reason.to_string()),
                };
                json!({ "role": a.agent_role.name(), "status": status, "summary": summary })
            })
            .collect();
        let workflows: Vec<_> = run
            .workflows
            .iter()
            .map(|w| json!({ "pattern": w.pattern(), "artifact": w.artifact() }))
            .collect();
        let history: Vec<String> = history
            .iter()
            .map(|e| format!("{:.2}", e.quality_score))
            .collect();

        let prompt = prompts::REFLECTION
            .render(&json!({
                "topic": run.topic,
                "objectives": run.plan.objectives,
                "analyses": analyses,
                "workflows": workflows,
                "history": history,
            }))
            .map_err(|e| e.to_string())?;

        let response: AssessmentResponse =
            reason_structured(self.reasoner.as_ref(), &prompt, &catalog::quality_assessment())
                .await
                .map_err(|e| e.to_string())?;

        Ok(QualityAssessment::new(
            response.overall_score,
            response.strengths,
            response.weaknesses,
            response.suggested_improvements,
        ))
    }
}

/// Mean of the valid-analysis share, the best evaluator score and the share
/// of chain stages completed
pub fn heuristic_assessment(run: RunSummary<'_>, reason: &str) -> QualityAssessment {
    let total = run.analyses.len();
    let valid = run.analyses.iter().filter(|a| a.is_valid()).count();
    let valid_share = if total == 0 {
        0.0
    } else {
        valid as f64 / total as f64
    };

    let best_eval = run
        .workflows
        .iter()
        .find_map(WorkflowResult::as_eval_opt)
        .map_or(0.0, |r| r.best_score);

    let chain_completion = run
        .workflows
        .iter()
        .find_map(WorkflowResult::as_chain)
        .map_or(0.0, |c| c.stages.len() as f64 / ChainStage::ORDER.len() as f64);

    let score = (valid_share + best_eval + chain_completion) / 3.0;

    let mut strengths = Vec::new();
    if valid > 0 {
        strengths.push(format!("{valid} of {total} specialist analyses completed"));
    }
    if chain_completion >= 1.0 {
        strengths.push("Prompt chain completed all stages".to_string());
    }

    let mut weaknesses = vec![format!("Reflection unavailable: {reason}")];
    let mut improvements = vec!["Re-run reflection once the reasoning service recovers".to_string()];
    for analysis in run.analyses.iter().filter(|a| !a.is_valid()) {
        weaknesses.push(format!(
            "{} analysis missing: {}",
            analysis.agent_role,
            analysis.invalid_reason().unwrap_or("invalid")
        ));
        improvements.push(format!(
            "Restore {} data access",
            analysis.agent_role.primary_source()
        ));
    }

    QualityAssessment::new(score, strengths, weaknesses, improvements).degraded()
}
