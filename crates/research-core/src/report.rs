//! Aggregate root of one research run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{AgentAnalysis, DataSnapshot, MemoryEntry, QualityAssessment, ResearchPlan};
use crate::workflow::{ChainResult, EvalOptResult, RoutingResult, WorkflowResult};

/// Completed research run
///
/// Assembled by the orchestrator once every stage has finished; callers only
/// ever see the frozen report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub run_id: Uuid,
    pub topic: String,
    pub plan: ResearchPlan,
    pub snapshots: Vec<DataSnapshot>,
    pub analyses: Vec<AgentAnalysis>,
    pub workflows: Vec<WorkflowResult>,
    pub quality: QualityAssessment,
    pub memory_entry: MemoryEntry,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ResearchReport {
    /// Headline metric of the run
    pub fn overall_quality_score(&self) -> f64 {
        self.quality.overall_score
    }

    pub fn valid_analyses(&self) -> impl Iterator<Item = &AgentAnalysis> {
        self.analyses.iter().filter(|a| a.is_valid())
    }

    pub fn chain(&self) -> Option<&ChainResult> {
        self.workflows.iter().find_map(WorkflowResult::as_chain)
    }

    pub fn routing(&self) -> Option<&RoutingResult> {
        self.workflows.iter().find_map(WorkflowResult::as_routing)
    }

    pub fn evaluation(&self) -> Option<&EvalOptResult> {
        self.workflows.iter().find_map(WorkflowResult::as_eval_opt)
    }

    /// Final research text: the evaluator's artifact, else the chain summary
    pub fn final_artifact(&self) -> &str {
        self.evaluation()
            .map(|r| r.artifact.as_str())
            .or_else(|| self.chain().map(|r| r.artifact.as_str()))
            .unwrap_or_default()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}
