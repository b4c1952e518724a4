//! Workflow result types for the three orchestration patterns

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::model::AgentRole;

/// Stages of the prompt chain, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStage {
    Ingest,
    Preprocess,
    Classify,
    Extract,
    Summarize,
}

impl ChainStage {
    pub const ORDER: [Self; 5] = [
        Self::Ingest,
        Self::Preprocess,
        Self::Classify,
        Self::Extract,
        Self::Summarize,
    ];

    /// 1-based position in the chain
    pub fn position(&self) -> usize {
        match self {
            Self::Ingest => 1,
            Self::Preprocess => 2,
            Self::Classify => 3,
            Self::Extract => 4,
            Self::Summarize => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Preprocess => "preprocess",
            Self::Classify => "classify",
            Self::Extract => "extract",
            Self::Summarize => "summarize",
        }
    }
}

/// Output of one completed chain stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    pub stage: ChainStage,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainResult {
    /// Outputs of every stage that completed, in order
    pub stages: Vec<StageOutput>,
    /// Last stage attempted; the failing stage when `completed` is false
    pub furthest_stage: ChainStage,
    pub completed: bool,
    pub failure: Option<String>,
    /// Summary when completed, otherwise the last successful stage output
    pub artifact: String,
    /// Wall-clock time of the whole workflow
    pub elapsed_ms: u64,
}

impl ChainResult {
    pub fn stage_output(&self, stage: ChainStage) -> Option<&str> {
        self.stages
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| s.output.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingResult {
    pub query: String,
    pub selected_role: AgentRole,
    pub rationale: String,
    /// Set when the router fell back to the default role
    pub anomaly: Option<String>,
    pub artifact: String,
    /// Wall-clock time of the whole workflow
    pub elapsed_ms: u64,
}

/// One evaluate (and optional revise) round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: u32,
    pub score: f64,
    pub critique: Vec<String>,
    /// The artifact that received `score`
    pub artifact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalOptResult {
    pub iterations: Vec<IterationRecord>,
    pub best_score: f64,
    pub best_iteration: u32,
    /// Whether the best score reached the acceptance threshold
    pub accepted: bool,
    /// Why the loop stopped before acceptance, if it did
    pub stop_reason: Option<String>,
    pub artifact: String,
    /// Wall-clock time of the whole workflow
    pub elapsed_ms: u64,
}

/// Tagged union over the three workflow patterns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum WorkflowResult {
    Chain(ChainResult),
    Routing(RoutingResult),
    EvalOpt(EvalOptResult),
}

impl WorkflowResult {
    pub fn artifact(&self) -> &str {
        match self {
            Self::Chain(r) => &r.artifact,
            Self::Routing(r) => &r.artifact,
            Self::EvalOpt(r) => &r.artifact,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        match self {
            Self::Chain(r) => r.elapsed_ms,
            Self::Routing(r) => r.elapsed_ms,
            Self::EvalOpt(r) => r.elapsed_ms,
        }
    }

    pub fn pattern(&self) -> &'static str {
        match self {
            Self::Chain(_) => "prompt_chain",
            Self::Routing(_) => "routing",
            Self::EvalOpt(_) => "evaluator_optimizer",
        }
    }

    pub fn as_chain(&self) -> Option<&ChainResult> {
        match self {
            Self::Chain(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_routing(&self) -> Option<&RoutingResult> {
        match self {
            Self::Routing(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_eval_opt(&self) -> Option<&EvalOptResult> {
        match self {
            Self::EvalOpt(r) => Some(r),
            _ => None,
        }
    }
}

/// Milliseconds since `started`, saturating
pub fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_matches_positions() {
        for (i, stage) in ChainStage::ORDER.iter().enumerate() {
            assert_eq!(stage.position(), i + 1);
        }
        assert!(ChainStage::Ingest < ChainStage::Summarize);
    }

    #[test]
    fn test_workflow_result_is_tagged() {
        let result = WorkflowResult::Routing(RoutingResult {
            query: "q".to_string(),
            selected_role: AgentRole::Market,
            rationale: "r".to_string(),
            anomaly: None,
            artifact: "findings".to_string(),
            elapsed_ms: 12,
        });

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["pattern"], "routing");
        assert_eq!(value["selected_role"], "Market");
        assert_eq!(result.artifact(), "findings");
        assert!(result.as_chain().is_none());
    }
}
