//! Evaluator-optimizer loop
//!
//! ```text
//! Draft → Evaluate → Accept
//!            ↓
//!          Revise → Evaluate → ...
//! ```
//!
//! The loop stops when a score reaches the threshold, when `max_iterations`
//! evaluations have run, or when a reasoning call fails after repair. The
//! returned artifact is always the best one scored so far.

use std::sync::Arc;
use std::time::Instant;

use research_core::{
    catalog, clamp_unit, elapsed_ms, reason_structured, EvalOptResult, IterationRecord, PromptTemplate,
    Reasoner, ResearchError,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

/// Acceptance threshold for evaluator scores
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.85;

/// Evaluations per run
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

const EVALUATE_PROMPT: PromptTemplate = PromptTemplate::new(
    "evaluate",
    "You are reviewing a research draft about {{ topic }}.\n\
     Score its quality from 0.0 to 1.0 for accuracy, completeness, clarity and \
     actionability, and list specific weaknesses.\n\n\
     Draft:\n{{ draft }}",
);

const REVISE_PROMPT: PromptTemplate = PromptTemplate::new(
    "revise",
    "Improve this research draft about {{ topic }}.\n\n\
     Draft:\n{{ draft }}\n\n\
     Reviewer critique:\n{{ critique | bullets }}\n\n\
     Return the complete revised draft.",
);

#[derive(Debug, Deserialize)]
struct Evaluation {
    score: f64,
    #[serde(default)]
    critique: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Revision {
    revised_artifact: String,
}

enum LoopState {
    Evaluate(String),
    Revise { artifact: String, critique: Vec<String> },
    Done(Option<String>),
}

struct Best {
    score: f64,
    iteration: u32,
    artifact: String,
}

/// Bounded evaluate/revise loop with a best-so-far slot
pub struct EvaluatorOptimizerWorkflow {
    reasoner: Arc<dyn Reasoner>,
    threshold: f64,
    max_iterations: u32,
}

impl EvaluatorOptimizerWorkflow {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self {
            reasoner,
            threshold: DEFAULT_QUALITY_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = clamp_unit(threshold);
        self
    }

    /// At least one evaluation always runs
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Refine `draft`, failing only when no iteration was ever scored
    #[instrument(skip(self, draft), fields(threshold = self.threshold, max_iterations = self.max_iterations))]
    pub async fn run(&self, topic: &str, draft: String) -> Result<EvalOptResult, ResearchError> {
        let started = Instant::now();
        let mut history: Vec<IterationRecord> = Vec::new();
        let mut best: Option<Best> = None;
        let mut iteration = 0;
        let mut state = LoopState::Evaluate(draft);

        let stop_reason = loop {
            state = match state {
                LoopState::Evaluate(artifact) => {
                    iteration += 1;
                    let evaluation = match self.evaluate(topic, &artifact).await {
                        Ok(evaluation) => evaluation,
                        Err(reason) => {
                            warn!(iteration, %reason, "Evaluation failed");
                            break Some(format!("evaluation failed at iteration {iteration}: {reason}"));
                        }
                    };
                    let score = clamp_unit(evaluation.score);
                    debug!(iteration, score, "Draft evaluated");

                    // Strictly greater: ties keep the earlier artifact
                    if best.as_ref().is_none_or(|b| score > b.score) {
                        best = Some(Best {
                            score,
                            iteration,
                            artifact: artifact.clone(),
                        });
                    }
                    history.push(IterationRecord {
                        iteration,
                        score,
                        critique: evaluation.critique.clone(),
                        artifact: artifact.clone(),
                    });

                    if score >= self.threshold {
                        LoopState::Done(None)
                    } else if iteration >= self.max_iterations {
                        LoopState::Done(Some(format!(
                            "max iterations ({}) reached below threshold",
                            self.max_iterations
                        )))
                    } else {
                        LoopState::Revise {
                            artifact,
                            critique: evaluation.critique,
                        }
                    }
                }
                LoopState::Revise { artifact, critique } => {
                    match self.revise(topic, &artifact, &critique).await {
                        Ok(revised) => LoopState::Evaluate(revised),
                        Err(reason) => {
                            warn!(iteration, %reason, "Revision failed");
                            LoopState::Done(Some(format!(
                                "revision failed after iteration {iteration}: {reason}"
                            )))
                        }
                    }
                }
                LoopState::Done(reason) => break reason,
            };
        };

        let Some(best) = best else {
            return Err(ResearchError::EvaluationExhausted {
                iterations: iteration,
            });
        };

        let accepted = best.score >= self.threshold;
        let elapsed_ms = elapsed_ms(started);
        info!(
            iterations = history.len(),
            elapsed_ms,
            best_score = best.score,
            accepted,
            "Evaluator-optimizer finished"
        );

        Ok(EvalOptResult {
            iterations: history,
            best_score: best.score,
            best_iteration: best.iteration,
            accepted,
            stop_reason,
            artifact: best.artifact,
            elapsed_ms,
        })
    }

    async fn evaluate(&self, topic: &str, draft: &str) -> Result<Evaluation, String> {
        let prompt = EVALUATE_PROMPT
            .render(&json!({ "topic": topic, "draft": draft }))
            .map_err(|e| e.to_string())?;
        reason_structured(self.reasoner.as_ref(), &prompt, &catalog::evaluation())
            .await
            .map_err(|e| e.to_string())
    }

    async fn revise(&self, topic: &str, draft: &str, critique: &[String]) -> Result<String, String> {
        let critique = if critique.is_empty() {
            vec!["Improve depth and precision".to_string()]
        } else {
            critique.to_vec()
        };
        let prompt = REVISE_PROMPT
            .render(&json!({ "topic": topic, "draft": draft, "critique": critique }))
            .map_err(|e| e.to_string())?;
        let revision: Revision =
            reason_structured(self.reasoner.as_ref(), &prompt, &catalog::revision())
                .await
                .map_err(|e| e.to_string())?;
        Ok(revision.revised_artifact)
    }
}
