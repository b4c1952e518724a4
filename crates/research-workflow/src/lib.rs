//! Orchestration patterns for a research run
//!
//! Three workflow shapes share the [`research_core::Reasoner`] capability:
//!
//! - [`PromptChainWorkflow`]: five strictly sequential stages from raw topic to summary
//! - [`RoutingWorkflow`]: picks exactly one specialist for a free-text query
//! - [`EvaluatorOptimizerWorkflow`]: bounded score/revise loop keeping the best draft
//!
//! Each produces the matching variant of [`research_core::WorkflowResult`].

pub mod chain;
pub mod evaluator;
pub mod routing;

pub use chain::{classify, detect_ticker, ingest, preprocess, PromptChainWorkflow};
pub use evaluator::{
    EvaluatorOptimizerWorkflow, DEFAULT_MAX_ITERATIONS, DEFAULT_QUALITY_THRESHOLD,
};
pub use routing::{default_role, RoutingWorkflow};
