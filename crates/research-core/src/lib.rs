//! Core abstractions for the investment research orchestrator
//!
//! This crate defines the data model shared by every stage of a research run,
//! the [`Reasoner`] contract through which all LLM reasoning flows, the
//! response schemas that reasoning output is validated against, and the error
//! taxonomy used across the workspace.
//!
//! # Quick Start
//!
//! ```
//! use research_core::{AgentRole, DataSourceKind};
//!
//! let role: AgentRole = "MarketDataAgent".parse().unwrap();
//! assert_eq!(role, AgentRole::Market);
//! assert_eq!(role.primary_source(), DataSourceKind::YahooFinance);
//! ```
//!
//! # Feature Flags
//!
//! - `test-util`: exposes [`testing::ScriptedReasoner`], a deterministic reasoner
//!   with per-schema scripted responses

pub mod error;
pub mod model;
pub mod prompt;
pub mod reasoner;
pub mod report;
pub mod schema;
pub mod workflow;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{ReasoningError, ResearchError, Result, SchemaViolation};
pub use model::{
    AgentAnalysis, AgentRole, AnalysisValidity, DataSnapshot, DataSourceKind, MemoryEntry,
    Payload, PlanStep, QualityAssessment, ResearchPlan, SnapshotStatus, MAX_INSIGHTS,
    clamp_unit, normalize_topic,
};
pub use prompt::PromptTemplate;
pub use reasoner::{reason_structured, repair_prompt, Reasoner};
pub use report::ResearchReport;
pub use schema::{catalog, FieldKind, FieldSpec, ResponseSchema};
pub use workflow::{
    elapsed_ms, ChainResult, ChainStage, EvalOptResult, IterationRecord, RoutingResult,
    StageOutput, WorkflowResult,
};
