//! Research agents and the orchestrator that runs them
//!
//! A run is planned by the [`Planner`], fed by the data gateway, analysed by
//! one [`SpecialistAgent`] per role, passed through the three workflows,
//! scored by the [`ReflectionEngine`] and remembered in the [`MemoryStore`].
//! [`ResearchOrchestrator`] owns that sequence.
//!
//! ```no_run
//! use research_agent::{ResearchConfig, ResearchOrchestrator};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ResearchConfig::from_env()?;
//! let orchestrator = ResearchOrchestrator::from_config(&config).await?;
//! let report = orchestrator.conduct_research("AAPL").await?;
//! println!("quality {:.2}", report.overall_quality_score());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod memory;
pub mod orchestrator;
pub mod planner;
pub mod prompts;
pub mod reflection;
pub mod specialist;

pub use config::{ResearchConfig, ResearchConfigBuilder};
pub use memory::{MemoryError, MemoryStore};
pub use orchestrator::{PartialResults, ResearchOrchestrator, RunFailure};
pub use planner::Planner;
pub use reflection::{heuristic_assessment, ReflectionEngine, RunSummary};
pub use specialist::{RoleContext, SpecialistAgent};

// Re-exported so callers need only this crate
pub use research_core::{ResearchError, ResearchReport};
pub use tokio_util::sync::CancellationToken;
