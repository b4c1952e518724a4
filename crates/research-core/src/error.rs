//! Error types for research-core

use std::time::Duration;

use thiserror::Error;

use crate::model::DataSourceKind;
use crate::schema::FieldKind;

/// Result type alias for run-level operations
pub type Result<T> = std::result::Result<T, ResearchError>;

/// A reasoning response that does not conform to its target schema
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    /// Top-level response is not a JSON object
    #[error("response is not a JSON object")]
    NotAnObject,

    /// Required field absent or null
    #[error("missing required field '{0}'")]
    MissingField(String),

    /// Field present with the wrong JSON type
    #[error("field '{field}' has the wrong type, expected {expected:?}")]
    WrongType { field: String, expected: FieldKind },

    /// Required field present but empty
    #[error("required field '{0}' is empty")]
    EmptyField(String),

    /// Score outside the unit interval
    #[error("field '{field}' must lie within [0, 1], got {value}")]
    OutOfRange { field: String, value: f64 },

    /// Value has the right shape but could not be decoded into the typed response
    #[error("{0}")]
    Deserialize(String),
}

/// Failure of one reasoning call
#[derive(Error, Debug, Clone)]
pub enum ReasoningError {
    /// Provider call failed (network, auth, provider error)
    #[error("reasoning call failed: {0}")]
    CallFailed(String),

    /// Provider call exceeded its deadline
    #[error("reasoning call timed out after {0:?}")]
    Timeout(Duration),

    /// Provider returned text that is not JSON
    #[error("reasoning response is not valid JSON: {0}")]
    MalformedResponse(String),

    /// Response parsed but does not match the requested schema
    #[error("response for schema '{schema}' is invalid: {violation}")]
    SchemaValidation {
        schema: String,
        violation: SchemaViolation,
    },

    /// Prompt template failed to render
    #[error("prompt rendering failed: {0}")]
    Prompt(String),
}

impl ReasoningError {
    /// Whether the failure came from validating the response rather than from the call
    pub fn is_schema_failure(&self) -> bool {
        matches!(
            self,
            Self::SchemaValidation { .. } | Self::MalformedResponse(_)
        )
    }
}

/// Run-level error taxonomy
///
/// Component-local failures are folded into typed status fields on the
/// snapshot, analysis, workflow and assessment types. Only the variants that
/// abort a run reach the caller.
#[derive(Error, Debug, Clone)]
pub enum ResearchError {
    /// Planner could not produce a valid plan, even after the repair retry
    #[error("planning failed: {0}")]
    Planning(String),

    /// Vendor fetch failed
    #[error("data fetch from {provider} failed: {reason}")]
    DataFetch {
        provider: DataSourceKind,
        reason: String,
    },

    /// Reasoning call failed
    #[error(transparent)]
    Reasoning(#[from] ReasoningError),

    /// Router produced an unusable selection
    #[error("routing anomaly: {0}")]
    RoutingAnomaly(String),

    /// Evaluator-optimizer never produced a scored artifact
    #[error("evaluator-optimizer produced no scored artifact after {iterations} iteration(s)")]
    EvaluationExhausted { iterations: u32 },

    /// Run was cancelled by the caller
    #[error("research run cancelled")]
    Cancelled,

    /// Memory persistence failed
    #[error("memory store error: {0}")]
    Memory(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl ResearchError {
    /// Short machine-readable kind, used in logs and CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Planning(_) => "planning_failure",
            Self::DataFetch { .. } => "data_fetch_failure",
            Self::Reasoning(e) if e.is_schema_failure() => "schema_validation_failure",
            Self::Reasoning(_) => "reasoning_failure",
            Self::RoutingAnomaly(_) => "routing_anomaly",
            Self::EvaluationExhausted { .. } => "evaluation_exhausted",
            Self::Cancelled => "cancelled",
            Self::Memory(_) => "memory",
            Self::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_failures_are_classified() {
        let err = ReasoningError::SchemaValidation {
            schema: "facts".to_string(),
            violation: SchemaViolation::MissingField("facts".to_string()),
        };
        assert!(err.is_schema_failure());
        assert!(!ReasoningError::CallFailed("boom".into()).is_schema_failure());

        let run: ResearchError = err.into();
        assert_eq!(run.kind(), "schema_validation_failure");
    }

    #[test]
    fn test_error_messages() {
        let err = ResearchError::EvaluationExhausted { iterations: 3 };
        assert_eq!(
            err.to_string(),
            "evaluator-optimizer produced no scored artifact after 3 iteration(s)"
        );

        let err = ResearchError::DataFetch {
            provider: DataSourceKind::Fred,
            reason: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "data fetch from FRED failed: timeout");
    }
}
