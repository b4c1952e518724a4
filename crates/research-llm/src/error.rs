//! Provider errors and their mapping onto reasoning failures

use research_core::ReasoningError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LLMError>;

/// Failures talking to a chat completion service
///
/// Every variant reaches the workflows as a [`ReasoningError`].
#[derive(Error, Debug)]
pub enum LLMError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Provider answered, but not with a usable completion
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Missing key or bad endpoint; surfaces at orchestrator construction
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<LLMError> for ReasoningError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::UnexpectedResponse(msg) => ReasoningError::MalformedResponse(msg),
            LLMError::HttpError(e) if e.is_timeout() => {
                ReasoningError::CallFailed(format!("provider timeout: {e}"))
            }
            other => ReasoningError::CallFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LLMError::RateLimitExceeded("slow down".to_string());
        assert_eq!(err.to_string(), "Rate limit exceeded: slow down");
    }

    #[test]
    fn test_into_reasoning_error() {
        let err: ReasoningError = LLMError::AuthenticationFailed.into();
        assert!(matches!(err, ReasoningError::CallFailed(_)));

        let err: ReasoningError = LLMError::UnexpectedResponse("no choices".into()).into();
        assert!(matches!(err, ReasoningError::MalformedResponse(msg) if msg == "no choices"));
    }
}
