//! [`Reasoner`] adapter over an [`LLMProvider`]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use research_core::{Reasoner, ReasoningError, ResponseSchema};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::{CompletionRequest, LLMProvider, Message, StopReason};

const SYSTEM_PROMPT: &str = "You are a meticulous financial research analyst. \
Always answer with a single JSON object and nothing else.";

/// Turns chat completions into schema-shaped JSON values
///
/// Each call is bounded by `timeout`; an elapsed deadline surfaces as
/// [`ReasoningError::Timeout`].
pub struct LlmReasoner {
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_tokens: usize,
    temperature: f32,
    timeout: Duration,
}

impl LlmReasoner {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 2000,
            temperature: 0.7,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Reasoner for LlmReasoner {
    #[instrument(skip(self, prompt, schema), fields(schema = schema.name, model = %self.model))]
    async fn reason(&self, prompt: &str, schema: &ResponseSchema) -> Result<Value, ReasoningError> {
        let request = CompletionRequest::builder(&self.model)
            .system(format!("{SYSTEM_PROMPT}\n\n{}", schema.describe()))
            .add_message(Message::user(prompt))
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .json_response()
            .build();

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| ReasoningError::Timeout(self.timeout))??;

        debug!(
            provider = self.provider.name(),
            tokens = response.usage.total(),
            "Completion received"
        );
        if response.stop_reason == StopReason::MaxTokens {
            warn!(max_tokens = self.max_tokens, "Completion hit the token limit, JSON may be cut off");
        }

        parse_json_response(&response.message.content)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

/// Parse model output into JSON, tolerating code fences and surrounding prose
pub fn parse_json_response(text: &str) -> Result<Value, ReasoningError> {
    let trimmed = strip_code_fence(text.trim());
    if trimmed.is_empty() {
        return Err(ReasoningError::MalformedResponse("empty response".to_string()));
    }

    match serde_json::from_str(trimmed) {
        Ok(value) => Ok(value),
        Err(first) => {
            let embedded = trimmed
                .find('{')
                .zip(trimmed.rfind('}'))
                .filter(|(start, end)| start < end)
                .and_then(|(start, end)| serde_json::from_str::<Value>(&trimmed[start..=end]).ok());
            embedded.ok_or_else(|| ReasoningError::MalformedResponse(first.to_string()))
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
