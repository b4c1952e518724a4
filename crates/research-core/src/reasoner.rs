//! The reasoning capability contract
//!
//! All LLM reasoning goes through [`Reasoner`]. Callers use
//! [`reason_structured`], which validates the response against its schema,
//! decodes it into a typed value and retries once with a repair prompt when
//! either the call or the validation fails.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ReasoningError, SchemaViolation};
use crate::schema::ResponseSchema;

/// External reasoning service returning JSON that approximates a schema
///
/// Implementations are non-deterministic and fallible. They are not expected
/// to validate their own output.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Run one reasoning call
    async fn reason(&self, prompt: &str, schema: &ResponseSchema) -> Result<Value, ReasoningError>;

    /// Identifier used in logs
    fn name(&self) -> &str {
        "reasoner"
    }
}

/// Reason, validate and decode, with one repair retry
pub async fn reason_structured<T: DeserializeOwned>(
    reasoner: &dyn Reasoner,
    prompt: &str,
    schema: &ResponseSchema,
) -> Result<T, ReasoningError> {
    match attempt(reasoner, prompt, schema).await {
        Ok(value) => Ok(value),
        Err(first) => {
            warn!(
                reasoner = reasoner.name(),
                schema = schema.name,
                error = %first,
                "Reasoning attempt failed, retrying with repair prompt"
            );
            let repair = repair_prompt(prompt, schema, &first);
            attempt(reasoner, &repair, schema).await
        }
    }
}

async fn attempt<T: DeserializeOwned>(
    reasoner: &dyn Reasoner,
    prompt: &str,
    schema: &ResponseSchema,
) -> Result<T, ReasoningError> {
    let value = reasoner.reason(prompt, schema).await?;
    debug!(schema = schema.name, "Received reasoning response");

    schema
        .validate(&value)
        .map_err(|violation| ReasoningError::SchemaValidation {
            schema: schema.name.to_string(),
            violation,
        })?;

    serde_json::from_value(value).map_err(|e| ReasoningError::SchemaValidation {
        schema: schema.name.to_string(),
        violation: SchemaViolation::Deserialize(e.to_string()),
    })
}

/// Retry prompt restating the schema and the first attempt's error
pub fn repair_prompt(original: &str, schema: &ResponseSchema, error: &ReasoningError) -> String {
    format!(
        "{original}\n\n\
         IMPORTANT: your previous response could not be used ({error}).\n\
         Return ONLY a JSON object for schema '{name}', with no prose and no code fences.\n\
         {shape}",
        name = schema.name,
        shape = schema.describe(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::catalog;
    use crate::testing::ScriptedReasoner;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Summary {
        summary: String,
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let reasoner = ScriptedReasoner::new()
            .respond(catalog::SUMMARY, json!({ "summary": "Solid quarter" }));

        let out: Summary = reason_structured(&reasoner, "summarize", &catalog::summary())
            .await
            .unwrap();

        assert_eq!(out.summary, "Solid quarter");
        assert_eq!(reasoner.call_count(catalog::SUMMARY), 1);
    }

    #[tokio::test]
    async fn test_invalid_response_triggers_one_repair() {
        let reasoner = ScriptedReasoner::new()
            .respond(catalog::SUMMARY, json!({ "text": "wrong field" }))
            .respond(catalog::SUMMARY, json!({ "summary": "Fixed" }));

        let out: Summary = reason_structured(&reasoner, "summarize", &catalog::summary())
            .await
            .unwrap();

        assert_eq!(out.summary, "Fixed");
        let calls = reasoner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].prompt.contains("missing required field 'summary'"));
    }

    #[tokio::test]
    async fn test_persistent_failure_propagates() {
        let reasoner = ScriptedReasoner::new()
            .fail(catalog::SUMMARY, ReasoningError::CallFailed("down".into()))
            .fail(catalog::SUMMARY, ReasoningError::CallFailed("still down".into()));

        let result: Result<Summary, _> =
            reason_structured(&reasoner, "summarize", &catalog::summary()).await;

        assert!(matches!(result, Err(ReasoningError::CallFailed(msg)) if msg == "still down"));
        assert_eq!(reasoner.call_count(catalog::SUMMARY), 2);
    }

    #[test]
    fn test_repair_prompt_restates_schema() {
        let error = ReasoningError::MalformedResponse("expected value".into());
        let prompt = repair_prompt("Plan AAPL", &catalog::research_plan(), &error);
        assert!(prompt.starts_with("Plan AAPL"));
        assert!(prompt.contains("schema 'research_plan'"));
        assert!(prompt.contains("\"steps\""));
    }
}
