//! Deterministic reasoner for tests
//!
//! [`ScriptedReasoner`] answers each call from a per-schema queue, falling back
//! to a per-schema default, and records every prompt it sees.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ReasoningError;
use crate::reasoner::Reasoner;
use crate::schema::{catalog, ResponseSchema};

/// One observed reasoning call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub schema: String,
    pub prompt: String,
}

type Scripted = Result<Value, ReasoningError>;

#[derive(Default)]
pub struct ScriptedReasoner {
    queues: Mutex<HashMap<String, VecDeque<Scripted>>>,
    defaults: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedReasoner {
    /// Reasoner with no scripted responses; unscripted calls fail
    pub fn new() -> Self {
        Self::default()
    }

    /// Reasoner answering every catalog schema with a canned valid response
    pub fn with_defaults() -> Self {
        let reasoner = Self::new();
        for (schema, value) in canned_responses() {
            reasoner.set_default(schema, value);
        }
        reasoner
    }

    /// Queue a response for the next call on `schema`
    pub fn respond(self, schema: &str, value: Value) -> Self {
        self.push(schema, Ok(value));
        self
    }

    /// Queue a failure for the next call on `schema`
    pub fn fail(self, schema: &str, error: ReasoningError) -> Self {
        self.push(schema, Err(error));
        self
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push(&self, schema: &str, response: Scripted) {
        lock(&self.queues)
            .entry(schema.to_string())
            .or_default()
            .push_back(response);
    }

    /// Response used once the queue for `schema` is drained
    pub fn set_default(&self, schema: &str, value: Value) {
        lock(&self.defaults).insert(schema.to_string(), value);
    }

    /// Make every unscripted call on `schema` fail
    pub fn clear_default(&self, schema: &str) {
        lock(&self.defaults).remove(schema);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, schema: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.schema == schema).count()
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn reason(&self, prompt: &str, schema: &ResponseSchema) -> Result<Value, ReasoningError> {
        lock(&self.calls).push(RecordedCall {
            schema: schema.name.to_string(),
            prompt: prompt.to_string(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(next) = lock(&self.queues)
            .get_mut(schema.name)
            .and_then(VecDeque::pop_front)
        {
            return next;
        }

        lock(&self.defaults)
            .get(schema.name)
            .cloned()
            .ok_or_else(|| {
                ReasoningError::CallFailed(format!("no scripted response for '{}'", schema.name))
            })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn canned_responses() -> Vec<(&'static str, Value)> {
    vec![
        (
            catalog::RESEARCH_PLAN,
            json!({
                "objectives": [
                    "Assess recent price action",
                    "Evaluate fundamental strength",
                    "Place the company in its macro context"
                ],
                "steps": [
                    { "description": "Review price and volume", "data_source": "yahoo_finance" },
                    { "description": "Review company overview", "data_source": "alpha_vantage" },
                    { "description": "Review macro indicators", "data_source": "fred" },
                    { "description": "Review recent filings", "data_source": "sec_edgar" }
                ],
                "expected_outputs": ["Investment summary", "Risk assessment"],
                "rationale": "Covers market, fundamental, macro and regulatory angles"
            }),
        ),
        (
            catalog::AGENT_ANALYSIS,
            json!({
                "findings": ["Data indicates a stable trend", "No material red flags"],
                "recommendations": ["Monitor next earnings release"],
                "confidence": 0.8
            }),
        ),
        (
            catalog::ROUTE,
            json!({
                "role": "Fundamentals",
                "rationale": "The query concerns valuation"
            }),
        ),
        (
            catalog::FACTS,
            json!({ "facts": ["Price is near its 52-week high", "Margins are expanding"] }),
        ),
        (
            catalog::SUMMARY,
            json!({ "summary": "The company shows healthy momentum and solid fundamentals." }),
        ),
        (
            catalog::EVALUATION,
            json!({ "score": 0.9, "critique": ["Could cite more figures"] }),
        ),
        (
            catalog::REVISION,
            json!({ "revised_artifact": "Revised summary with additional figures." }),
        ),
        (
            catalog::QUALITY_ASSESSMENT,
            json!({
                "overall_score": 0.82,
                "strengths": ["Broad source coverage"],
                "weaknesses": ["Limited historical depth"],
                "suggested_improvements": ["Include peer comparison"]
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_then_default() {
        let reasoner = ScriptedReasoner::with_defaults()
            .respond(catalog::SUMMARY, json!({ "summary": "first" }));
        let schema = catalog::summary();

        let first = reasoner.reason("p1", &schema).await.unwrap();
        let second = reasoner.reason("p2", &schema).await.unwrap();

        assert_eq!(first["summary"], "first");
        assert_eq!(
            second["summary"],
            "The company shows healthy momentum and solid fundamentals."
        );
        assert_eq!(reasoner.call_count(catalog::SUMMARY), 2);
    }

    #[tokio::test]
    async fn test_unscripted_call_fails() {
        let reasoner = ScriptedReasoner::new();
        let result = reasoner.reason("p", &catalog::facts()).await;
        assert!(matches!(result, Err(ReasoningError::CallFailed(_))));
    }

    #[test]
    fn test_canned_responses_conform_to_catalog() {
        let schemas = [
            catalog::research_plan(),
            catalog::agent_analysis(),
            catalog::route(),
            catalog::facts(),
            catalog::summary(),
            catalog::evaluation(),
            catalog::revision(),
            catalog::quality_assessment(),
        ];
        let canned: HashMap<_, _> = canned_responses().into_iter().collect();
        for schema in schemas {
            let value = &canned[schema.name];
            assert!(schema.validate(value).is_ok(), "{} canned response", schema.name);
        }
    }
}
