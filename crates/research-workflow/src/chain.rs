//! Five-stage prompt chain
//!
//! ingest → preprocess → classify → extract → summarize
//!
//! The first three stages are deterministic; extract and summarize are
//! reasoning calls. Stages run strictly in order and the first failure aborts
//! the chain, keeping every earlier stage output in the result.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use regex::Regex;
use research_core::{
    catalog, elapsed_ms, reason_structured, ChainResult, ChainStage, DataSnapshot, PromptTemplate,
    Reasoner, StageOutput,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

const EXTRACT_PROMPT: PromptTemplate = PromptTemplate::new(
    "chain_extract",
    "You are a financial research analyst studying {{ topic }}.\n\
     The data below was classified as '{{ label }}'.\n\
     Extract the atomic, verifiable facts it supports. Do not speculate.\n\n\
     {{ corpus }}",
);

const SUMMARIZE_PROMPT: PromptTemplate = PromptTemplate::new(
    "chain_summarize",
    "Write a concise research summary for {{ topic }} using only these facts:\n\
     {{ facts | bullets }}",
);

/// Category keywords matched against the lower-cased corpus
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "market",
        &["price", "volume", "close", "open_price", "day_high", "day_low"],
    ),
    (
        "fundamental",
        &[
            "revenue", "eps", "pe_ratio", "margin", "market_cap", "ebitda", "earnings",
            "dividend", "book_value",
        ],
    ),
    (
        "macro",
        &[
            "fed_funds", "treasury", "unemployment", "cpi", "gdp", "yield", "inflation",
        ],
    ),
    (
        "regulatory",
        &["filing", "10-k", "10-q", "8-k", "cik", "sec ", "form"],
    ),
];

#[derive(Debug, Deserialize)]
struct Facts {
    facts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Summary {
    summary: String,
}

/// Sequential prompt chain over the run's snapshots
pub struct PromptChainWorkflow {
    reasoner: Arc<dyn Reasoner>,
}

impl PromptChainWorkflow {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self { reasoner }
    }

    /// Run all five stages; never fails, the outcome is in the result
    #[instrument(skip(self, snapshots), fields(snapshots = snapshots.len()))]
    pub async fn run(&self, raw_topic: &str, snapshots: &[DataSnapshot]) -> ChainResult {
        let mut trace = ChainTrace::start();

        let topic = match ingest(raw_topic) {
            Ok(topic) => trace.complete(ChainStage::Ingest, topic),
            Err(reason) => return trace.abort(ChainStage::Ingest, reason),
        };

        let corpus = match preprocess(&topic, snapshots) {
            Ok(corpus) => trace.complete(ChainStage::Preprocess, corpus),
            Err(reason) => return trace.abort(ChainStage::Preprocess, reason),
        };

        let label = trace.complete(ChainStage::Classify, classify(&corpus).to_string());

        let facts = match self.extract(&topic, &corpus, &label).await {
            Ok(facts) => facts,
            Err(reason) => return trace.abort(ChainStage::Extract, reason),
        };
        trace.complete(ChainStage::Extract, bullet_list(&facts));

        match self.summarize(&topic, &facts).await {
            Ok(summary) => {
                trace.complete(ChainStage::Summarize, summary);
                trace.finish()
            }
            Err(reason) => trace.abort(ChainStage::Summarize, reason),
        }
    }

    async fn extract(&self, topic: &str, corpus: &str, label: &str) -> Result<Vec<String>, String> {
        let prompt = EXTRACT_PROMPT
            .render(&json!({ "topic": topic, "label": label, "corpus": corpus }))
            .map_err(|e| e.to_string())?;

        let out: Facts = reason_structured(self.reasoner.as_ref(), &prompt, &catalog::facts())
            .await
            .map_err(|e| format!("fact extraction failed: {e}"))?;

        let facts: Vec<String> = out
            .facts
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        if facts.is_empty() {
            return Err("fact extraction returned no facts".to_string());
        }
        debug!(facts = facts.len(), "Extracted facts");
        Ok(facts)
    }

    async fn summarize(&self, topic: &str, facts: &[String]) -> Result<String, String> {
        let prompt = SUMMARIZE_PROMPT
            .render(&json!({ "topic": topic, "facts": facts }))
            .map_err(|e| e.to_string())?;

        let out: Summary = reason_structured(self.reasoner.as_ref(), &prompt, &catalog::summary())
            .await
            .map_err(|e| format!("summarization failed: {e}"))?;
        Ok(out.summary.trim().to_string())
    }
}

struct ChainTrace {
    started: Instant,
    stages: Vec<StageOutput>,
}

impl ChainTrace {
    fn start() -> Self {
        Self {
            started: Instant::now(),
            stages: Vec::new(),
        }
    }

    fn complete(&mut self, stage: ChainStage, output: String) -> String {
        debug!(stage = stage.name(), "Chain stage completed");
        self.stages.push(StageOutput {
            stage,
            output: output.clone(),
        });
        output
    }

    fn abort(self, stage: ChainStage, reason: String) -> ChainResult {
        warn!(stage = stage.name(), %reason, "Prompt chain aborted");
        let artifact = self
            .stages
            .last()
            .map(|s| s.output.clone())
            .unwrap_or_default();
        ChainResult {
            stages: self.stages,
            furthest_stage: stage,
            completed: false,
            failure: Some(reason),
            artifact,
            elapsed_ms: elapsed_ms(self.started),
        }
    }

    fn finish(self) -> ChainResult {
        let elapsed_ms = elapsed_ms(self.started);
        info!(elapsed_ms, "Prompt chain completed");
        let artifact = self
            .stages
            .last()
            .map(|s| s.output.clone())
            .unwrap_or_default();
        ChainResult {
            stages: self.stages,
            furthest_stage: ChainStage::Summarize,
            completed: true,
            failure: None,
            artifact,
            elapsed_ms,
        }
    }
}

fn ticker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z]{1,5}(\.[A-Za-z]{1,2})?$").expect("valid regex"))
}

fn embedded_ticker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b[A-Z]{2,5}\b").expect("valid regex"))
}

/// Longest lower-case word still read as a ticker ("aapl" yes, "apple" no)
const MAX_LOWERCASE_TICKER: usize = 4;

/// Whole topic is a symbol: upper-case as typed, or a short lower-case one
fn is_bare_ticker(topic: &str) -> bool {
    if !ticker_pattern().is_match(topic) {
        return false;
    }
    if !topic.chars().any(|c| c.is_ascii_lowercase()) {
        return true;
    }
    topic.split('.').next().map_or(0, str::len) <= MAX_LOWERCASE_TICKER
}

/// Trim, collapse whitespace and upper-case ticker-like topics
pub fn ingest(raw_topic: &str) -> Result<String, String> {
    let topic = raw_topic.split_whitespace().collect::<Vec<_>>().join(" ");
    if topic.is_empty() {
        return Err("topic is empty".to_string());
    }
    if is_bare_ticker(&topic) {
        return Ok(topic.to_uppercase());
    }
    Ok(topic)
}

/// Ticker symbol for a topic: the topic itself when ticker-like, otherwise
/// the first all-caps token in it
pub fn detect_ticker(topic: &str) -> Option<String> {
    let topic = topic.trim();
    if is_bare_ticker(topic) {
        return Some(topic.to_uppercase());
    }
    embedded_ticker_pattern()
        .find(topic)
        .map(|m| m.as_str().to_string())
}

/// Deterministic text corpus from the `Ok` snapshots, null fields dropped
pub fn preprocess(topic: &str, snapshots: &[DataSnapshot]) -> Result<String, String> {
    let mut usable: Vec<&DataSnapshot> = snapshots.iter().filter(|s| s.is_ok()).collect();
    if usable.is_empty() {
        return Err(format!("no usable data snapshots for {topic}"));
    }
    usable.sort_by_key(|s| s.source);

    let sections: Vec<String> = usable
        .iter()
        .map(|snapshot| {
            let mut section = format!("[{}]", snapshot.source);
            for (field, value) in &snapshot.payload {
                if value.is_null() {
                    continue;
                }
                section.push_str(&format!("\n{field}: {}", render_value(value)));
            }
            section
        })
        .collect();

    Ok(sections.join("\n\n"))
}

/// Keyword classifier over the corpus
///
/// The dominant category wins when it has at least twice the hits of the
/// runner-up; otherwise the corpus is `mixed`. No hits at all is `general`.
pub fn classify(corpus: &str) -> &'static str {
    let text = corpus.to_lowercase();
    let mut scores: Vec<(&'static str, usize)> = CATEGORY_KEYWORDS
        .iter()
        .map(|(label, keywords)| {
            let hits = keywords.iter().map(|k| text.matches(k).count()).sum();
            (*label, hits)
        })
        .collect();
    // Stable sort keeps declaration order on ties
    scores.sort_by(|a, b| b.1.cmp(&a.1));

    match scores.as_slice() {
        [(_, 0), ..] | [] => "general",
        [(label, top), (_, second), ..] if *top >= second * 2 => *label,
        [(label, _)] => *label,
        _ => "mixed",
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
