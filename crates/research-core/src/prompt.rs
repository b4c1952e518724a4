//! MiniJinja-backed prompt templates

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

use crate::error::ReasoningError;

/// A named instruction template using Jinja2 syntax
///
/// Undefined variables are an error, so a missing context field fails the
/// render instead of silently producing an empty string.
///
/// ```
/// use research_core::PromptTemplate;
/// use serde_json::json;
///
/// let template = PromptTemplate::new("greeting", "Analyze {{ symbol | upper }}");
/// let prompt = template.render(&json!({ "symbol": "aapl" })).unwrap();
/// assert_eq!(prompt, "Analyze AAPL");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    name: &'static str,
    source: &'static str,
}

impl PromptTemplate {
    pub const fn new(name: &'static str, source: &'static str) -> Self {
        Self { name, source }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn render<S: Serialize>(&self, vars: &S) -> Result<String, ReasoningError> {
        render(self.name, self.source, vars)
    }
}

/// Render a template string against a serializable context
pub fn render<S: Serialize>(name: &str, source: &str, vars: &S) -> Result<String, ReasoningError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.add_filter("bullets", |items: Vec<String>| {
        items
            .iter()
            .map(|item| format!("- {item}"))
            .collect::<Vec<_>>()
            .join("\n")
    });

    let ctx = minijinja::Value::from_serialize(vars);
    env.render_str(source, ctx)
        .map_err(|e| ReasoningError::Prompt(format!("{name}: {e}")))
}
