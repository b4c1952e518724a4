//! Response schemas for structured reasoning
//!
//! Every reasoning call names the shape it expects back. The reasoner is told
//! the shape through [`ResponseSchema::describe`] and the returned JSON is
//! checked with [`ResponseSchema::validate`] before it is decoded.

use serde::Serialize;
use serde_json::Value;

use crate::error::SchemaViolation;

/// JSON shape of one response field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    TextList,
    /// Number within [0, 1]
    Score,
    Number,
    Object,
    ObjectList,
}

impl FieldKind {
    fn placeholder(self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::TextList => "array of strings",
            Self::Score => "number between 0 and 1",
            Self::Number => "number",
            Self::Object => "object",
            Self::ObjectList => "array of objects",
        }
    }
}

/// One field of a response schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Required fields must be present, non-null and non-empty
    pub required: bool,
    pub description: &'static str,
}

/// Named response shape passed to every reasoning call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseSchema {
    pub name: &'static str,
    pub fields: Vec<FieldSpec>,
}

impl ResponseSchema {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    /// Add a required field
    pub fn field(mut self, name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        self.fields.push(FieldSpec {
            name,
            kind,
            required: true,
            description,
        });
        self
    }

    /// Add a field that may be absent or empty
    pub fn optional(
        mut self,
        name: &'static str,
        kind: FieldKind,
        description: &'static str,
    ) -> Self {
        self.fields.push(FieldSpec {
            name,
            kind,
            required: false,
            description,
        });
        self
    }

    /// Field-by-field description embedded into prompts
    pub fn describe(&self) -> String {
        let mut out = String::from("Respond with a single JSON object with these fields:\n");
        for field in &self.fields {
            out.push_str(&format!(
                "- \"{}\" ({}{}): {}\n",
                field.name,
                field.kind.placeholder(),
                if field.required { ", required" } else { "" },
                field.description
            ));
        }
        out
    }

    /// Check a reasoning response against this schema
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        let object = value.as_object().ok_or(SchemaViolation::NotAnObject)?;

        for field in &self.fields {
            match object.get(field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(SchemaViolation::MissingField(field.name.to_string()));
                    }
                }
                Some(v) => check_field(field, v)?,
            }
        }
        Ok(())
    }
}

fn check_field(field: &FieldSpec, value: &Value) -> Result<(), SchemaViolation> {
    let wrong_type = || SchemaViolation::WrongType {
        field: field.name.to_string(),
        expected: field.kind,
    };
    let empty = || SchemaViolation::EmptyField(field.name.to_string());

    match field.kind {
        FieldKind::Text => {
            let text = value.as_str().ok_or_else(wrong_type)?;
            if field.required && text.trim().is_empty() {
                return Err(empty());
            }
        }
        FieldKind::TextList => {
            let items = value.as_array().ok_or_else(wrong_type)?;
            if !items.iter().all(Value::is_string) {
                return Err(wrong_type());
            }
            if field.required && items.is_empty() {
                return Err(empty());
            }
        }
        FieldKind::Score => {
            let score = value.as_f64().ok_or_else(wrong_type)?;
            if !(0.0..=1.0).contains(&score) {
                return Err(SchemaViolation::OutOfRange {
                    field: field.name.to_string(),
                    value: score,
                });
            }
        }
        FieldKind::Number => {
            value.as_f64().ok_or_else(wrong_type)?;
        }
        FieldKind::Object => {
            value.as_object().ok_or_else(wrong_type)?;
        }
        FieldKind::ObjectList => {
            let items = value.as_array().ok_or_else(wrong_type)?;
            if !items.iter().all(Value::is_object) {
                return Err(wrong_type());
            }
            if field.required && items.is_empty() {
                return Err(empty());
            }
        }
    }
    Ok(())
}

/// Schema catalog shared by the planner, specialists, workflows and reflection
pub mod catalog {
    use super::{FieldKind, ResponseSchema};

    pub const RESEARCH_PLAN: &str = "research_plan";
    pub const AGENT_ANALYSIS: &str = "agent_analysis";
    pub const ROUTE: &str = "route";
    pub const FACTS: &str = "facts";
    pub const SUMMARY: &str = "summary";
    pub const EVALUATION: &str = "evaluation";
    pub const REVISION: &str = "revision";
    pub const QUALITY_ASSESSMENT: &str = "quality_assessment";

    pub fn research_plan() -> ResponseSchema {
        ResponseSchema::new(RESEARCH_PLAN)
            .field("objectives", FieldKind::TextList, "research objectives")
            .field(
                "steps",
                FieldKind::ObjectList,
                "analysis steps, each {\"description\": string, \"data_source\": one of \"yahoo_finance\", \"alpha_vantage\", \"fred\", \"sec_edgar\"}",
            )
            .optional(
                "expected_outputs",
                FieldKind::TextList,
                "deliverables the research should produce",
            )
            .field("rationale", FieldKind::Text, "why this plan fits the topic")
    }

    pub fn agent_analysis() -> ResponseSchema {
        ResponseSchema::new(AGENT_ANALYSIS)
            .field("findings", FieldKind::TextList, "key findings from the data")
            .optional(
                "recommendations",
                FieldKind::TextList,
                "actionable recommendations",
            )
            .field("confidence", FieldKind::Score, "confidence in the findings")
    }

    pub fn route() -> ResponseSchema {
        ResponseSchema::new(ROUTE)
            .field("role", FieldKind::Text, "exactly one specialist role name")
            .field("rationale", FieldKind::Text, "why this specialist fits the query")
    }

    pub fn facts() -> ResponseSchema {
        ResponseSchema::new(FACTS).field(
            "facts",
            FieldKind::TextList,
            "atomic facts extracted from the corpus",
        )
    }

    pub fn summary() -> ResponseSchema {
        ResponseSchema::new(SUMMARY).field("summary", FieldKind::Text, "concise research summary")
    }

    pub fn evaluation() -> ResponseSchema {
        ResponseSchema::new(EVALUATION)
            .field("score", FieldKind::Score, "quality score of the draft")
            .optional("critique", FieldKind::TextList, "specific weaknesses to fix")
    }

    pub fn revision() -> ResponseSchema {
        ResponseSchema::new(REVISION).field(
            "revised_artifact",
            FieldKind::Text,
            "the improved draft addressing the critique",
        )
    }

    pub fn quality_assessment() -> ResponseSchema {
        ResponseSchema::new(QUALITY_ASSESSMENT)
            .field("overall_score", FieldKind::Score, "overall research quality")
            .optional("strengths", FieldKind::TextList, "what the research did well")
            .optional("weaknesses", FieldKind::TextList, "gaps and weaknesses")
            .optional(
                "suggested_improvements",
                FieldKind::TextList,
                "improvements for future runs",
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_accepts_conforming_response() {
        let schema = catalog::agent_analysis();
        let value = json!({
            "findings": ["Revenue grew 8%"],
            "confidence": 0.7
        });
        assert!(schema.validate(&value).is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_and_empty_fields() {
        let schema = catalog::agent_analysis();

        assert_eq!(
            schema.validate(&json!({ "confidence": 0.5 })),
            Err(SchemaViolation::MissingField("findings".to_string()))
        );
        assert_eq!(
            schema.validate(&json!({ "findings": [], "confidence": 0.5 })),
            Err(SchemaViolation::EmptyField("findings".to_string()))
        );
        assert_eq!(
            schema.validate(&json!(["not", "an", "object"])),
            Err(SchemaViolation::NotAnObject)
        );
    }

    #[test]
    fn test_validate_rejects_wrong_types() {
        let schema = catalog::agent_analysis();
        let err = schema
            .validate(&json!({ "findings": [1, 2], "confidence": 0.5 }))
            .unwrap_err();
        assert!(matches!(err, SchemaViolation::WrongType { .. }));

        let err = schema
            .validate(&json!({ "findings": ["a"], "confidence": "high" }))
            .unwrap_err();
        assert!(matches!(err, SchemaViolation::WrongType { .. }));
    }

    #[test]
    fn test_score_must_be_in_unit_interval() {
        let schema = catalog::evaluation();
        let err = schema.validate(&json!({ "score": 1.4 })).unwrap_err();
        assert!(matches!(err, SchemaViolation::OutOfRange { .. }));
        assert!(schema.validate(&json!({ "score": 1 })).is_ok());
    }

    #[test]
    fn test_plan_requires_steps() {
        let schema = catalog::research_plan();
        let value = json!({
            "objectives": ["Assess valuation"],
            "steps": [],
            "rationale": "because"
        });
        assert_eq!(
            schema.validate(&value),
            Err(SchemaViolation::EmptyField("steps".to_string()))
        );
    }

    #[test]
    fn test_describe_lists_fields() {
        let text = catalog::route().describe();
        assert!(text.contains("\"role\" (string, required)"));
        assert!(text.contains("\"rationale\""));
    }
}
