//! Generative oracle abstraction
//!
//! Every model-backed step (classification, paraphrasing, hop decisions,
//! summarisation, answering) goes through the [`Oracle`] trait, which offers
//! two capability shapes:
//! - unconstrained text completion
//! - schema-constrained structured extraction
//!
//! Implementations are interchangeable: [`ChatOracle`] talks to an
//! OpenAI-compatible endpoint, [`RetryingOracle`] layers backoff over any
//! oracle, and [`ScriptedOracle`] replays canned replies for tests.

mod chat;
mod prompt;
mod retry;
mod scripted;

pub use chat::ChatOracle;
pub use prompt::PromptTemplate;
pub use retry::{RetryPolicy, RetryingOracle};
pub use scripted::{ScriptedOracle, ScriptedReply};

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, OnceLock};

/// Trait for generative model access
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Free-form completion for a fully rendered prompt
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Structured extraction; the returned value is a JSON object shaped by `schema`
    async fn extract(&self, prompt: &str, schema: &OutputSchema) -> Result<Value>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

#[async_trait]
impl<T: Oracle + ?Sized> Oracle for Arc<T> {
    async fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt).await
    }

    async fn extract(&self, prompt: &str, schema: &OutputSchema) -> Result<Value> {
        (**self).extract(prompt, schema).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// JSON schema describing a structured oracle result
#[derive(Debug, Clone)]
pub struct OutputSchema {
    name: String,
    schema: Value,
}

impl OutputSchema {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Instructions appended to a prompt so the model answers in this shape
    pub fn format_instructions(&self) -> String {
        let rendered = serde_json::to_string_pretty(&self.schema).unwrap_or_else(|_| self.schema.to_string());
        format!(
            "The output should be formatted as a JSON instance that conforms to the JSON schema below.\n\
            Respond with the JSON object only.\n\n\
            Here is the output schema:\n```\n{}\n```",
            rendered
        )
    }
}

/// Extract and deserialize into a typed result.
///
/// Deserialization failures surface as [`AppError::OracleParse`], the same
/// as output that was not JSON at all.
pub async fn extract_as<T, O>(oracle: &O, prompt: &str, schema: &OutputSchema) -> Result<T>
where
    T: DeserializeOwned,
    O: Oracle + ?Sized,
{
    let value = oracle.extract(prompt, schema).await?;
    serde_json::from_value(value).map_err(|e| AppError::OracleParse {
        schema: schema.name().to_string(),
        message: e.to_string(),
    })
}

fn fenced_block() -> Option<&'static regex_lite::Regex> {
    static FENCE: OnceLock<Option<regex_lite::Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| regex_lite::Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").ok())
        .as_ref()
}

/// Parse raw model output into the JSON object requested by `schema`.
///
/// Accepts bare JSON, JSON inside a fenced code block, or JSON embedded in
/// surrounding prose (first `{` to last `}`).
pub fn parse_structured(raw: &str, schema: &OutputSchema) -> Result<Value> {
    let parse_error = |message: String| AppError::OracleParse {
        schema: schema.name().to_string(),
        message,
    };

    let trimmed = raw.trim();
    let candidate = match fenced_block()
        .and_then(|fence| fence.captures(trimmed))
        .and_then(|c| c.get(1))
    {
        Some(inner) => inner.as_str(),
        None => match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => &trimmed[start..=end],
            _ => trimmed,
        },
    };

    let value: Value = serde_json::from_str(candidate)
        .map_err(|e| parse_error(format!("output is not JSON: {}", e)))?;

    if !value.is_object() {
        return Err(parse_error(format!("expected a JSON object, got {}", value)));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn schema() -> OutputSchema {
        OutputSchema::new("decision", json!({"type": "object"}))
    }

    #[test]
    fn test_parse_bare_json() {
        let value = parse_structured(r#"{"complexity": "complex"}"#, &schema()).unwrap();
        assert_eq!(value["complexity"], "complex");
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "Here you go:\n```json\n{\"end_of_generation\": true, \"subquery\": \"\"}\n```";
        let value = parse_structured(raw, &schema()).unwrap();
        assert_eq!(value["end_of_generation"], true);
    }

    #[test]
    fn test_parse_embedded_json() {
        let raw = "Sure. {\"generatedQueries\": [\"a\", \"b\"]} Hope that helps.";
        let value = parse_structured(raw, &schema()).unwrap();
        assert_eq!(value["generatedQueries"][1], "b");
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let err = parse_structured("[1, 2, 3]", &schema()).unwrap_err();
        assert!(matches!(err, AppError::OracleParse { .. }));

        let err = parse_structured("I cannot answer that.", &schema()).unwrap_err();
        assert!(matches!(err, AppError::OracleParse { .. }));
    }

    #[test]
    fn test_format_instructions_embed_schema() {
        let instructions = schema().format_instructions();
        assert!(instructions.contains("\"type\": \"object\""));
    }

    #[derive(Debug, Deserialize)]
    struct Flag {
        flag: bool,
    }

    #[tokio::test]
    async fn test_extract_as_maps_shape_mismatch_to_parse_error() {
        let oracle = ScriptedOracle::new(vec![ScriptedReply::Structured(json!({"flag": "yes"}))]);
        let err = extract_as::<Flag, _>(&oracle, "prompt", &schema()).await.unwrap_err();
        assert!(matches!(err, AppError::OracleParse { .. }));

        let oracle = ScriptedOracle::new(vec![ScriptedReply::Structured(json!({"flag": true}))]);
        let flag: Flag = extract_as(&oracle, "prompt", &schema()).await.unwrap();
        assert!(flag.flag);
    }
}
