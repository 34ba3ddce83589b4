//! Query complexity routing
//!
//! One schema-constrained oracle call decides which retrieval path a
//! query takes. There is no retry here; retries belong to the oracle.

use lexroute_common::errors::{AppError, Result};
use lexroute_common::memory::ConversationMemory;
use lexroute_common::metrics;
use lexroute_common::oracle::{Oracle, OutputSchema, PromptTemplate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// Default classification prompt
pub const COMPLEXITY_PROMPT: PromptTemplate = PromptTemplate::from_static(
    "You route questions for a legal research assistant. Decide how much retrieval the \
latest user message needs, using the conversation for context.

- simple_conversation: greetings, thanks, chit-chat or anything that needs no documents.
- complex: a legal question answerable from the corpus with one round of retrieval.
- multi_hop: a question that chains several facts, provisions or conditions, where each \
step depends on what the previous one found.

{memory}

Latest user message: {user_query}",
);

const DEFAULT_TIER: &str = "simple_conversation";

/// Complexity tier chosen for a query
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComplexityTier {
    #[default]
    SimpleConversation,
    Complex,
    MultiHop,
    /// Any other label the oracle produced, kept verbatim
    Unrecognized(String),
}

impl ComplexityTier {
    pub fn from_label(label: &str) -> Self {
        match label {
            "simple_conversation" => ComplexityTier::SimpleConversation,
            "complex" => ComplexityTier::Complex,
            "multi_hop" => ComplexityTier::MultiHop,
            other => ComplexityTier::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ComplexityTier::SimpleConversation => "simple_conversation",
            ComplexityTier::Complex => "complex",
            ComplexityTier::MultiHop => "multi_hop",
            ComplexityTier::Unrecognized(label) => label,
        }
    }

    /// Tiers answered with the canned out-of-scope reply
    pub fn is_out_of_scope(&self) -> bool {
        matches!(
            self,
            ComplexityTier::SimpleConversation | ComplexityTier::Unrecognized(_)
        )
    }
}

impl From<String> for ComplexityTier {
    fn from(label: String) -> Self {
        ComplexityTier::from_label(&label)
    }
}

impl From<ComplexityTier> for String {
    fn from(tier: ComplexityTier) -> Self {
        tier.as_str().to_string()
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn complexity_schema() -> OutputSchema {
    OutputSchema::new(
        "query_complexity",
        json!({
            "type": "object",
            "properties": {
                "complexity": {
                    "type": "string",
                    "enum": ["simple_conversation", "complex", "multi_hop"],
                    "default": DEFAULT_TIER,
                    "description": "simple_conversation needs no retrieval; complex triggers multi-query retrieval with rank fusion; multi_hop triggers iterative sub-query retrieval"
                }
            }
        }),
    )
}

/// Classifies queries into complexity tiers
pub struct ComplexityRouter {
    oracle: Arc<dyn Oracle>,
    template: PromptTemplate,
}

impl ComplexityRouter {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            template: COMPLEXITY_PROMPT,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Classify `query` in the context of `memory`.
    ///
    /// A missing `complexity` field means `simple_conversation`. Output
    /// that cannot be read as the schema is a [`AppError::Classification`];
    /// transport failures pass through unchanged.
    pub async fn classify(&self, query: &str, memory: &ConversationMemory) -> Result<ComplexityTier> {
        let memory_text = memory.to_string();
        let prompt = self
            .template
            .render(&[("memory", &memory_text), ("user_query", query)]);

        let value = self
            .oracle
            .extract(&prompt, &complexity_schema())
            .await
            .map_err(|e| match e {
                AppError::OracleParse { message, .. } => AppError::Classification { message },
                other => other,
            })?;

        let tier = match value.get("complexity") {
            None | Some(Value::Null) => ComplexityTier::SimpleConversation,
            Some(Value::String(label)) => ComplexityTier::from_label(label),
            Some(other) => {
                return Err(AppError::Classification {
                    message: format!("complexity must be a string, got {}", other),
                })
            }
        };

        metrics::record_route(tier.as_str());
        tracing::info!(tier = %tier, "Query classified");
        Ok(tier)
    }
}
