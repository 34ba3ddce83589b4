//! Multi-query expansion
//!
//! The oracle rewrites the user query into several paraphrases, every
//! paraphrase is retrieved with both retrievers and all resulting lists
//! are fused with RRF.

use super::{fusion, HybridRetriever};
use futures::future::join_all;
use lexroute_common::errors::{AppError, Result};
use lexroute_common::memory::ConversationMemory;
use lexroute_common::metrics;
use lexroute_common::models::{Document, RankedList};
use lexroute_common::oracle::{extract_as, Oracle, OutputSchema, PromptTemplate};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// Default paraphrasing prompt
pub const MULTI_QUERY_PROMPT: PromptTemplate = PromptTemplate::from_static(
    "You help a legal research assistant search a corpus of statutes and case law. \
Rewrite the user's question into five alternative search queries that ask for the same \
information with different wording, legal terminology or emphasis. Use the conversation \
to resolve pronouns and references, but do not answer the question.

{chat_history}

User question: {user_query}",
);

#[derive(Debug, Deserialize)]
struct Paraphrases {
    #[serde(rename = "generatedQueries")]
    generated_queries: Option<Vec<String>>,
}

fn paraphrase_schema() -> OutputSchema {
    OutputSchema::new(
        "multi_query",
        json!({
            "type": "object",
            "properties": {
                "generatedQueries": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Semantically equivalent rewrites of the user query for broader retrieval coverage"
                }
            },
            "required": ["generatedQueries"]
        }),
    )
}

/// Paraphrase, retrieve and fuse
pub struct MultiQueryExpander {
    oracle: Arc<dyn Oracle>,
    retrievers: HybridRetriever,
    top_k: usize,
    template: PromptTemplate,
}

impl MultiQueryExpander {
    pub fn new(oracle: Arc<dyn Oracle>, retrievers: HybridRetriever, top_k: usize) -> Self {
        Self {
            oracle,
            retrievers,
            top_k,
            template: MULTI_QUERY_PROMPT,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Ask the oracle for paraphrases.
    ///
    /// Output that does not fit the schema, or lacks the field, degrades
    /// to a single empty query. Transport failures propagate.
    pub async fn paraphrase(&self, query: &str, memory: &ConversationMemory) -> Result<Vec<String>> {
        let chat_history = memory.to_string();
        let prompt = self
            .template
            .render(&[("chat_history", &chat_history), ("user_query", query)]);

        match extract_as::<Paraphrases, _>(self.oracle.as_ref(), &prompt, &paraphrase_schema()).await {
            Ok(Paraphrases { generated_queries: Some(queries) }) => Ok(queries),
            Ok(Paraphrases { generated_queries: None }) => Ok(vec![String::new()]),
            Err(AppError::OracleParse { message, .. }) => {
                tracing::warn!(error = %message, "Paraphrase output rejected, using empty query");
                Ok(vec![String::new()])
            }
            Err(e) => Err(e),
        }
    }

    /// Documents for `query` using the configured `top_k`
    pub async fn expand(&self, query: &str, memory: &ConversationMemory) -> Result<Vec<Document>> {
        self.expand_with(query, memory, self.top_k).await
    }

    /// Documents for `query`, keeping at most `top_k` (all when 0)
    pub async fn expand_with(
        &self,
        query: &str,
        memory: &ConversationMemory,
        top_k: usize,
    ) -> Result<Vec<Document>> {
        let start = Instant::now();
        let paraphrases = self.paraphrase(query, memory).await?;

        let retrievals = join_all(
            paraphrases
                .iter()
                .map(|paraphrase| self.retrievers.retrieve_both(paraphrase)),
        )
        .await;

        let mut lists: Vec<RankedList> = Vec::with_capacity(paraphrases.len() * 2);
        for retrieval in retrievals {
            let (lexical, dense) = retrieval?;
            lists.push(lexical);
            lists.push(dense);
        }

        let list_count = lists.len();
        let documents = fusion::fuse(lists, top_k);

        metrics::record_retrieval(start.elapsed().as_secs_f64(), "multi_query", documents.len());
        tracing::info!(
            paraphrases = paraphrases.len(),
            lists = list_count,
            documents = documents.len(),
            "Multi-query expansion complete"
        );

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{RetrievalMode, Retriever};
    use lexroute_common::oracle::{ScriptedOracle, ScriptedReply};
    use std::sync::Mutex;

    /// Returns a fixed list per query and records the queries it saw
    struct Lookup {
        mode: RetrievalMode,
        table: Vec<(&'static str, Vec<&'static str>)>,
        seen: Mutex<Vec<String>>,
    }

    impl Lookup {
        fn new(mode: RetrievalMode, table: Vec<(&'static str, Vec<&'static str>)>) -> Arc<Self> {
            Arc::new(Self { mode, table, seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait::async_trait]
    impl Retriever for Lookup {
        async fn retrieve(&self, query: &str) -> Result<RankedList> {
            self.seen.lock().unwrap().push(query.to_string());
            Ok(self
                .table
                .iter()
                .find(|(q, _)| *q == query)
                .map(|(_, docs)| docs.iter().map(|d| Document::new(*d)).collect())
                .unwrap_or_default())
        }

        fn mode(&self) -> RetrievalMode {
            self.mode
        }
    }

    fn memory() -> ConversationMemory {
        ConversationMemory::new(Arc::new(ScriptedOracle::new(vec![])), 3)
    }

    #[tokio::test]
    async fn test_three_paraphrase_scenario() {
        let oracle = Arc::new(ScriptedOracle::new(vec![ScriptedReply::Structured(json!({
            "generatedQueries": ["q1", "q2", "q3"]
        }))]));
        let lexical = Lookup::new(
            RetrievalMode::Lexical,
            vec![
                ("q1", vec!["five", "four", "three", "two"]),
                ("q2", vec!["one", "three", "two", "four"]),
                ("q3", vec!["four", "two", "one", "three"]),
            ],
        );
        let dense = Lookup::new(RetrievalMode::Dense, vec![]);
        let expander = MultiQueryExpander::new(oracle, HybridRetriever::new(lexical, dense), 3);

        let documents = expander.expand("user query", &memory()).await.unwrap();
        let contents: Vec<_> = documents.iter().map(|d| d.content()).collect();
        assert_eq!(contents, vec!["four", "three", "two"]);
    }

    #[tokio::test]
    async fn test_malformed_output_degrades_to_empty_query() {
        let oracle = Arc::new(ScriptedOracle::new(vec![ScriptedReply::Malformed("nope".into())]));
        let lexical = Lookup::new(RetrievalMode::Lexical, vec![("", vec!["fallback"])]);
        let dense = Lookup::new(RetrievalMode::Dense, vec![]);
        let expander = MultiQueryExpander::new(oracle, HybridRetriever::new(lexical.clone(), dense.clone()), 3);

        let documents = expander.expand("anything", &memory()).await.unwrap();
        assert_eq!(documents, vec![Document::new("fallback")]);
        assert_eq!(*lexical.seen.lock().unwrap(), vec![String::new()]);
        assert_eq!(*dense.seen.lock().unwrap(), vec![String::new()]);
    }

    #[tokio::test]
    async fn test_duplicate_paraphrases_compound() {
        let oracle = Arc::new(ScriptedOracle::new(vec![ScriptedReply::Structured(json!({
            "generatedQueries": ["dup", "dup", "other"]
        }))]));
        let lexical = Lookup::new(
            RetrievalMode::Lexical,
            vec![("dup", vec!["b", "a"]), ("other", vec!["a", "b"])],
        );
        let dense = Lookup::new(RetrievalMode::Dense, vec![]);
        let expander = MultiQueryExpander::new(oracle, HybridRetriever::new(lexical.clone(), dense), 0);

        let documents = expander.expand("q", &memory()).await.unwrap();
        assert_eq!(documents[0].content(), "b");
        assert_eq!(lexical.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_timeout_propagates() {
        let oracle = Arc::new(ScriptedOracle::new(vec![ScriptedReply::Timeout]));
        let lexical = Lookup::new(RetrievalMode::Lexical, vec![]);
        let dense = Lookup::new(RetrievalMode::Dense, vec![]);
        let expander = MultiQueryExpander::new(oracle, HybridRetriever::new(lexical, dense), 3);

        let err = expander.expand("q", &memory()).await.unwrap_err();
        assert!(matches!(err, AppError::OracleTimeout { .. }));
    }

    #[tokio::test]
    async fn test_prompt_carries_query_and_history() {
        let oracle = Arc::new(ScriptedOracle::new(vec![ScriptedReply::Structured(json!({
            "generatedQueries": []
        }))]));
        let lexical = Lookup::new(RetrievalMode::Lexical, vec![]);
        let dense = Lookup::new(RetrievalMode::Dense, vec![]);
        let expander = MultiQueryExpander::new(oracle.clone(), HybridRetriever::new(lexical, dense), 3);

        let documents = expander.expand("What is Section 4?", &memory()).await.unwrap();
        assert!(documents.is_empty());

        let prompt = &oracle.prompts()[0];
        assert!(prompt.contains("User question: What is Section 4?"));
        assert!(prompt.contains("Latest Conversation:"));
    }
}
