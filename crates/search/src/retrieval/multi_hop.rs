//! Multi-hop iterative decomposition
//!
//! Each hop asks the oracle for the next sub-query given everything
//! retrieved so far. A sub-query is retrieved with both retrievers and
//! fused; the hop loop ends when the oracle signals completion or the hop
//! cap is reached, whichever comes first.

use super::HybridRetriever;
use indexmap::IndexMap;
use lexroute_common::errors::Result;
use lexroute_common::memory::ConversationMemory;
use lexroute_common::metrics;
use lexroute_common::models::Document;
use lexroute_common::oracle::{extract_as, Oracle, OutputSchema, PromptTemplate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Write as _;
use std::sync::Arc;

/// Default hop-decision prompt
pub const MULTI_HOP_PROMPT: PromptTemplate = PromptTemplate::from_static(
    "You decompose multi-step legal questions into a sequence of focused sub-queries. \
You may issue at most {max_iteration_allowed} sub-queries in total. Look at the sub-queries \
already issued and the documents they returned. If they are enough to answer the question, \
set end_of_generation to true. Otherwise set it to false and write the single next sub-query \
that fills the most important remaining gap. Never repeat a sub-query that already returned \
useful documents.

{memory}

Question: {user_query}

{subqueries_and_relevant_documents}",
);

const LEDGER_HEADER: &str = "### Subqueries + Retrieved Documents\n";

/// Oracle verdict for one hop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopDecision {
    #[serde(default)]
    pub end_of_generation: bool,
    #[serde(default)]
    pub subquery: String,
}

fn decision_schema() -> OutputSchema {
    OutputSchema::new(
        "multi_hop_decision",
        json!({
            "type": "object",
            "properties": {
                "end_of_generation": {
                    "type": "boolean",
                    "default": false,
                    "description": "True once the issued sub-queries and their documents suffice to answer the question"
                },
                "subquery": {
                    "type": "string",
                    "default": "",
                    "description": "The next self-contained sub-query; empty when end_of_generation is true"
                }
            }
        }),
    )
}

/// Insertion-ordered sub-query records.
///
/// Re-issuing a sub-query replaces its documents but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SubqueryLedger {
    records: IndexMap<String, Vec<Document>>,
}

impl SubqueryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; returns true when the sub-query was already present
    pub fn record(&mut self, subquery: impl Into<String>, documents: Vec<Document>) -> bool {
        self.records.insert(subquery.into(), documents).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, subquery: &str) -> Option<&[Document]> {
        self.records.get(subquery).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Document])> {
        self.records.iter().map(|(q, docs)| (q.as_str(), docs.as_slice()))
    }

    pub fn subqueries(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Every retained document, record by record
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.records.values().flatten()
    }

    /// Numbered transcript of every record, header included
    pub fn render(&self) -> String {
        let mut transcript = String::from(LEDGER_HEADER);
        for (index, (subquery, documents)) in self.records.iter().enumerate() {
            let contents: Vec<&str> = documents.iter().map(Document::content).collect();
            let _ = writeln!(
                transcript,
                "{}. Subquery: {}\n-> Relevant Documents:\n{}",
                index + 1,
                subquery,
                contents.join("\n")
            );
        }
        transcript
    }
}

/// Why the hop loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Oracle signalled it had enough
    EndOfGeneration,
    /// Hop cap reached
    IterationCap,
}

/// Summary of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopOutcome {
    /// Oracle decisions taken, including the final stop decision
    pub hops: usize,
    pub stop: StopReason,
}

/// Bounded iterative sub-query decomposition
pub struct MultiHopOrchestrator {
    oracle: Arc<dyn Oracle>,
    retrievers: HybridRetriever,
    top_k: usize,
    max_hops: usize,
    template: PromptTemplate,
}

impl MultiHopOrchestrator {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        retrievers: HybridRetriever,
        top_k: usize,
        max_hops: usize,
    ) -> Self {
        Self {
            oracle,
            retrievers,
            top_k,
            max_hops,
            template: MULTI_HOP_PROMPT,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    /// Run the hop loop, writing records into `ledger` as they are produced.
    ///
    /// On error the records gathered by earlier hops stay in `ledger`.
    pub async fn run(
        &self,
        query: &str,
        memory: &ConversationMemory,
        ledger: &mut SubqueryLedger,
    ) -> Result<HopOutcome> {
        let memory_text = memory.to_string();
        let budget = self.max_hops.to_string();
        let schema = decision_schema();

        let mut hops = 0;
        while hops < self.max_hops {
            hops += 1;

            let prior = if ledger.is_empty() {
                String::new()
            } else {
                ledger.render()
            };
            let prompt = self.template.render(&[
                ("max_iteration_allowed", &budget),
                ("user_query", query),
                ("memory", &memory_text),
                ("subqueries_and_relevant_documents", &prior),
            ]);

            let decision: HopDecision = extract_as(self.oracle.as_ref(), &prompt, &schema).await?;
            tracing::debug!(
                hop = hops,
                end_of_generation = decision.end_of_generation,
                subquery = %decision.subquery,
                "Hop decision"
            );

            if decision.end_of_generation {
                return Ok(self.finish(hops, StopReason::EndOfGeneration));
            }

            let documents = self
                .retrievers
                .retrieve_fused(&decision.subquery, self.top_k)
                .await?;
            let overwritten = ledger.record(decision.subquery, documents);
            if overwritten {
                tracing::debug!(hop = hops, "Repeated sub-query replaced earlier record");
            }
        }

        Ok(self.finish(hops, StopReason::IterationCap))
    }

    fn finish(&self, hops: usize, stop: StopReason) -> HopOutcome {
        metrics::record_multi_hop(hops, stop == StopReason::EndOfGeneration);
        tracing::info!(hops, stop = ?stop, "Multi-hop retrieval finished");
        HopOutcome { hops, stop }
    }

    /// Run to completion and return the rendered transcript with its ledger
    pub async fn orchestrate(
        &self,
        query: &str,
        memory: &ConversationMemory,
    ) -> Result<(String, SubqueryLedger)> {
        let mut ledger = SubqueryLedger::new();
        self.run(query, memory, &mut ledger).await?;
        Ok((ledger.render(), ledger))
    }
}
