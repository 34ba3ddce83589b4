//! Retrieval system
//!
//! Provides two base retrievers over an in-memory corpus and the
//! orchestration built on top of them:
//! - BM25 search (lexical matching)
//! - Vector search (semantic similarity via embeddings)
//! - Hybrid per-query retrieval running both concurrently
//! - RRF fusion, multi-query expansion and multi-hop decomposition

mod bm25;
mod fusion;
mod hybrid;
mod multi_hop;
mod multi_query;
mod vector;

pub use bm25::{tokenize, BM25Retriever};
pub use fusion::{fuse, fuse_scored, FusionResult, RRF_K};
pub use hybrid::HybridRetriever;
pub use multi_hop::{
    HopDecision, HopOutcome, MultiHopOrchestrator, StopReason, SubqueryLedger, MULTI_HOP_PROMPT,
};
pub use multi_query::{MultiQueryExpander, MULTI_QUERY_PROMPT};
pub use vector::VectorRetriever;

use lexroute_common::errors::Result;
use lexroute_common::models::RankedList;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Retrieval mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// BM25 lexical search
    Lexical,
    /// Embedding similarity search
    Dense,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Lexical => "lexical",
            RetrievalMode::Dense => "dense",
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common trait for all retrievers
///
/// The result size is fixed when the retriever is built.
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve documents for the query, best first
    async fn retrieve(&self, query: &str) -> Result<RankedList>;

    /// Get the retrieval mode
    fn mode(&self) -> RetrievalMode;
}
