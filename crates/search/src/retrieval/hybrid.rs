//! Hybrid retrieval pairing a lexical and a dense retriever
//!
//! Both retrievers run concurrently for one query; their lists stay
//! separate so callers decide how to fuse them.

use super::{fusion, Retriever};
use lexroute_common::errors::Result;
use lexroute_common::metrics;
use lexroute_common::models::{Document, RankedList};
use std::sync::Arc;
use std::time::Instant;

/// Lexical + dense retriever pair
#[derive(Clone)]
pub struct HybridRetriever {
    lexical: Arc<dyn Retriever>,
    dense: Arc<dyn Retriever>,
}

impl HybridRetriever {
    pub fn new(lexical: Arc<dyn Retriever>, dense: Arc<dyn Retriever>) -> Self {
        Self { lexical, dense }
    }

    /// Run both retrievers for one query, lexical list first
    pub async fn retrieve_both(&self, query: &str) -> Result<(RankedList, RankedList)> {
        let start = Instant::now();

        // Execute both searches in parallel
        let (lexical, dense) = tokio::join!(
            self.lexical.retrieve(query),
            self.dense.retrieve(query)
        );
        let (lexical, dense) = (lexical?, dense?);

        metrics::record_retrieval(
            start.elapsed().as_secs_f64(),
            "hybrid",
            lexical.len() + dense.len(),
        );
        tracing::debug!(
            query,
            lexical = lexical.len(),
            dense = dense.len(),
            "Hybrid retrieval complete"
        );

        Ok((lexical, dense))
    }

    /// Retrieve with both and fuse the two lists
    pub async fn retrieve_fused(&self, query: &str, top_k: usize) -> Result<Vec<Document>> {
        let (lexical, dense) = self.retrieve_both(query).await?;
        Ok(fusion::fuse([lexical, dense], top_k))
    }
}
