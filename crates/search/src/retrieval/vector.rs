//! Vector similarity search over precomputed embeddings
//!
//! Provides semantic search via cosine similarity

use super::{RetrievalMode, Retriever};
use lexroute_common::embeddings::{cosine_similarity, Embedder};
use lexroute_common::errors::{AppError, Result};
use lexroute_common::models::{Document, RankedList};
use std::sync::Arc;

/// Dense retriever holding one embedding per document
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    documents: Vec<Document>,
    embeddings: Vec<Vec<f32>>,
    limit: usize,
}

impl VectorRetriever {
    /// Embed the whole corpus up front
    pub async fn build(
        documents: Vec<Document>,
        embedder: Arc<dyn Embedder>,
        limit: usize,
    ) -> Result<Self> {
        if documents.is_empty() {
            return Err(AppError::EmptyCorpus {
                message: "cannot build a vector index without documents".to_string(),
            });
        }

        let texts: Vec<String> = documents.iter().map(|d| d.content().to_string()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;

        if embeddings.len() != documents.len() {
            return Err(AppError::EmbeddingError {
                message: format!(
                    "expected {} embeddings, got {}",
                    documents.len(),
                    embeddings.len()
                ),
            });
        }

        tracing::info!(
            documents = documents.len(),
            model = embedder.model_name(),
            dimension = embedder.dimension(),
            "Vector index built"
        );

        Ok(Self {
            embedder,
            documents,
            embeddings,
            limit,
        })
    }
}

#[async_trait::async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str) -> Result<RankedList> {
        let query_embedding = self.embedder.embed(query).await?;

        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(index, embedding)| (index, cosine_similarity(&query_embedding, embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(self.limit)
            .map(|(index, _)| self.documents[index].clone())
            .collect())
    }

    fn mode(&self) -> RetrievalMode {
        RetrievalMode::Dense
    }
}
