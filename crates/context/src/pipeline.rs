//! Engine assembly
//!
//! Wires the oracle, retrievers and orchestration components together
//! from configuration. One engine is shared by every session; sessions
//! only own their memory.

use crate::responder::ResponseGenerator;
use crate::router::ComplexityRouter;
use lexroute_common::config::{AppConfig, MemoryConfig};
use lexroute_common::corpus::load_corpus;
use lexroute_common::embeddings::{create_embedder, Embedder};
use lexroute_common::errors::Result;
use lexroute_common::memory::ConversationMemory;
use lexroute_common::models::Document;
use lexroute_common::oracle::{ChatOracle, Oracle, RetryPolicy, RetryingOracle};
use lexroute_search::{
    BM25Retriever, HybridRetriever, MultiHopOrchestrator, MultiQueryExpander, VectorRetriever,
};
use std::sync::Arc;

/// Shared, immutable orchestration components
pub struct QueryEngine {
    oracle: Arc<dyn Oracle>,
    router: ComplexityRouter,
    expander: MultiQueryExpander,
    orchestrator: MultiHopOrchestrator,
    responder: ResponseGenerator,
    memory_config: MemoryConfig,
}

impl QueryEngine {
    /// Assemble from an oracle and a ready retriever pair
    pub fn new(oracle: Arc<dyn Oracle>, retrievers: HybridRetriever, config: &AppConfig) -> Self {
        let retrieval = &config.retrieval;

        Self {
            router: ComplexityRouter::new(oracle.clone()),
            expander: MultiQueryExpander::new(
                oracle.clone(),
                retrievers.clone(),
                retrieval.multi_query_top_k,
            ),
            orchestrator: MultiHopOrchestrator::new(
                oracle.clone(),
                retrievers,
                retrieval.multi_hop_top_k,
                retrieval.max_hops,
            ),
            responder: ResponseGenerator::new(oracle.clone()),
            oracle,
            memory_config: config.memory.clone(),
        }
    }

    /// Index `documents` with both retrievers and assemble the engine
    pub async fn from_documents(
        documents: Vec<Document>,
        oracle: Arc<dyn Oracle>,
        embedder: Arc<dyn Embedder>,
        config: &AppConfig,
    ) -> Result<Self> {
        let limit = config.retrieval.results_per_retriever;
        let lexical = BM25Retriever::new(documents.clone(), limit)?;
        let dense = VectorRetriever::build(documents, embedder, limit).await?;

        let retrievers = HybridRetriever::new(Arc::new(lexical), Arc::new(dense));
        Ok(Self::new(oracle, retrievers, config))
    }

    /// Build everything from configuration: corpus, embedder and the
    /// HTTP oracle behind the retry layer
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let documents = load_corpus(&config.corpus.path).await?;
        let embedder = create_embedder(&config.embedding)?;

        let chat = ChatOracle::new(&config.oracle)?;
        let oracle: Arc<dyn Oracle> = Arc::new(RetryingOracle::new(
            chat,
            RetryPolicy::from_config(&config.oracle),
        ));

        tracing::info!(
            model = oracle.model_name(),
            embedder = embedder.model_name(),
            documents = documents.len(),
            "Query engine initialising"
        );

        Self::from_documents(documents, oracle, embedder, config).await
    }

    /// Fresh memory for a new session, summarised by the engine's oracle
    pub fn new_memory(&self) -> ConversationMemory {
        ConversationMemory::from_config(self.oracle.clone(), &self.memory_config)
    }

    pub fn router(&self) -> &ComplexityRouter {
        &self.router
    }

    pub fn expander(&self) -> &MultiQueryExpander {
        &self.expander
    }

    pub fn orchestrator(&self) -> &MultiHopOrchestrator {
        &self.orchestrator
    }

    pub fn responder(&self) -> &ResponseGenerator {
        &self.responder
    }

    pub fn model_name(&self) -> &str {
        self.oracle.model_name()
    }
}
