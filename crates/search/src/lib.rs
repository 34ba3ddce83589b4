//! LexRoute retrieval
//!
//! Lexical and dense retrievers over an in-memory corpus, reciprocal rank
//! fusion, and the two retrieval strategies the router dispatches to:
//! multi-query expansion and multi-hop decomposition.

pub mod retrieval;

pub use retrieval::{
    fuse, BM25Retriever, HybridRetriever, MultiHopOrchestrator, MultiQueryExpander, Retriever,
    SubqueryLedger, VectorRetriever,
};
