//! LexRoute Common Library
//!
//! Shared code for all LexRoute crates including:
//! - Document and conversation models
//! - Generative oracle abstraction, HTTP client and retry layer
//! - Conversation memory with rolling summary
//! - Embedding client abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod errors;
pub mod memory;
pub mod metrics;
pub mod models;
pub mod oracle;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use memory::ConversationMemory;
pub use models::{ConversationTurn, Document, RankedList, Role};
pub use oracle::{Oracle, OutputSchema};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
