//! Configuration management for LexRoute services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Generative oracle configuration
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Retrieval budgets
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Conversation memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Pre-chunked corpus location
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Batch evaluation configuration
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Sessions idle longer than this are evicted (0 disables)
    #[serde(default = "default_session_idle_ttl")]
    pub session_idle_ttl_secs: u64,

    /// Open sessions kept before the least recently active is evicted
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleConfig {
    /// Chat completions endpoint (OpenAI-compatible)
    #[serde(default = "default_oracle_endpoint")]
    pub endpoint: String,

    /// API key; empty for local endpoints that need none
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model to use
    #[serde(default = "default_oracle_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,

    /// Per-call timeout in seconds
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,

    /// Retry attempts after the first failure (0 disables retries)
    #[serde(default = "default_oracle_retries")]
    pub max_retries: u32,

    /// First backoff interval in milliseconds
    #[serde(default = "default_backoff_initial")]
    pub backoff_initial_ms: u64,

    /// Backoff interval ceiling in milliseconds
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Results returned by each lexical/dense retriever
    #[serde(default = "default_results_per_retriever")]
    pub results_per_retriever: usize,

    /// Documents kept after multi-query fusion
    #[serde(default = "default_multi_query_top_k")]
    pub multi_query_top_k: usize,

    /// Documents kept per hop after fusion
    #[serde(default = "default_multi_hop_top_k")]
    pub multi_hop_top_k: usize,

    /// Hard cap on multi-hop iterations
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryConfig {
    /// Exchanges kept verbatim; the window holds twice this many turns
    #[serde(default = "default_recall_depth")]
    pub recall_depth: usize,

    /// Optional cap on the full turn history
    #[serde(default)]
    pub max_history: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorpusConfig {
    /// JSON Lines file of pre-chunked documents
    #[serde(default = "default_corpus_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvaluationConfig {
    /// Rows processed per minute
    #[serde(default = "default_rows_per_minute")]
    pub rows_per_minute: u32,

    /// Input rows (JSON Lines with a `question` field)
    #[serde(default = "default_evaluation_input")]
    pub input_path: String,

    /// Output rows (question, response, retrieved_contexts)
    #[serde(default = "default_evaluation_output")]
    pub output_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 300 }
fn default_session_idle_ttl() -> u64 { 1_800 }
fn default_max_sessions() -> usize { 10_000 }
fn default_oracle_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_oracle_model() -> String { "gpt-4o-mini".to_string() }
fn default_oracle_timeout() -> u64 { 60 }
fn default_oracle_retries() -> u32 { 2 }
fn default_backoff_initial() -> u64 { 500 }
fn default_backoff_max() -> u64 { 8_000 }
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { 1536 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_batch_size() -> usize { 100 }
fn default_results_per_retriever() -> usize { 10 }
fn default_multi_query_top_k() -> usize { 3 }
fn default_multi_hop_top_k() -> usize { 7 }
fn default_max_hops() -> usize { 5 }
fn default_recall_depth() -> usize { 3 }
fn default_corpus_path() -> String { "data/corpus.jsonl".to_string() }
fn default_rows_per_minute() -> u32 { 1 }
fn default_evaluation_input() -> String { "data/eval-dataset.jsonl".to_string() }
fn default_evaluation_output() -> String { "data/eval-dataset-final.jsonl".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "lexroute".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env file is fine
        dotenvy::dotenv().ok();

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__ORACLE__MODEL=command-r
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Idle time after which a session is evicted, if any
    pub fn session_idle_ttl(&self) -> Option<Duration> {
        (self.server.session_idle_ttl_secs > 0)
            .then(|| Duration::from_secs(self.server.session_idle_ttl_secs))
    }

    /// Number of turns kept verbatim in the memory window
    pub fn memory_window(&self) -> usize {
        self.memory.recall_depth * 2
    }
}

impl OracleConfig {
    /// Per-call timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            session_idle_ttl_secs: default_session_idle_ttl(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: default_oracle_endpoint(),
            api_key: None,
            model: default_oracle_model(),
            temperature: 0.0,
            timeout_secs: default_oracle_timeout(),
            max_retries: default_oracle_retries(),
            backoff_initial_ms: default_backoff_initial(),
            backoff_max_ms: default_backoff_max(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            results_per_retriever: default_results_per_retriever(),
            multi_query_top_k: default_multi_query_top_k(),
            multi_hop_top_k: default_multi_hop_top_k(),
            max_hops: default_max_hops(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            recall_depth: default_recall_depth(),
            max_history: None,
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self { path: default_corpus_path() }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            rows_per_minute: default_rows_per_minute(),
            input_path: default_evaluation_input(),
            output_path: default_evaluation_output(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            oracle: OracleConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            memory: MemoryConfig::default(),
            corpus: CorpusConfig::default(),
            evaluation: EvaluationConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
