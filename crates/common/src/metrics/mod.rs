//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with latency histograms sized for
//! oracle-bound work and standardized naming conventions.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram,
    gauge, histogram, Unit,
};
use std::time::Instant;

/// Metrics prefix for all LexRoute metrics
pub const METRICS_PREFIX: &str = "lexroute";

/// Histogram buckets for in-process retrieval latency (in seconds)
pub const RETRIEVAL_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
];

/// Buckets for oracle calls and full turns (model latency dominates)
pub const ORACLE_BUCKETS: &[f64] = &[
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    20.00,  // 20s
    30.00,  // 30s
    60.00,  // 60s
    120.0,  // 2m
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Oracle metrics
    describe_counter!(
        format!("{}_oracle_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Total generative oracle calls"
    );

    describe_histogram!(
        format!("{}_oracle_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Oracle call latency in seconds"
    );

    describe_counter!(
        format!("{}_oracle_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total failed oracle calls"
    );

    // Routing metrics
    describe_counter!(
        format!("{}_route_decisions_total", METRICS_PREFIX),
        Unit::Count,
        "Queries routed per complexity tier"
    );

    // Retrieval metrics
    describe_counter!(
        format!("{}_retrieval_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total retrieval queries per strategy"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Retrieval latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of documents returned by the last retrieval"
    );

    describe_histogram!(
        format!("{}_multi_hop_hops", METRICS_PREFIX),
        Unit::Count,
        "Hops executed per multi-hop run"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding errors"
    );

    // Session metrics
    describe_histogram!(
        format!("{}_turn_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end latency of one conversational turn"
    );

    describe_counter!(
        format!("{}_memory_summaries_total", METRICS_PREFIX),
        Unit::Count,
        "Rolling summary refreshes"
    );

    describe_gauge!(
        format!("{}_sessions_active", METRICS_PREFIX),
        Unit::Count,
        "Open conversational sessions"
    );

    describe_counter!(
        format!("{}_sessions_evicted_total", METRICS_PREFIX),
        Unit::Count,
        "Sessions dropped for inactivity or capacity"
    );

    describe_counter!(
        format!("{}_evaluation_rows_total", METRICS_PREFIX),
        Unit::Count,
        "Batch evaluation rows processed"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

fn status_label(success: bool) -> &'static str {
    if success { "success" } else { "error" }
}

/// Helper to record oracle metrics
pub fn record_oracle_call(duration_secs: f64, model: &str, kind: &str, success: bool) {
    counter!(
        format!("{}_oracle_calls_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "kind" => kind.to_string(),
        "status" => status_label(success)
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_oracle_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string(),
            "kind" => kind.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_oracle_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Helper to record a routing decision
pub fn record_route(tier: &str) {
    counter!(
        format!("{}_route_decisions_total", METRICS_PREFIX),
        "tier" => tier.to_string()
    )
    .increment(1);
}

/// Helper to record retrieval metrics
pub fn record_retrieval(duration_secs: f64, strategy: &str, result_count: usize) {
    counter!(
        format!("{}_retrieval_queries_total", METRICS_PREFIX),
        "strategy" => strategy.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        "strategy" => strategy.to_string()
    )
    .record(duration_secs);

    gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        "strategy" => strategy.to_string()
    )
    .set(result_count as f64);
}

/// Helper to record how many hops a multi-hop run took
pub fn record_multi_hop(hops: usize, stopped_early: bool) {
    histogram!(
        format!("{}_multi_hop_hops", METRICS_PREFIX),
        "stopped_early" => stopped_early.to_string()
    )
    .record(hops as f64);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status_label(success)
    )
    .increment(batch_size as u64);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Helper to record a full turn
pub fn record_turn(duration_secs: f64, tier: &str) {
    histogram!(
        format!("{}_turn_duration_seconds", METRICS_PREFIX),
        "tier" => tier.to_string()
    )
    .record(duration_secs);
}

/// Helper to record a rolling summary refresh
pub fn record_summary(success: bool) {
    counter!(
        format!("{}_memory_summaries_total", METRICS_PREFIX),
        "status" => status_label(success)
    )
    .increment(1);
}

pub fn set_active_sessions(count: usize) {
    gauge!(format!("{}_sessions_active", METRICS_PREFIX)).set(count as f64);
}

/// Helper to record evicted sessions; `reason` is `idle` or `capacity`
pub fn record_sessions_evicted(count: usize, reason: &'static str) {
    counter!(
        format!("{}_sessions_evicted_total", METRICS_PREFIX),
        "reason" => reason
    )
    .increment(count as u64);
}

pub fn record_evaluation_row(success: bool) {
    counter!(
        format!("{}_evaluation_rows_total", METRICS_PREFIX),
        "status" => status_label(success)
    )
    .increment(1);
}
