//! LexRoute API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Conversation sessions and their turns
//! - Batch evaluation runs
//! - Rate limiting
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;
mod state;

use anyhow::Context;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use lexroute_common::{
    config::AppConfig,
    metrics::{self, METRICS_PREFIX, ORACLE_BUCKETS, RETRIEVAL_BUCKETS},
};
use lexroute_context::{telemetry::init_tracing, QueryEngine};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

pub use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting LexRoute API Gateway v{}",
        lexroute_common::VERSION
    );

    // Initialize metrics
    install_metrics_exporter(config.observability.metrics_port)?;
    metrics::register_metrics();

    // Index the corpus and connect the oracle before accepting traffic
    info!(corpus = %config.corpus.path, "Building query engine...");
    let engine = QueryEngine::from_config(&config)
        .await
        .context("Failed to build query engine")?;

    let config = Arc::new(config);
    let state = AppState::new(config.clone(), Arc::new(engine));

    // Abandoned sessions are dropped after the idle TTL
    if state.sessions.spawn_idle_sweeper().is_some() {
        info!(ttl_secs = config.server.session_idle_ttl_secs, "Idle session sweeper started");
    }

    // Build the router
    let app = create_router(state)?;

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host/server.port")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Serve Prometheus metrics on their own port
fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)),
            RETRIEVAL_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_oracle_duration_seconds", METRICS_PREFIX)),
            ORACLE_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_turn_duration_seconds", METRICS_PREFIX)),
            ORACLE_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> anyhow::Result<Router> {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Session routes answer interactively, so they get the request timeout.
    // Evaluation batches are paced over minutes and run without one.
    let session_routes = Router::new()
        .route("/sessions", post(handlers::sessions::create_session))
        .route(
            "/sessions/{id}",
            get(handlers::sessions::get_session).delete(handlers::sessions::delete_session),
        )
        .route("/sessions/{id}/turns", post(handlers::sessions::create_turn))
        .route_layer(TimeoutLayer::new(state.config.request_timeout()));

    // API routes
    let mut api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Evaluation endpoints
        .route("/evaluations", post(handlers::evaluations::evaluate))
        .merge(session_routes)
        .route_layer(from_fn(middleware::metrics::track_metrics));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(&state.config.rate_limit)?;
        api_routes = api_routes.route_layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    let observability = ServiceBuilder::new()
        .layer(request_id)
        .layer(propagate_id)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Compose the app
    Ok(Router::new()
        .nest("/v2", api_routes)
        .layer(observability)
        .with_state(state))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
