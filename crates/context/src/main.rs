//! LexRoute batch evaluation
//!
//! Reads questions from `evaluation.input_path`, answers each in a fresh
//! session and writes answers plus retrieved contexts to
//! `evaluation.output_path`. Both paths may be overridden positionally:
//! `evaluate [INPUT] [OUTPUT]`.

use anyhow::Context;
use lexroute_common::{config::AppConfig, VERSION};
use lexroute_context::{
    evaluation::{read_rows, write_records},
    telemetry, BatchEvaluator, QueryEngine,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (also reads .env)
    let mut config = AppConfig::load().context("failed to load configuration")?;

    telemetry::init_tracing(&config.observability);
    info!("Starting LexRoute evaluation v{}", VERSION);

    let mut args = std::env::args().skip(1);
    if let Some(input) = args.next() {
        config.evaluation.input_path = input;
    }
    if let Some(output) = args.next() {
        config.evaluation.output_path = output;
    }

    let rows = read_rows(&config.evaluation.input_path)
        .await
        .with_context(|| format!("failed to read {}", config.evaluation.input_path))?;
    info!(rows = rows.len(), input = %config.evaluation.input_path, "Dataset loaded");

    let engine = Arc::new(QueryEngine::from_config(&config).await?);
    let evaluator = BatchEvaluator::new(engine, config.evaluation.rows_per_minute)?;

    let records = evaluator.evaluate_all(&rows).await;
    let failed = records.iter().filter(|r| r.error.is_some()).count();

    write_records(&config.evaluation.output_path, &records).await?;

    info!(
        rows = records.len(),
        failed,
        output = %config.evaluation.output_path,
        "Evaluation complete"
    );
    Ok(())
}
