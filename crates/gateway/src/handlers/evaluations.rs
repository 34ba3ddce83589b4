//! Batch evaluation handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

use crate::AppState;
use lexroute_common::errors::{AppError, Result};
use lexroute_context::{BatchEvaluator, EvaluationRecord, EvaluationRow};

/// Evaluation request
#[derive(Debug, Deserialize, Validate)]
pub struct EvaluationRequest {
    #[validate(length(min = 1, max = 100))]
    pub rows: Vec<EvaluationRow>,

    /// Overrides `evaluation.rows_per_minute` for this batch
    #[validate(range(min = 1))]
    pub rows_per_minute: Option<u32>,
}

/// Evaluation response
#[derive(Serialize)]
pub struct EvaluationResponse {
    pub total: usize,
    pub failed: usize,
    pub records: Vec<EvaluationRecord>,
    pub processing_time_ms: u64,
}

/// Answer every row in a fresh session, paced by the rows-per-minute budget
pub async fn evaluate(
    State(state): State<AppState>,
    Json(request): Json<EvaluationRequest>,
) -> Result<Json<EvaluationResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let start = Instant::now();
    let rows_per_minute = request
        .rows_per_minute
        .unwrap_or(state.config.evaluation.rows_per_minute);
    let evaluator = BatchEvaluator::new(state.engine.clone(), rows_per_minute)?;

    tracing::info!(rows = request.rows.len(), rows_per_minute, "Evaluation started");
    let records = evaluator.evaluate_all(&request.rows).await;
    let failed = records.iter().filter(|r| r.error.is_some()).count();

    Ok(Json(EvaluationResponse {
        total: records.len(),
        failed,
        records,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}
