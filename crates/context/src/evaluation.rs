//! Batch evaluation
//!
//! Runs every question of a dataset through its own fresh session and
//! records the answer plus the retrieved contexts, ready for offline
//! scoring. Every row gets a generated answer, whatever its tier. Rows are paced with a rate limiter since each one costs
//! several oracle calls.

use crate::pipeline::QueryEngine;
use crate::router::ComplexityTier;
use crate::session::Session;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lexroute_common::errors::{AppError, Result};
use lexroute_common::metrics;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// One dataset row; extra columns are carried through to the output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub question: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EvaluationRow {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            extra: Map::new(),
        }
    }
}

/// Output row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<ComplexityTier>,
    pub response: String,
    pub retrieved_contexts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Evaluates rows one at a time under a rows-per-minute budget
pub struct BatchEvaluator {
    engine: Arc<QueryEngine>,
    limiter: DefaultDirectRateLimiter,
}

impl BatchEvaluator {
    pub fn new(engine: Arc<QueryEngine>, rows_per_minute: u32) -> Result<Self> {
        let rate = NonZeroU32::new(rows_per_minute).ok_or_else(|| AppError::Configuration {
            message: "evaluation.rows_per_minute must be at least 1".to_string(),
        })?;

        Ok(Self {
            engine,
            limiter: RateLimiter::direct(Quota::per_minute(rate)),
        })
    }

    /// Answer one question in a fresh session
    pub async fn evaluate_row(&self, row: &EvaluationRow) -> Result<EvaluationRecord> {
        let mut session = Session::start_for_evaluation(self.engine.clone()).await;
        let outcome = session.handle_turn(&row.question).await?;

        Ok(EvaluationRecord {
            question: row.question.clone(),
            retrieved_contexts: outcome.context.retrieved_contexts(),
            tier: Some(outcome.tier),
            response: outcome.response,
            error: None,
            extra: row.extra.clone(),
        })
    }

    /// Evaluate every row in order.
    ///
    /// A failing row is recorded with its error and an empty response;
    /// it does not stop the batch.
    pub async fn evaluate_all(&self, rows: &[EvaluationRow]) -> Vec<EvaluationRecord> {
        let mut records = Vec::with_capacity(rows.len());

        for (index, row) in rows.iter().enumerate() {
            self.limiter.until_ready().await;

            let record = match self.evaluate_row(row).await {
                Ok(record) => {
                    metrics::record_evaluation_row(true);
                    record
                }
                Err(e) => {
                    metrics::record_evaluation_row(false);
                    tracing::warn!(row = index + 1, error = %e, "Evaluation row failed");
                    EvaluationRecord {
                        question: row.question.clone(),
                        tier: None,
                        response: String::new(),
                        retrieved_contexts: Vec::new(),
                        error: Some(e.to_string()),
                        extra: row.extra.clone(),
                    }
                }
            };

            tracing::info!(row = index + 1, total = rows.len(), "Evaluation row done");
            records.push(record);
        }

        records
    }
}

/// Read JSON Lines rows, skipping blank lines
pub async fn read_rows(path: impl AsRef<Path>) -> Result<Vec<EvaluationRow>> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await?;

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| AppError::InvalidFormat {
                message: format!("{} line {}: {}", path.display(), index + 1, e),
            })
        })
        .collect()
}

/// Write records as JSON Lines, replacing the file
pub async fn write_records(path: impl AsRef<Path>, records: &[EvaluationRecord]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(path).await?;
    for record in records {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        file.write_all(&line).await?;
    }
    file.flush().await?;

    tracing::info!(path = %path.display(), rows = records.len(), "Evaluation results written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{engine_with, legal_corpus};
    use lexroute_common::oracle::{ScriptedOracle, ScriptedReply};
    use serde_json::json;

    #[test]
    fn test_zero_rate_rejected() {
        let oracle = Arc::new(ScriptedOracle::new(vec![]));
        let engine = tokio_test::block_on(engine_with(oracle, legal_corpus()));
        assert!(matches!(
            BatchEvaluator::new(Arc::new(engine), 0),
            Err(AppError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_rows_run_in_fresh_sessions() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            ScriptedReply::Structured(json!({"complexity": "complex"})),
            ScriptedReply::Structured(json!({"generatedQueries": ["thirty days objection"]})),
            ScriptedReply::Text("Within thirty days.".into()),
            ScriptedReply::Structured(json!({"complexity": "simple_conversation"})),
            ScriptedReply::Text("The Act governs civil marriages.".into()),
            ScriptedReply::Structured(json!({"complexity": "complex"})),
            ScriptedReply::Timeout,
        ]));
        let engine = Arc::new(engine_with(oracle.clone(), legal_corpus()).await);
        let evaluator = BatchEvaluator::new(engine, 600).unwrap();

        let mut first = EvaluationRow::new("When can someone object?");
        first.extra.insert("ground_truth".into(), json!("Thirty days after publication."));
        let rows = vec![
            first,
            EvaluationRow::new("What does the Act say?"),
            EvaluationRow::new("one more"),
        ];

        let records = evaluator.evaluate_all(&rows).await;
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].response, "Within thirty days.");
        assert_eq!(records[0].retrieved_contexts.len(), 3);
        assert_eq!(records[0].extra["ground_truth"], "Thirty days after publication.");

        // out-of-scope rows are still answered by the generator
        assert_eq!(records[1].tier, Some(ComplexityTier::SimpleConversation));
        assert_eq!(records[1].response, "The Act governs civil marriages.");
        assert!(records[1].retrieved_contexts.is_empty());
        assert!(oracle.prompts()[4].contains("human: What does the Act say?"));

        assert!(records[2].error.is_some());
        assert!(records[2].response.is_empty());

        // each session saw only the greeting, never a previous row
        let second_row_prompt = &oracle.prompts()[3];
        assert!(!second_row_prompt.contains("When can someone object?"));
    }

    #[tokio::test]
    async fn test_jsonl_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("rows.jsonl");
        tokio::fs::write(&input, "{\"question\": \"Q1\", \"reference\": \"R1\"}\n\n{\"question\": \"Q2\"}\n")
            .await
            .unwrap();

        let rows = read_rows(&input).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].extra["reference"], "R1");

        let output = dir.path().join("out").join("results.jsonl");
        let records = vec![EvaluationRecord {
            question: "Q1".into(),
            tier: Some(ComplexityTier::Complex),
            response: "A1".into(),
            retrieved_contexts: vec!["ctx".into()],
            error: None,
            extra: rows[0].extra.clone(),
        }];
        write_records(&output, &records).await.unwrap();

        let written = tokio::fs::read_to_string(&output).await.unwrap();
        let value: Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(value["tier"], "complex");
        assert_eq!(value["retrieved_contexts"], json!(["ctx"]));
        assert_eq!(value["reference"], "R1");
        assert!(value.get("error").is_none());
    }
}
