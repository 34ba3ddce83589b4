//! Exponential backoff around oracle calls
//!
//! Only transient failures (transport errors, timeouts, non-success
//! statuses) are retried. Parse failures surface immediately since the
//! callers already have a fallback for them.

use super::{Oracle, OutputSchema};
use crate::config::OracleConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Retry budget for a single oracle call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first failure
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &OracleConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_interval: Duration::from_millis(config.backoff_initial_ms),
            max_interval: Duration::from_millis(config.backoff_max_ms.max(config.backoff_initial_ms)),
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&OracleConfig::default())
    }
}

/// Oracle wrapper that retries transient failures with exponential backoff
pub struct RetryingOracle<O> {
    inner: O,
    policy: RetryPolicy,
}

impl<O: Oracle> RetryingOracle<O> {
    pub fn new(inner: O, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let schedule = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.policy.initial_interval)
            .with_max_interval(self.policy.max_interval)
            .with_max_elapsed_time(None)
            .build();

        let attempts = AtomicU32::new(0);
        let max_retries = self.policy.max_retries;

        backoff::future::retry(schedule, || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            call().await.map_err(|e| classify(e, attempt, max_retries, operation))
        })
        .await
    }
}

fn classify(error: AppError, attempt: u32, max_retries: u32, operation: &str) -> backoff::Error<AppError> {
    if !error.is_transient() {
        return backoff::Error::permanent(error);
    }
    if attempt > max_retries {
        tracing::warn!(operation, attempt, error = %error, "Oracle retries exhausted");
        return backoff::Error::permanent(error);
    }

    tracing::warn!(
        operation,
        attempt,
        max_retries,
        error = %error,
        "Oracle call failed, retrying"
    );
    backoff::Error::transient(error)
}

#[async_trait]
impl<O: Oracle> Oracle for RetryingOracle<O> {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.run("complete", || self.inner.complete(prompt)).await
    }

    async fn extract(&self, prompt: &str, schema: &OutputSchema) -> Result<Value> {
        self.run("extract", || self.inner.extract(prompt, schema)).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{ScriptedOracle, ScriptedReply};
    use serde_json::json;
    use std::sync::Arc;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let script = Arc::new(ScriptedOracle::new(vec![
            ScriptedReply::Timeout,
            ScriptedReply::Text("recovered".into()),
        ]));
        let oracle = RetryingOracle::new(script.clone(), fast_policy(2));

        assert_eq!(oracle.complete("q").await.unwrap(), "recovered");
        assert_eq!(script.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let script = Arc::new(ScriptedOracle::new(vec![
            ScriptedReply::Timeout,
            ScriptedReply::Timeout,
            ScriptedReply::Timeout,
            ScriptedReply::Text("too late".into()),
        ]));
        let oracle = RetryingOracle::new(script.clone(), fast_policy(2));

        let err = oracle.complete("q").await.unwrap_err();
        assert!(matches!(err, AppError::OracleTimeout { .. }));
        assert_eq!(script.prompts().len(), 3);
    }

    #[tokio::test]
    async fn test_parse_failure_is_not_retried() {
        let script = Arc::new(ScriptedOracle::new(vec![
            ScriptedReply::Malformed("not json".into()),
            ScriptedReply::Structured(json!({"ok": true})),
        ]));
        let oracle = RetryingOracle::new(script.clone(), fast_policy(3));
        let schema = OutputSchema::new("flag", json!({"type": "object"}));

        let err = oracle.extract("q", &schema).await.unwrap_err();
        assert!(matches!(err, AppError::OracleParse { .. }));
        assert_eq!(script.prompts().len(), 1);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from_config(&OracleConfig::default());
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.initial_interval, Duration::from_millis(500));
        assert_eq!(policy.max_interval, Duration::from_secs(8));
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }
}
