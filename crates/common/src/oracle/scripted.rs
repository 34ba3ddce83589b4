//! Deterministic oracle that replays a fixed script of replies

use super::{parse_structured, Oracle, OutputSchema};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// One canned oracle reply
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Plain text; parsed as JSON when used for extraction
    Text(String),
    /// Already-structured result
    Structured(Value),
    /// Raw output that never satisfies a schema
    Malformed(String),
    /// Simulated transport timeout
    Timeout,
}

/// Oracle for tests and offline runs
///
/// Replies are consumed in order across both `complete` and `extract`.
/// Once the script runs dry the fallback reply (if any) is repeated.
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<ScriptedReply>>,
    fallback: Option<ScriptedReply>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fallback(mut self, reply: ScriptedReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Every prompt received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    /// Replies not yet consumed
    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }

    fn next_reply(&self, prompt: &str) -> Result<ScriptedReply> {
        lock(&self.prompts).push(prompt.to_string());

        lock(&self.replies)
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| AppError::Internal {
                message: "scripted oracle has no replies left".to_string(),
            })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn timeout() -> AppError {
    AppError::OracleTimeout {
        message: "scripted timeout".to_string(),
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, prompt: &str) -> Result<String> {
        match self.next_reply(prompt)? {
            ScriptedReply::Text(text) | ScriptedReply::Malformed(text) => Ok(text),
            ScriptedReply::Structured(value) => Ok(value.to_string()),
            ScriptedReply::Timeout => Err(timeout()),
        }
    }

    async fn extract(&self, prompt: &str, schema: &OutputSchema) -> Result<Value> {
        match self.next_reply(prompt)? {
            ScriptedReply::Structured(value) if value.is_object() => Ok(value),
            ScriptedReply::Structured(value) => Err(AppError::OracleParse {
                schema: schema.name().to_string(),
                message: format!("expected a JSON object, got {}", value),
            }),
            ScriptedReply::Text(text) => parse_structured(&text, schema),
            ScriptedReply::Malformed(raw) => Err(AppError::OracleParse {
                schema: schema.name().to_string(),
                message: format!("unparseable output: {}", raw),
            }),
            ScriptedReply::Timeout => Err(timeout()),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
