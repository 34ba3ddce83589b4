//! OpenAI-compatible chat completions oracle

use super::{parse_structured, Oracle, OutputSchema};
use crate::config::OracleConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

const STRUCTURED_SYSTEM_PROMPT: &str =
    "You are a precise assistant that answers strictly in JSON matching the requested schema.";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Oracle backed by a chat completions HTTP endpoint
pub struct ChatOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl ChatOracle {
    /// Create a new chat oracle from configuration
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e)
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    async fn chat(&self, system: Option<&str>, prompt: &str, kind: &str) -> Result<String> {
        let start = Instant::now();
        let result = self.send(system, prompt).await;

        metrics::record_oracle_call(
            start.elapsed().as_secs_f64(),
            &self.model,
            kind,
            result.is_ok(),
        );

        if let Err(e) = &result {
            tracing::warn!(model = %self.model, kind, error = %e, "Oracle call failed");
        }
        result
    }

    async fn send(&self, system: Option<&str>, prompt: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: prompt });

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| AppError::OracleTimeout {
            message: if e.is_timeout() {
                format!("request timed out: {}", e)
            } else {
                format!("request failed: {}", e)
            },
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::OracleTimeout {
                message: format!("API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| AppError::OracleTimeout {
            message: format!("Failed to decode response body: {}", e),
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::OracleTimeout {
                message: "Empty response from oracle".to_string(),
            })
    }
}

#[async_trait]
impl Oracle for ChatOracle {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(None, prompt, "complete").await
    }

    async fn extract(&self, prompt: &str, schema: &OutputSchema) -> Result<Value> {
        let full_prompt = format!("{}\n\n{}", prompt, schema.format_instructions());
        let raw = self.chat(Some(STRUCTURED_SYSTEM_PROMPT), &full_prompt, "extract").await?;

        parse_structured(&raw, schema).map_err(|e| {
            tracing::debug!(schema = schema.name(), raw = %raw, "Structured output rejected");
            e
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_api_key_is_dropped() {
        let config = OracleConfig {
            api_key: Some(String::new()),
            ..OracleConfig::default()
        };
        let oracle = ChatOracle::new(&config).unwrap();
        assert!(oracle.api_key.is_none());
        assert_eq!(oracle.model_name(), "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        let config = OracleConfig {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            timeout_secs: 2,
            ..OracleConfig::default()
        };
        let oracle = ChatOracle::new(&config).unwrap();

        let err = oracle.complete("hello").await.unwrap_err();
        assert!(err.is_transient());
    }
}
