//! Error types for LexRoute services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for oracle, routing and corpus failures
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidFormat,

    // Session errors (4xxx)
    SessionNotFound,
    SessionClosed,

    // Rate limiting (6xxx)
    RateLimited,

    // Corpus errors (7xxx)
    EmptyCorpus,

    // Oracle errors (8xxx)
    OracleTimeout,
    OracleParse,
    ClassificationFailed,
    EmbeddingError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidFormat => 1003,

            // Sessions (4xxx)
            ErrorCode::SessionNotFound => 4005,
            ErrorCode::SessionClosed => 4006,

            // Rate limits (6xxx)
            ErrorCode::RateLimited => 6001,

            // Corpus (7xxx)
            ErrorCode::EmptyCorpus => 7001,

            // Oracle (8xxx)
            ErrorCode::OracleTimeout => 8001,
            ErrorCode::OracleParse => 8002,
            ErrorCode::ClassificationFailed => 8003,
            ErrorCode::EmbeddingError => 8004,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Session errors
    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    #[error("Session closed by termination sentinel")]
    SessionClosed,

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Corpus errors
    #[error("Empty corpus: {message}")]
    EmptyCorpus { message: String },

    // Oracle errors
    /// Transport failure, timeout or non-success status from the oracle.
    #[error("Oracle call failed: {message}")]
    OracleTimeout { message: String },

    /// Oracle output could not be coerced into the requested schema.
    #[error("Oracle output did not match schema `{schema}`: {message}")]
    OracleParse { schema: String, message: String },

    #[error("Query classification failed: {message}")]
    Classification { message: String },

    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::SessionNotFound { .. } => ErrorCode::SessionNotFound,
            AppError::SessionClosed => ErrorCode::SessionClosed,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::EmptyCorpus { .. } => ErrorCode::EmptyCorpus,
            AppError::OracleTimeout { .. } => ErrorCode::OracleTimeout,
            AppError::OracleParse { .. } => ErrorCode::OracleParse,
            AppError::Classification { .. } => ErrorCode::ClassificationFailed,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::HttpClient(_) => ErrorCode::OracleTimeout,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } |
            AppError::InvalidFormat { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::SessionNotFound { .. } => StatusCode::NOT_FOUND,

            // 410 Gone
            AppError::SessionClosed => StatusCode::GONE,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::EmptyCorpus { .. } |
            AppError::Internal { .. } |
            AppError::Configuration { .. } |
            AppError::Serialization(_) |
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::OracleParse { .. } |
            AppError::Classification { .. } |
            AppError::EmbeddingError { .. } |
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 504 Gateway Timeout
            AppError::OracleTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Whether retrying the same oracle call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::OracleTimeout { .. } | AppError::HttpClient(_))
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let details = match &self {
            AppError::Validation { field: Some(field), .. } => {
                Some(serde_json::json!({ "field": field }))
            }
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details,
                request_id: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string()
        }
    }
}

impl From<::config::ConfigError> for AppError {
    fn from(err: ::config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::SessionNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::SessionNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_oracle_errors() {
        let timeout = AppError::OracleTimeout { message: "deadline".into() };
        assert!(timeout.is_transient());
        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);

        let parse = AppError::OracleParse {
            schema: "query_complexity".into(),
            message: "expected object".into()
        };
        assert!(!parse.is_transient());
        assert_eq!(parse.code().as_code(), 8002);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "Empty query".into(),
            field: Some("query".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_bad_input_codes() {
        let err = AppError::InvalidFormat { message: "line 3: expected value".into() };
        assert_eq!(err.code(), ErrorCode::InvalidFormat);
        assert_eq!(err.code().as_code(), 1003);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::SessionClosed.status_code(), StatusCode::GONE);
    }

    #[test]
    fn test_empty_corpus_is_fatal() {
        let err = AppError::EmptyCorpus { message: "no documents".into() };
        assert!(err.is_server_error());
        assert!(!err.is_transient());
    }
}
