//! Error types for the audit core with classification helpers

use std::time::Duration;
use thiserror::Error;

/// Result type alias for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;

/// Error taxonomy for the audit pipeline
#[derive(Error, Debug)]
pub enum AuditError {
    /// 400 from the provider: configuration or payload fault, never retried
    #[error("bad request: {message}")]
    BadRequest {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Other non-retryable API errors (401, 403, 404, ...)
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// 429 after exhausting retries
    #[error("rate limited after {attempts} attempt(s)")]
    RateLimited {
        attempts: usize,
        retry_after: Option<Duration>,
    },

    /// 5xx after exhausting retries
    #[error("server error {status} after {attempts} attempt(s)")]
    ServerError { status: u16, attempts: usize },

    /// Connect/read timeout, DNS, TLS; treated as a server error for retries
    #[error("transport error: {0}")]
    Transport(String),

    /// Structurally malformed provider payload
    #[error("incomplete parse: {0}")]
    ParseIncomplete(String),

    /// The reporting API requires a conversion metric and none could be resolved
    #[error("no conversion metric could be resolved")]
    MissingConversionMetric,

    /// Bad window, suspicious input, or other pre-flight failure
    #[error("validation error: {0}")]
    Validation(String),

    /// The pipeline was cancelled; partial results may have been returned
    #[error("operation cancelled")]
    Cancelled,

    /// Client construction or configuration failure
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuditError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        AuditError::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        AuditError::Validation(msg.into())
    }

    /// Create a bad-request error
    pub fn bad_request<S: Into<String>>(msg: S, details: Option<serde_json::Value>) -> Self {
        AuditError::BadRequest {
            message: msg.into(),
            details,
        }
    }

    /// Check whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuditError::RateLimited { .. }
                | AuditError::ServerError { .. }
                | AuditError::Transport(_)
        )
    }

    /// HTTP status code, when the error carries one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AuditError::BadRequest { .. } => Some(400),
            AuditError::Api { status, .. } => Some(*status),
            AuditError::ServerError { status, .. } => Some(*status),
            AuditError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// True for fatal call outcomes a sub-pipeline should record and skip
    pub fn is_slice_recoverable(&self) -> bool {
        !matches!(
            self,
            AuditError::Validation(_) | AuditError::Config(_) | AuditError::Cancelled
        )
    }
}
