//! Error types for LLM operations.

use thiserror::Error;

/// Errors that can occur when talking to the chat API.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Connection error - unable to reach the API server.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request timeout.
    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// No API key in the configured environment variable.
    #[error("API key not set. Export {env} or change llm.api_key_env.")]
    MissingApiKey { env: String },

    /// API returned an error response.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The model answered, but not with the segment schema.
    #[error("Malformed summary: {0}")]
    MalformedSummary(String),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

impl From<LlmError> for tubesum_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::MalformedSummary(msg) => tubesum_core::Error::MalformedSummary(msg),
            other => tubesum_core::Error::Summarization(other.to_string()),
        }
    }
}
