//! Error types for LLM calls

use thiserror::Error;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors raised while talking to a chat completion endpoint
#[derive(Error, Debug)]
pub enum LLMError {
    /// Non-success HTTP status not covered by a more specific variant
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The endpoint rejected the request body
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Transport failure, including client timeouts
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The body parsed but did not have the expected shape
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// Whether the failure came from credentials or setup rather than the call itself
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed | Self::ConfigurationError(_) | Self::ModelNotFound(_)
        )
    }
}
