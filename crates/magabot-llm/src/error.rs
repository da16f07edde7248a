//! LLM error types.

use thiserror::Error;

/// Errors from LLM providers.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key configured for the provider.
    #[error("no API key configured for provider {provider}")]
    ApiKeyNotConfigured {
        /// Provider name.
        provider: String,
    },

    /// The API returned a non-success status.
    #[error("{provider} API returned {status}: {message}")]
    Api {
        /// Provider name.
        provider: String,
        /// HTTP status code.
        status: u16,
        /// Error body excerpt.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response from {provider}: {message}")]
    UnexpectedResponse {
        /// Provider name.
        provider: String,
        /// What was wrong.
        message: String,
    },

    /// No provider registered under the requested name.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;
