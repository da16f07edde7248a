//! Secrets error types.

use thiserror::Error;

/// Errors from secret backends and the manager.
#[derive(Debug, Error)]
pub enum SecretsError {
    /// The key does not exist in the backend.
    ///
    /// Distinct from [`SecretsError::Backend`] so the manager can fall
    /// through to its fallback backend.
    #[error("secret not found: {key}")]
    NotFound {
        /// The requested key.
        key: String,
    },

    /// The backend cannot store values.
    #[error("backend {backend} is read-only")]
    ReadOnly {
        /// Backend name.
        backend: String,
    },

    /// The backend failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// I/O failure on a file-based backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure on a file-based backend.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// HTTP failure talking to a remote backend.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SecretsError {
    /// Shorthand for the not-found kind.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Whether this error is the not-found kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for secret operations.
pub type SecretsResult<T> = Result<T, SecretsError>;
