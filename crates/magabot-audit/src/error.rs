//! Audit error types.

use thiserror::Error;

/// Errors from the audit logger.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Failure serializing an event to JSON.
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    /// I/O failure writing or rotating the log.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
