//! Core error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by core types and by adapters via the shared contract.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A media path produced by an adapter escapes the downloads directory.
    #[error("media path {path} is outside the downloads directory")]
    MediaPathEscape {
        /// The offending path.
        path: PathBuf,
    },

    /// A media download exceeds the size cap.
    #[error("media download of {actual} bytes exceeds the {limit} byte limit")]
    MediaTooLarge {
        /// Observed size in bytes.
        actual: u64,
        /// Configured limit in bytes.
        limit: u64,
    },

    /// The user's home directory could not be determined.
    #[error("could not determine the home directory")]
    NoHomeDirectory,

    /// An adapter was asked to dispatch before a handler was installed.
    #[error("no message handler installed")]
    HandlerMissing,

    /// A transport-level failure inside an adapter.
    #[error("transport error on {platform}: {message}")]
    Transport {
        /// Adapter tag.
        platform: String,
        /// Underlying description.
        message: String,
    },

    /// The adapter does not support the requested operation.
    #[error("{platform} adapter is receive-only")]
    ReceiveOnly {
        /// Adapter tag.
        platform: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
