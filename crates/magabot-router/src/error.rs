//! Router error types.

use thiserror::Error;

/// Errors from the router.
#[derive(Debug, Error)]
pub enum RouterError {
    /// No adapter registered under the requested platform tag.
    #[error("no adapter registered for platform {0}")]
    UnknownPlatform(String),

    /// An adapter with the same tag is already registered.
    #[error("adapter {0} already registered")]
    DuplicateAdapter(String),

    /// The router was started without an application handler.
    #[error("no application handler installed")]
    HandlerMissing,

    /// An adapter operation failed.
    #[error(transparent)]
    Adapter(#[from] magabot_core::CoreError),
}

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;
