//! Daemon error types.

use thiserror::Error;

/// Errors that abort daemon startup.
///
/// Once the daemon is running, per-message failures are handled locally;
/// only configuration and construction problems are fatal.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration could not be loaded or failed validation.
    #[error(transparent)]
    Config(#[from] magabot_config::ConfigError),

    /// A core resource failed to initialize.
    #[error(transparent)]
    Core(#[from] magabot_core::CoreError),

    /// The vault key could not be loaded or created.
    #[error(transparent)]
    Vault(#[from] magabot_crypto::VaultError),

    /// The secrets backend could not be built.
    #[error(transparent)]
    Secrets(#[from] magabot_secrets::SecretsError),

    /// The audit logger could not be opened.
    #[error(transparent)]
    Audit(#[from] magabot_audit::AuditError),

    /// The router failed to start.
    #[error(transparent)]
    Router(#[from] magabot_router::RouterError),

    /// The message archive could not be opened.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Filesystem failure during startup or shutdown.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
