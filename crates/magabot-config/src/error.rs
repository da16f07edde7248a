//! Configuration error types.

use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid YAML for the expected shape.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File involved.
        path: String,
        /// Underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The file permissions expose secrets to other users.
    #[error("{path} has insecure permissions {mode:o}, expected 0600")]
    InsecurePermissions {
        /// File involved.
        path: String,
        /// Observed mode bits.
        mode: u32,
    },

    /// A validation rule failed.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
