//! Vault error types.

use thiserror::Error;

/// Errors from vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Invalid key material (wrong length or bad base64).
    #[error("invalid vault key")]
    InvalidKey,

    /// Decryption failed.
    ///
    /// Deliberately opaque: authentication failure, truncation, and key
    /// mismatch all surface as this one kind.
    #[error("decryption failed")]
    Decrypt,

    /// Encryption failed.
    #[error("encryption failed")]
    Encrypt,

    /// I/O error reading or writing the key file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;
