//! The backend capability set.

use async_trait::async_trait;

use crate::error::SecretsResult;

/// A key-value secret store.
///
/// Keys are slash-separated paths (`magabot/llm/anthropic_api_key`).
/// Implementations must return [`SecretsError::NotFound`] for absent keys
/// and reserve other variants for genuine failures.
///
/// [`SecretsError::NotFound`]: crate::SecretsError::NotFound
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Backend name for logs and diagnostics.
    fn name(&self) -> &str;

    /// Fetch the value for `key`.
    async fn get(&self, key: &str) -> SecretsResult<String>;

    /// Store `value` under `key`.
    async fn set(&self, key: &str, value: &str) -> SecretsResult<()>;

    /// Remove `key`.
    async fn delete(&self, key: &str) -> SecretsResult<()>;

    /// Enumerate stored keys.
    async fn list(&self) -> SecretsResult<Vec<String>>;

    /// Check the backend is reachable and usable.
    async fn ping(&self) -> SecretsResult<()>;
}
