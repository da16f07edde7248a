//! Environment-variable secret backend.

use async_trait::async_trait;

use crate::backend::SecretBackend;
use crate::error::{SecretsError, SecretsResult};

/// Read-only backend over process environment variables.
///
/// A key like `magabot/llm/anthropic_api_key` maps to
/// `MAGABOT_LLM_ANTHROPIC_API_KEY`.
pub struct EnvBackend;

impl EnvBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }

    /// Translate a slash key into its environment variable name.
    pub fn env_name(key: &str) -> String {
        key.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl Default for EnvBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretBackend for EnvBackend {
    fn name(&self) -> &str {
        "env"
    }

    async fn get(&self, key: &str) -> SecretsResult<String> {
        match std::env::var(Self::env_name(key)) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(SecretsError::not_found(key)),
        }
    }

    async fn set(&self, _key: &str, _value: &str) -> SecretsResult<()> {
        Err(SecretsError::ReadOnly {
            backend: "env".to_string(),
        })
    }

    async fn delete(&self, _key: &str) -> SecretsResult<()> {
        Err(SecretsError::ReadOnly {
            backend: "env".to_string(),
        })
    }

    async fn list(&self) -> SecretsResult<Vec<String>> {
        // Environment variables cannot be mapped back to slash keys.
        Ok(Vec::new())
    }

    async fn ping(&self) -> SecretsResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    #[test]
    fn key_translation() {
        assert_eq!(
            EnvBackend::env_name("magabot/llm/anthropic_api_key"),
            "MAGABOT_LLM_ANTHROPIC_API_KEY"
        );
        assert_eq!(EnvBackend::env_name("a-b.c"), "A_B_C");
    }

    #[tokio::test]
    async fn reads_from_environment() {
        // Single-threaded test runtime; no concurrent env readers.
        unsafe { std::env::set_var("MAGABOT_TEST_SECRET_KEY", "hunter2") };
        let backend = EnvBackend::new();
        assert_eq!(
            backend.get("magabot/test/secret_key").await.unwrap(),
            "hunter2"
        );
        unsafe { std::env::remove_var("MAGABOT_TEST_SECRET_KEY") };
    }

    #[tokio::test]
    async fn missing_var_is_not_found() {
        let backend = EnvBackend::new();
        assert!(
            backend
                .get("magabot/definitely/not/set")
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn writes_are_rejected() {
        let backend = EnvBackend::new();
        assert!(matches!(
            backend.set("k", "v").await,
            Err(SecretsError::ReadOnly { .. })
        ));
        assert!(matches!(
            backend.delete("k").await,
            Err(SecretsError::ReadOnly { .. })
        ));
    }
}
