//! The secrets manager and the startup config overlay.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::SecretBackend;
use crate::error::{SecretsError, SecretsResult};

/// Time budget for the whole startup overlay pass.
const OVERLAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Declares where one secret lands in the configuration.
///
/// `field` projects the mutable config field; the secret is only written
/// when that field is empty, so a value in the config file always wins.
pub struct SecretMapping<C> {
    /// Backend key (`magabot/llm/anthropic_api_key`).
    pub key: &'static str,
    /// Human-readable name for logs.
    pub label: &'static str,
    /// Projection to the target config field.
    pub field: fn(&mut C) -> &mut String,
}

/// Primary backend with optional fallback.
pub struct SecretsManager {
    primary: Arc<dyn SecretBackend>,
    fallback: Option<Arc<dyn SecretBackend>>,
}

impl SecretsManager {
    /// Create a manager over `primary`.
    pub fn new(primary: Arc<dyn SecretBackend>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    /// Add a fallback consulted when the primary misses or fails.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn SecretBackend>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Name of the primary backend.
    pub fn primary_name(&self) -> &str {
        self.primary.name()
    }

    /// Resolve `key`, falling through to the fallback on miss or failure.
    pub async fn get(&self, key: &str) -> SecretsResult<String> {
        match self.primary.get(key).await {
            Ok(value) => Ok(value),
            Err(primary_err) => {
                if !primary_err.is_not_found() {
                    warn!(
                        backend = self.primary.name(),
                        key,
                        error = %primary_err,
                        "primary secrets backend failed"
                    );
                }
                match &self.fallback {
                    Some(fallback) => fallback.get(key).await,
                    None => Err(primary_err),
                }
            },
        }
    }

    /// Store in the primary backend only.
    pub async fn set(&self, key: &str, value: &str) -> SecretsResult<()> {
        self.primary.set(key, value).await
    }

    /// Delete from the primary backend only.
    pub async fn delete(&self, key: &str) -> SecretsResult<()> {
        self.primary.delete(key).await
    }

    /// List keys in the primary backend.
    pub async fn list(&self) -> SecretsResult<Vec<String>> {
        self.primary.list().await
    }

    /// Check reachability of the primary backend.
    pub async fn ping(&self) -> SecretsResult<()> {
        self.primary.ping().await
    }

    /// Fill empty config fields from the backends.
    ///
    /// One-directional: a populated field is never overwritten. Per-key
    /// failures are logged and skipped; the pass as a whole is bounded by
    /// a 10-second budget. Returns how many fields were filled.
    pub async fn overlay_config<C>(&self, config: &mut C, mappings: &[SecretMapping<C>]) -> usize {
        let result = tokio::time::timeout(OVERLAY_TIMEOUT, async {
            let mut loaded = 0usize;
            for mapping in mappings {
                if !(mapping.field)(config).is_empty() {
                    debug!(secret = mapping.label, "config value set, skipping overlay");
                    continue;
                }
                match self.get(mapping.key).await {
                    Ok(value) => {
                        *(mapping.field)(config) = value;
                        loaded += 1;
                    },
                    Err(e) if e.is_not_found() => {
                        debug!(secret = mapping.label, "no stored secret");
                    },
                    Err(e) => {
                        warn!(secret = mapping.label, error = %e, "failed to load secret");
                    },
                }
            }
            loaded
        })
        .await;

        match result {
            Ok(loaded) => {
                info!(count = loaded, "loaded secrets into configuration");
                loaded
            },
            Err(_) => {
                warn!("secrets overlay timed out");
                0
            },
        }
    }
}

impl std::fmt::Debug for SecretsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsManager")
            .field("primary", &self.primary.name())
            .field(
                "fallback",
                &self.fallback.as_ref().map(|b| b.name().to_string()),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::local::LocalBackend;

    /// Backend that always fails, to exercise the fall-through path.
    struct BrokenBackend;

    #[async_trait]
    impl SecretBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }
        async fn get(&self, _key: &str) -> SecretsResult<String> {
            Err(SecretsError::Backend("always down".to_string()))
        }
        async fn set(&self, _key: &str, _value: &str) -> SecretsResult<()> {
            Err(SecretsError::Backend("always down".to_string()))
        }
        async fn delete(&self, _key: &str) -> SecretsResult<()> {
            Err(SecretsError::Backend("always down".to_string()))
        }
        async fn list(&self) -> SecretsResult<Vec<String>> {
            Err(SecretsError::Backend("always down".to_string()))
        }
        async fn ping(&self) -> SecretsResult<()> {
            Err(SecretsError::Backend("always down".to_string()))
        }
    }

    #[derive(Default)]
    struct FakeConfig {
        anthropic_api_key: String,
        bot_token: String,
    }

    fn mappings() -> Vec<SecretMapping<FakeConfig>> {
        vec![
            SecretMapping {
                key: "magabot/llm/anthropic_api_key",
                label: "Anthropic API key",
                field: |c| &mut c.anthropic_api_key,
            },
            SecretMapping {
                key: "magabot/telegram/bot_token",
                label: "Telegram bot token",
                field: |c| &mut c.bot_token,
            },
        ]
    }

    async fn local_manager(dir: &tempfile::TempDir) -> (SecretsManager, Arc<LocalBackend>) {
        let backend = Arc::new(LocalBackend::open(dir.path().join("s.json")).unwrap());
        (SecretsManager::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn get_prefers_primary() {
        let dir = tempfile::tempdir().unwrap();
        let primary = Arc::new(LocalBackend::open(dir.path().join("p.json")).unwrap());
        let fallback = Arc::new(LocalBackend::open(dir.path().join("f.json")).unwrap());
        primary.set("k", "primary").await.unwrap();
        fallback.set("k", "fallback").await.unwrap();

        let manager = SecretsManager::new(primary).with_fallback(fallback);
        assert_eq!(manager.get("k").await.unwrap(), "primary");
    }

    #[tokio::test]
    async fn falls_through_on_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let primary = Arc::new(LocalBackend::open(dir.path().join("p.json")).unwrap());
        let fallback = Arc::new(LocalBackend::open(dir.path().join("f.json")).unwrap());
        fallback.set("k", "fallback").await.unwrap();

        let manager = SecretsManager::new(primary).with_fallback(fallback);
        assert_eq!(manager.get("k").await.unwrap(), "fallback");
    }

    #[tokio::test]
    async fn falls_through_on_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = Arc::new(LocalBackend::open(dir.path().join("f.json")).unwrap());
        fallback.set("k", "fallback").await.unwrap();

        let manager = SecretsManager::new(Arc::new(BrokenBackend)).with_fallback(fallback);
        assert_eq!(manager.get("k").await.unwrap(), "fallback");
    }

    #[tokio::test]
    async fn no_fallback_propagates_primary_error() {
        let manager = SecretsManager::new(Arc::new(BrokenBackend));
        assert!(matches!(
            manager.get("k").await,
            Err(SecretsError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn overlay_fills_only_empty_fields() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, backend) = local_manager(&dir).await;
        backend
            .set("magabot/llm/anthropic_api_key", "sec")
            .await
            .unwrap();
        backend
            .set("magabot/telegram/bot_token", "sec-tok")
            .await
            .unwrap();

        let mut config = FakeConfig {
            anthropic_api_key: "cfg".to_string(),
            bot_token: String::new(),
        };
        let loaded = manager.overlay_config(&mut config, &mappings()).await;

        // Config wins for the populated field; the empty one is filled.
        assert_eq!(config.anthropic_api_key, "cfg");
        assert_eq!(config.bot_token, "sec-tok");
        assert_eq!(loaded, 1);
    }

    #[tokio::test]
    async fn overlay_fills_empty_field_from_backend() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, backend) = local_manager(&dir).await;
        backend
            .set("magabot/llm/anthropic_api_key", "sec")
            .await
            .unwrap();

        let mut config = FakeConfig::default();
        manager.overlay_config(&mut config, &mappings()).await;
        assert_eq!(config.anthropic_api_key, "sec");
    }

    #[tokio::test]
    async fn overlay_with_nothing_anywhere_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _backend) = local_manager(&dir).await;

        let mut config = FakeConfig::default();
        let loaded = manager.overlay_config(&mut config, &mappings()).await;
        assert_eq!(loaded, 0);
        assert!(config.anthropic_api_key.is_empty());
    }

    #[tokio::test]
    async fn overlay_survives_backend_failure() {
        let manager = SecretsManager::new(Arc::new(BrokenBackend));
        let mut config = FakeConfig::default();
        let loaded = manager.overlay_config(&mut config, &mappings()).await;
        assert_eq!(loaded, 0);
    }

    #[tokio::test]
    async fn set_goes_to_primary_only() {
        let dir = tempfile::tempdir().unwrap();
        let primary = Arc::new(LocalBackend::open(dir.path().join("p.json")).unwrap());
        let fallback = Arc::new(LocalBackend::open(dir.path().join("f.json")).unwrap());

        let manager = SecretsManager::new(primary.clone()).with_fallback(fallback.clone());
        manager.set("k", "v").await.unwrap();

        assert_eq!(primary.get("k").await.unwrap(), "v");
        assert!(fallback.get("k").await.unwrap_err().is_not_found());
    }
}
