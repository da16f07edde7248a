//! Ordered multi-backend chain.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::backend::SecretBackend;
use crate::error::{SecretsError, SecretsResult};

/// Queries sub-backends in order; the first hit wins.
///
/// Reads try every link (treating per-link failures as misses); writes go
/// to the first link that accepts them, skipping read-only links.
pub struct ChainBackend {
    links: Vec<Arc<dyn SecretBackend>>,
}

impl ChainBackend {
    /// Build a chain from ordered sub-backends.
    pub fn new(links: Vec<Arc<dyn SecretBackend>>) -> Self {
        Self { links }
    }
}

#[async_trait]
impl SecretBackend for ChainBackend {
    fn name(&self) -> &str {
        "chain"
    }

    async fn get(&self, key: &str) -> SecretsResult<String> {
        for link in &self.links {
            match link.get(key).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_not_found() => {},
                Err(e) => {
                    debug!(backend = link.name(), error = %e, "chain link failed, trying next");
                },
            }
        }
        Err(SecretsError::not_found(key))
    }

    async fn set(&self, key: &str, value: &str) -> SecretsResult<()> {
        let mut last_err = None;
        for link in &self.links {
            match link.set(key, value).await {
                Ok(()) => return Ok(()),
                Err(SecretsError::ReadOnly { .. }) => {},
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| SecretsError::ReadOnly {
            backend: "chain".to_string(),
        }))
    }

    async fn delete(&self, key: &str) -> SecretsResult<()> {
        let mut last_err = None;
        for link in &self.links {
            match link.delete(key).await {
                Ok(()) => return Ok(()),
                Err(SecretsError::ReadOnly { .. }) => {},
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| SecretsError::not_found(key)))
    }

    async fn list(&self) -> SecretsResult<Vec<String>> {
        let mut all = Vec::new();
        for link in &self.links {
            if let Ok(keys) = link.list().await {
                for key in keys {
                    if !all.contains(&key) {
                        all.push(key);
                    }
                }
            }
        }
        Ok(all)
    }

    async fn ping(&self) -> SecretsResult<()> {
        for link in &self.links {
            if link.ping().await.is_ok() {
                return Ok(());
            }
        }
        Err(SecretsError::Backend(
            "no chain link is reachable".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvBackend;
    use crate::local::LocalBackend;

    async fn two_locals() -> (tempfile::TempDir, ChainBackend, Arc<LocalBackend>, Arc<LocalBackend>) {
        let dir = tempfile::tempdir().unwrap();
        let first = Arc::new(LocalBackend::open(dir.path().join("a.json")).unwrap());
        let second = Arc::new(LocalBackend::open(dir.path().join("b.json")).unwrap());
        let chain = ChainBackend::new(vec![first.clone(), second.clone()]);
        (dir, chain, first, second)
    }

    #[tokio::test]
    async fn first_hit_wins() {
        let (_dir, chain, first, second) = two_locals().await;
        first.set("k", "from-first").await.unwrap();
        second.set("k", "from-second").await.unwrap();
        assert_eq!(chain.get("k").await.unwrap(), "from-first");
    }

    #[tokio::test]
    async fn later_links_consulted_on_miss() {
        let (_dir, chain, _first, second) = two_locals().await;
        second.set("k", "deep").await.unwrap();
        assert_eq!(chain.get("k").await.unwrap(), "deep");
    }

    #[tokio::test]
    async fn miss_everywhere_is_not_found() {
        let (_dir, chain, _first, _second) = two_locals().await;
        assert!(chain.get("absent").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn set_skips_read_only_links() {
        let dir = tempfile::tempdir().unwrap();
        let writable = Arc::new(LocalBackend::open(dir.path().join("w.json")).unwrap());
        let chain = ChainBackend::new(vec![Arc::new(EnvBackend::new()), writable.clone()]);

        chain.set("k", "v").await.unwrap();
        assert_eq!(writable.get("k").await.unwrap(), "v");
    }

    #[tokio::test]
    async fn list_merges_without_duplicates() {
        let (_dir, chain, first, second) = two_locals().await;
        first.set("a", "1").await.unwrap();
        first.set("b", "1").await.unwrap();
        second.set("b", "2").await.unwrap();
        second.set("c", "2").await.unwrap();

        let mut keys = chain.list().await.unwrap();
        keys.sort();
        assert_eq!(keys, ["a", "b", "c"]);
    }
}
