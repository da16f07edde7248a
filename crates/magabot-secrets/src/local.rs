//! File-backed secret store.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backend::SecretBackend;
use crate::error::{SecretsError, SecretsResult};

/// Secrets persisted as a JSON map next to the config file.
///
/// The file is created 0600 and every save goes through a temp file in the
/// same directory followed by an atomic rename, so a crash mid-write never
/// leaves a truncated store. A tokio mutex serializes all access.
pub struct LocalBackend {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl LocalBackend {
    /// Open the store at `path`, loading existing entries.
    pub fn open(path: impl Into<PathBuf>) -> SecretsResult<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> SecretsResult<()> {
        let json = serde_json::to_string_pretty(entries)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl SecretBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn get(&self, key: &str) -> SecretsResult<String> {
        self.entries
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| SecretsError::not_found(key))
    }

    async fn set(&self, key: &str, value: &str) -> SecretsResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    async fn delete(&self, key: &str) -> SecretsResult<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_none() {
            return Err(SecretsError::not_found(key));
        }
        self.persist(&entries)
    }

    async fn list(&self) -> SecretsResult<Vec<String>> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }

    async fn ping(&self) -> SecretsResult<()> {
        Ok(())
    }
}
