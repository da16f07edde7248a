//! Claude Code credentials backend.

use std::path::PathBuf;

use async_trait::async_trait;
use directories::BaseDirs;

use crate::backend::SecretBackend;
use crate::error::{SecretsError, SecretsResult};

/// Read-only backend over `~/.claude/.credentials.json`.
///
/// Only answers Anthropic key lookups (keys ending in
/// `anthropic_api_key`); everything else is not-found. Useful when the
/// operator already has Claude Code configured on the same machine.
pub struct ClaudeCredsBackend {
    path: PathBuf,
}

impl ClaudeCredsBackend {
    /// Use the default credentials location under the home directory.
    pub fn new() -> SecretsResult<Self> {
        let base = BaseDirs::new()
            .ok_or_else(|| SecretsError::Backend("no home directory".to_string()))?;
        Ok(Self::with_path(
            base.home_dir().join(".claude").join(".credentials.json"),
        ))
    }

    /// Use an explicit credentials file (tests).
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_key(&self) -> Option<String> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        let parsed: serde_json::Value = serde_json::from_str(&contents).ok()?;

        // Newer files carry an OAuth access token; older ones a raw key.
        parsed["claudeAiOauth"]["accessToken"]
            .as_str()
            .or_else(|| parsed["api_key"].as_str())
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
    }
}

#[async_trait]
impl SecretBackend for ClaudeCredsBackend {
    fn name(&self) -> &str {
        "claude-credentials"
    }

    async fn get(&self, key: &str) -> SecretsResult<String> {
        if !key.ends_with("anthropic_api_key") {
            return Err(SecretsError::not_found(key));
        }
        self.read_key().ok_or_else(|| SecretsError::not_found(key))
    }

    async fn set(&self, _key: &str, _value: &str) -> SecretsResult<()> {
        Err(SecretsError::ReadOnly {
            backend: "claude-credentials".to_string(),
        })
    }

    async fn delete(&self, _key: &str) -> SecretsResult<()> {
        Err(SecretsError::ReadOnly {
            backend: "claude-credentials".to_string(),
        })
    }

    async fn list(&self) -> SecretsResult<Vec<String>> {
        if self.read_key().is_some() {
            Ok(vec!["magabot/llm/anthropic_api_key".to_string()])
        } else {
            Ok(Vec::new())
        }
    }

    async fn ping(&self) -> SecretsResult<()> {
        if self.path.exists() {
            Ok(())
        } else {
            Err(SecretsError::Backend(format!(
                "{} does not exist",
                self.path.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_creds(dir: &tempfile::TempDir, contents: &str) -> ClaudeCredsBackend {
        let path = dir.path().join(".credentials.json");
        std::fs::write(&path, contents).unwrap();
        ClaudeCredsBackend::with_path(path)
    }

    #[tokio::test]
    async fn reads_oauth_token() {
        let dir = tempfile::tempdir().unwrap();
        let backend = write_creds(
            &dir,
            r#"{"claudeAiOauth": {"accessToken": "sk-ant-oat-xyz"}}"#,
        );
        assert_eq!(
            backend.get("magabot/llm/anthropic_api_key").await.unwrap(),
            "sk-ant-oat-xyz"
        );
    }

    #[tokio::test]
    async fn reads_legacy_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let backend = write_creds(&dir, r#"{"api_key": "sk-ant-123"}"#);
        assert_eq!(
            backend.get("magabot/llm/anthropic_api_key").await.unwrap(),
            "sk-ant-123"
        );
    }

    #[tokio::test]
    async fn only_answers_anthropic_keys() {
        let dir = tempfile::tempdir().unwrap();
        let backend = write_creds(&dir, r#"{"api_key": "sk-ant-123"}"#);
        assert!(
            backend
                .get("magabot/llm/openai_api_key")
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let backend = ClaudeCredsBackend::with_path("/nonexistent/.credentials.json");
        assert!(
            backend
                .get("magabot/llm/anthropic_api_key")
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert!(backend.ping().await.is_err());
    }

    #[tokio::test]
    async fn read_only() {
        let dir = tempfile::tempdir().unwrap();
        let backend = write_creds(&dir, "{}");
        assert!(matches!(
            backend.set("k", "v").await,
            Err(SecretsError::ReadOnly { .. })
        ));
    }
}
