//! HashiCorp Vault KV v2 backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::SecretBackend;
use crate::error::{SecretsError, SecretsResult};

/// How long the renewal task sleeps after a lookup/renew failure.
const RENEW_RETRY: Duration = Duration::from_secs(60);

/// KV v2 secret engine over HTTP.
///
/// Values are stored under `{mount}/data/{key}` as `{"value": ...}`. The
/// token is kept behind a lock so [`HashiVaultBackend::spawn_token_renewal`]
/// can refresh it while requests are in flight.
pub struct HashiVaultBackend {
    client: reqwest::Client,
    addr: String,
    mount: String,
    token: Arc<RwLock<String>>,
}

impl HashiVaultBackend {
    /// Create a backend for the Vault at `addr` with the given token.
    pub fn new(
        addr: impl Into<String>,
        token: impl Into<String>,
        mount: impl Into<String>,
    ) -> SecretsResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            addr: addr.into().trim_end_matches('/').to_string(),
            mount: mount.into(),
            token: Arc::new(RwLock::new(token.into())),
        })
    }

    fn data_url(&self, key: &str) -> String {
        format!("{}/v1/{}/data/{}", self.addr, self.mount, key)
    }

    async fn token(&self) -> String {
        self.token.read().await.clone()
    }

    /// Spawn the background task that watches token lifetime and renews at
    /// half-life. Runs until the daemon aborts it on shutdown.
    pub fn spawn_token_renewal(&self) -> tokio::task::JoinHandle<()> {
        let client = self.client.clone();
        let addr = self.addr.clone();
        let token = self.token.clone();

        tokio::spawn(async move {
            loop {
                let current = token.read().await.clone();
                let ttl = match lookup_ttl(&client, &addr, &current).await {
                    Ok(ttl) => ttl,
                    Err(e) => {
                        warn!(error = %e, "vault token lookup failed");
                        tokio::time::sleep(RENEW_RETRY).await;
                        continue;
                    },
                };

                // Non-expiring (root) tokens report 0; nothing to do.
                if ttl == 0 {
                    debug!("vault token has no TTL, renewal watcher idle");
                    return;
                }

                tokio::time::sleep(Duration::from_secs((ttl / 2).max(1))).await;

                let current = token.read().await.clone();
                match renew(&client, &addr, &current).await {
                    Ok(()) => info!("renewed vault token"),
                    Err(e) => {
                        warn!(error = %e, "vault token renewal failed");
                        tokio::time::sleep(RENEW_RETRY).await;
                    },
                }
            }
        })
    }
}

async fn lookup_ttl(client: &reqwest::Client, addr: &str, token: &str) -> SecretsResult<u64> {
    let response = client
        .get(format!("{addr}/v1/auth/token/lookup-self"))
        .header("X-Vault-Token", token)
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(SecretsError::Backend(format!(
            "token lookup returned {}",
            response.status()
        )));
    }
    let body: serde_json::Value = response.json().await?;
    Ok(body["data"]["ttl"].as_u64().unwrap_or(0))
}

async fn renew(client: &reqwest::Client, addr: &str, token: &str) -> SecretsResult<()> {
    let response = client
        .post(format!("{addr}/v1/auth/token/renew-self"))
        .header("X-Vault-Token", token)
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(SecretsError::Backend(format!(
            "token renewal returned {}",
            response.status()
        )));
    }
    Ok(())
}

#[async_trait]
impl SecretBackend for HashiVaultBackend {
    fn name(&self) -> &str {
        "vault"
    }

    async fn get(&self, key: &str) -> SecretsResult<String> {
        let response = self
            .client
            .get(self.data_url(key))
            .header("X-Vault-Token", self.token().await)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SecretsError::not_found(key));
        }
        if !response.status().is_success() {
            return Err(SecretsError::Backend(format!(
                "vault get returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response.json().await?;
        body["data"]["data"]["value"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| SecretsError::not_found(key))
    }

    async fn set(&self, key: &str, value: &str) -> SecretsResult<()> {
        let response = self
            .client
            .post(self.data_url(key))
            .header("X-Vault-Token", self.token().await)
            .json(&json!({ "data": { "value": value } }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SecretsError::Backend(format!(
                "vault set returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> SecretsResult<()> {
        let url = format!("{}/v1/{}/metadata/{}", self.addr, self.mount, key);
        let response = self
            .client
            .delete(url)
            .header("X-Vault-Token", self.token().await)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SecretsError::not_found(key));
        }
        if !response.status().is_success() {
            return Err(SecretsError::Backend(format!(
                "vault delete returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn list(&self) -> SecretsResult<Vec<String>> {
        let url = format!("{}/v1/{}/metadata?list=true", self.addr, self.mount);
        let response = self
            .client
            .get(url)
            .header("X-Vault-Token", self.token().await)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(SecretsError::Backend(format!(
                "vault list returned {}",
                response.status()
            )));
        }
        let body: serde_json::Value = response.json().await?;
        Ok(body["data"]["keys"]
            .as_array()
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| k.as_str().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn ping(&self) -> SecretsResult<()> {
        let response = self
            .client
            .get(format!("{}/v1/sys/health", self.addr))
            .send()
            .await?;
        if response.status().is_success() || response.status().as_u16() == 429 {
            Ok(())
        } else {
            Err(SecretsError::Backend(format!(
                "vault health returned {}",
                response.status()
            )))
        }
    }
}
