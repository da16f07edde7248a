//! The provider trait and shared configuration.

use async_trait::async_trait;

use crate::error::LlmResult;
use crate::types::ChatMessage;

/// A language model reachable over HTTP.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (registry key).
    fn name(&self) -> &str;

    /// Model identifier in use.
    fn model(&self) -> &str;

    /// Complete a conversation; returns the assistant reply text.
    async fn chat(&self, messages: &[ChatMessage]) -> LlmResult<String>;
}

/// Configuration shared by the concrete providers.
#[derive(Clone)]
pub struct ProviderConfig {
    /// API key.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Completion token budget.
    pub max_tokens: usize,
    /// System prompt prepended to every conversation.
    pub system_prompt: String,
    /// Base URL override for self-hosted gateways.
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Create a config with key and model; other fields take defaults.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 1024,
            system_prompt: String::new(),
            base_url: None,
        }
    }

    /// Set the token budget.
    #[must_use]
    pub fn max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }

    /// Set the system prompt.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("has_api_key", &!self.api_key.is_empty())
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("has_base_url", &self.base_url.is_some())
            .finish()
    }
}
