//! OpenAI-compatible `/chat/completions` client.
//!
//! Works against api.openai.com and any gateway speaking the same shape
//! (vLLM, Ollama, OpenRouter, ...).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{LlmError, LlmResult};
use crate::provider::{LlmProvider, ProviderConfig};
use crate::types::{ChatMessage, ChatRole};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible chat provider.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl OpenAiCompatProvider {
    /// Create a provider from config.
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn build_request(&self, messages: &[ChatMessage]) -> Value {
        let mut api_messages: Vec<Value> = Vec::with_capacity(messages.len() + 1);
        if !self.config.system_prompt.is_empty() {
            api_messages.push(json!({
                "role": "system",
                "content": self.config.system_prompt,
            }));
        }
        for m in messages {
            api_messages.push(json!({
                "role": match m.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                "content": m.content,
            }));
        }

        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": api_messages,
        })
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> LlmResult<String> {
        if self.config.api_key.is_empty() {
            return Err(LlmError::ApiKeyNotConfigured {
                provider: "openai".to_string(),
            });
        }

        let url = self.config.base_url.as_deref().unwrap_or(OPENAI_API_URL);
        debug!(model = %self.config.model, messages = messages.len(), "openai request");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&self.build_request(messages))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: "openai".to_string(),
                status: status.as_u16(),
                message: body.chars().take(300).collect(),
            });
        }

        let parsed: ApiResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::UnexpectedResponse {
                    provider: "openai".to_string(),
                    message: e.to_string(),
                })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| LlmError::UnexpectedResponse {
                provider: "openai".to_string(),
                message: "response contained no choices".to_string(),
            })
    }
}
