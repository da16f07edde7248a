//! Provider registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{LlmError, LlmResult};
use crate::provider::LlmProvider;
use crate::types::ChatMessage;

/// Holds registered providers keyed by name with a default.
pub struct LlmRouter {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    default: String,
}

impl LlmRouter {
    /// Create an empty router; the first registered provider becomes the
    /// default unless [`LlmRouter::set_default`] is called.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            default: String::new(),
        }
    }

    /// Register a provider under its own name.
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        if self.default.is_empty() {
            self.default = provider.name().to_string();
        }
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Choose the default provider by name.
    pub fn set_default(&mut self, name: &str) -> LlmResult<()> {
        if !self.providers.contains_key(name) {
            return Err(LlmError::UnknownProvider(name.to_string()));
        }
        self.default = name.to_string();
        Ok(())
    }

    /// Name of the default provider, if any is registered.
    pub fn default_provider(&self) -> Option<&str> {
        if self.default.is_empty() {
            None
        } else {
            Some(&self.default)
        }
    }

    /// Complete a conversation on `provider_hint`, or the default when the
    /// hint is `None`.
    pub async fn chat(
        &self,
        provider_hint: Option<&str>,
        messages: &[ChatMessage],
    ) -> LlmResult<String> {
        let name = provider_hint.unwrap_or(&self.default);
        let provider = self
            .providers
            .get(name)
            .ok_or_else(|| LlmError::UnknownProvider(name.to_string()))?;
        provider.chat(messages).await
    }
}

impl Default for LlmRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LlmRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        f.debug_struct("LlmRouter")
            .field("providers", &names)
            .field("default", &self.default)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct FakeProvider {
        name: &'static str,
        reply: &'static str,
    }

    #[async_trait]
    impl LlmProvider for FakeProvider {
        fn name(&self) -> &str {
            self.name
        }
        fn model(&self) -> &str {
            "fake"
        }
        async fn chat(&self, _messages: &[ChatMessage]) -> LlmResult<String> {
            Ok(self.reply.to_string())
        }
    }

    #[tokio::test]
    async fn first_registered_is_default() {
        let mut router = LlmRouter::new();
        router.register(Arc::new(FakeProvider {
            name: "a",
            reply: "from-a",
        }));
        router.register(Arc::new(FakeProvider {
            name: "b",
            reply: "from-b",
        }));

        assert_eq!(router.default_provider(), Some("a"));
        assert_eq!(
            router.chat(None, &[ChatMessage::user("x")]).await.unwrap(),
            "from-a"
        );
    }

    #[tokio::test]
    async fn hint_overrides_default() {
        let mut router = LlmRouter::new();
        router.register(Arc::new(FakeProvider {
            name: "a",
            reply: "from-a",
        }));
        router.register(Arc::new(FakeProvider {
            name: "b",
            reply: "from-b",
        }));

        assert_eq!(
            router
                .chat(Some("b"), &[ChatMessage::user("x")])
                .await
                .unwrap(),
            "from-b"
        );
    }

    #[tokio::test]
    async fn unknown_provider_errors() {
        let router = LlmRouter::new();
        assert!(matches!(
            router.chat(Some("ghost"), &[]).await,
            Err(LlmError::UnknownProvider(_))
        ));
    }

    #[test]
    fn set_default_validates() {
        let mut router = LlmRouter::new();
        router.register(Arc::new(FakeProvider {
            name: "a",
            reply: "",
        }));
        assert!(router.set_default("a").is_ok());
        assert!(router.set_default("missing").is_err());
    }
}
