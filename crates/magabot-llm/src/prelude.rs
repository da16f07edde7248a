//! Prelude re-exports for convenient use.

pub use crate::anthropic::AnthropicProvider;
pub use crate::error::{LlmError, LlmResult};
pub use crate::openai_compat::OpenAiCompatProvider;
pub use crate::provider::{LlmProvider, ProviderConfig};
pub use crate::router::LlmRouter;
pub use crate::types::{ChatMessage, ChatRole};
