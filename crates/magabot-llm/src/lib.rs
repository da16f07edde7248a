//! LLM provider clients.
//!
//! The bridge treats language models as an external collaborator behind
//! the [`LlmProvider`] trait: conversation history in, reply text out.
//! Two concrete clients are provided — the Anthropic Messages API and any
//! OpenAI-compatible `/chat/completions` endpoint — plus an
//! [`LlmRouter`] that holds registered providers keyed by name.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod prelude;

mod anthropic;
mod error;
mod openai_compat;
mod provider;
mod router;
mod types;

pub use anthropic::AnthropicProvider;
pub use error::{LlmError, LlmResult};
pub use openai_compat::OpenAiCompatProvider;
pub use provider::{LlmProvider, ProviderConfig};
pub use router::LlmRouter;
pub use types::{ChatMessage, ChatRole};
