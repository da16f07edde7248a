//! Core types shared by every magabot crate.
//!
//! This crate defines the vocabulary of the bridge:
//!
//! - [`IncomingMessage`] — the normalized inbound event all adapters produce
//! - [`PlatformAdapter`] — the transport capability set
//! - [`MessageHandler`] / [`HandlerSlot`] — the single inbound callback
//! - [`media`] — download constraints applied by adapters
//! - [`MagabotDirs`] — the user-scoped filesystem layout
//!
//! Nothing here talks to the network; concrete transports live in
//! `magabot-adapters` and `magabot-webhook`.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod adapter;
pub mod dirs;
pub mod error;
pub mod identity;
pub mod media;
pub mod message;
pub mod prelude;

pub use adapter::{HandlerSlot, MessageHandler, PlatformAdapter, reply_future};
pub use dirs::MagabotDirs;
pub use error::{CoreError, CoreResult};
pub use identity::hash_user_id;
pub use message::IncomingMessage;
