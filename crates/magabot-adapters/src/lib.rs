//! Concrete platform transports.
//!
//! Three thin wrappers over vendor APIs, each implementing
//! [`PlatformAdapter`]: Telegram (Bot API long-poll via `teloxide`), Slack
//! (Socket Mode over a WebSocket), and WhatsApp (Business Cloud API). The
//! interesting work is normalization — collapsing each platform's native
//! event shape into [`IncomingMessage`] — and the ingest-task lifecycle:
//! every adapter owns its own tokio task(s), started non-blocking and
//! stopped through a [`CancellationToken`].
//!
//! [`PlatformAdapter`]: magabot_core::PlatformAdapter
//! [`IncomingMessage`]: magabot_core::IncomingMessage
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::missing_errors_doc)]

pub mod slack;
pub mod telegram;
pub mod whatsapp;

pub use slack::SlackAdapter;
pub use telegram::TelegramAdapter;
pub use whatsapp::WhatsAppAdapter;
