//! Configuration for the magabot daemon.
//!
//! One YAML file, user-scoped (`~/.magabot/config.yaml`, 0600). Loading
//! fills defaults for absent fields, then a validation pass rejects
//! combinations the daemon cannot run with. Secrets may be left empty in
//! the file and overlaid from a secrets backend at startup.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::must_use_candidate)]

mod error;
mod loader;
mod types;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load, save};
pub use types::{
    AuditConfig, AuthMethod, BackupConfig, Config, LlmConfig, LoggingConfig, SecretsBackendKind,
    SecretsConfig, SecurityConfig, SessionConfig, SlackConfig, TelegramConfig, WebhookConfig,
    WhatsAppConfig,
};
pub use validate::validate;
