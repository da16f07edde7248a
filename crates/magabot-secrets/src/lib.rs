//! Secret storage for magabot.
//!
//! A [`SecretsManager`] fronts one primary backend with an optional
//! fallback. Backends expose a uniform capability set
//! (`get`/`set`/`delete`/`list`/`ping`); not-found is distinguishable from
//! backend failure so the manager knows when falling through is safe.
//!
//! At startup the manager overlays secrets onto empty config fields — a
//! value present in the config file always wins over the backend.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod prelude;

mod backend;
mod chain;
mod claude;
mod env;
mod error;
mod hashivault;
mod local;
mod manager;

pub use backend::SecretBackend;
pub use chain::ChainBackend;
pub use claude::ClaudeCredsBackend;
pub use env::EnvBackend;
pub use error::{SecretsError, SecretsResult};
pub use hashivault::HashiVaultBackend;
pub use local::LocalBackend;
pub use manager::{SecretMapping, SecretsManager};
