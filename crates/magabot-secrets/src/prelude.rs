//! Prelude re-exports for convenient use.

pub use crate::backend::SecretBackend;
pub use crate::chain::ChainBackend;
pub use crate::claude::ClaudeCredsBackend;
pub use crate::env::EnvBackend;
pub use crate::error::{SecretsError, SecretsResult};
pub use crate::hashivault::HashiVaultBackend;
pub use crate::local::LocalBackend;
pub use crate::manager::{SecretMapping, SecretsManager};
