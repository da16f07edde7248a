//! At-rest encryption for magabot.
//!
//! A [`Vault`] wraps a 256-bit XChaCha20-Poly1305 key. Every encryption
//! uses a fresh random 24-byte nonce, prepended to the ciphertext, so the
//! output is self-contained. Decryption failure is a single opaque error
//! kind: wrong key, tampered ciphertext, and truncated input are
//! indistinguishable to callers.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod vault;

pub use error::{VaultError, VaultResult};
pub use vault::Vault;
