//! The symmetric vault.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{AeadCore, XChaCha20Poly1305, XNonce};
use rand::RngCore as _;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{VaultError, VaultResult};

/// Key length in bytes.
const KEY_LEN: usize = 32;

/// XChaCha20 nonce length in bytes, prepended to every ciphertext.
const NONCE_LEN: usize = 24;

/// Raw key material, wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
struct KeyMaterial([u8; KEY_LEN]);

/// Authenticated symmetric encryption with a 256-bit key.
pub struct Vault {
    key: KeyMaterial,
}

impl Vault {
    /// Create a vault from raw key bytes.
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self {
            key: KeyMaterial(key),
        }
    }

    /// Create a vault with a freshly generated random key.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self::from_key(key)
    }

    /// Create a vault from a base64-encoded key (the on-disk form).
    pub fn from_base64(encoded: &str) -> VaultResult<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| VaultError::InvalidKey)?;
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| VaultError::InvalidKey)?;
        Ok(Self::from_key(key))
    }

    /// Export the key as base64 (for persisting to the key file).
    pub fn key_base64(&self) -> String {
        BASE64.encode(self.key.0)
    }

    /// Load the key file at `path`, creating it (0600) with a fresh key
    /// when it does not exist.
    pub fn load_or_create(path: &Path) -> VaultResult<Self> {
        if path.exists() {
            let encoded = std::fs::read_to_string(path)?;
            return Self::from_base64(&encoded);
        }

        let vault = Self::generate();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, vault.key_base64())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(vault)
    }

    /// Encrypt `plaintext`, returning `nonce ‖ ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> VaultResult<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new((&self.key.0).into());
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| VaultError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a blob produced by [`Vault::encrypt`].
    pub fn decrypt(&self, blob: &[u8]) -> VaultResult<Vec<u8>> {
        if blob.len() < NONCE_LEN {
            return Err(VaultError::Decrypt);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let cipher = XChaCha20Poly1305::new((&self.key.0).into());
        cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::Decrypt)
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault").finish_non_exhaustive()
    }
}
