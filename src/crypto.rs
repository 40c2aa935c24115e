//! Encryption for cached ERP credentials.
//!
//! Credentials are sealed with ChaCha20-Poly1305 under a key derived by
//! hashing a configured secret. Keys are versioned: every stored record
//! carries the id of the key that sealed it, so secrets can be rotated
//! without orphaning existing records. Decryption verifies the
//! authentication tag and fails closed.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::ErpSessionConfig;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("no key configured with id '{0}'")]
    UnknownKey(String),

    #[error("stored blob is malformed: {0}")]
    Malformed(String),

    #[error("integrity check failed, record is corrupt or sealed under a different secret")]
    Integrity,

    #[error("encryption failed")]
    Encrypt,
}

/// The encrypted credential blob as persisted: everything base64, tag kept
/// separate from the ciphertext so the record mirrors what it stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedCredentials {
    pub key_id: String,
    pub nonce: String,
    pub cipher_text: String,
    pub auth_tag: String,
}

struct DerivedKey {
    id: String,
    key: [u8; 32],
}

pub struct SessionCipher {
    keys: Vec<DerivedKey>,
    active: usize,
}

impl SessionCipher {
    pub fn from_config(config: &ErpSessionConfig) -> anyhow::Result<Self> {
        let keys: Vec<DerivedKey> = config
            .keys
            .iter()
            .map(|k| DerivedKey {
                id: k.id.clone(),
                key: derive_key(&k.secret),
            })
            .collect();

        let active = keys
            .iter()
            .position(|k| k.id == config.active_key)
            .ok_or_else(|| {
                anyhow::anyhow!("active key '{}' is not configured", config.active_key)
            })?;

        Ok(Self { keys, active })
    }

    /// Seal `plaintext` under the active key with a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedCredentials, CryptoError> {
        let active = &self.keys[self.active];
        let nonce_bytes: [u8; NONCE_LEN] = rand::rng().random();

        let cipher =
            ChaCha20Poly1305::new_from_slice(&active.key).map_err(|_| CryptoError::Encrypt)?;
        let mut sealed = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| CryptoError::Encrypt)?;

        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        Ok(EncryptedCredentials {
            key_id: active.id.clone(),
            nonce: BASE64.encode(nonce_bytes),
            cipher_text: BASE64.encode(sealed),
            auth_tag: BASE64.encode(tag),
        })
    }

    /// Open a stored blob with the key it names. Any tampering with the
    /// ciphertext, nonce, or tag surfaces as [`CryptoError::Integrity`].
    pub fn decrypt(&self, blob: &EncryptedCredentials) -> Result<Vec<u8>, CryptoError> {
        let key = self
            .keys
            .iter()
            .find(|k| k.id == blob.key_id)
            .ok_or_else(|| CryptoError::UnknownKey(blob.key_id.clone()))?;

        let nonce = BASE64
            .decode(&blob.nonce)
            .map_err(|e| CryptoError::Malformed(format!("nonce: {e}")))?;
        if nonce.len() != NONCE_LEN {
            return Err(CryptoError::Malformed("nonce length".to_string()));
        }

        let mut sealed = BASE64
            .decode(&blob.cipher_text)
            .map_err(|e| CryptoError::Malformed(format!("ciphertext: {e}")))?;
        let tag = BASE64
            .decode(&blob.auth_tag)
            .map_err(|e| CryptoError::Malformed(format!("tag: {e}")))?;
        if tag.len() != TAG_LEN {
            return Err(CryptoError::Malformed("tag length".to_string()));
        }
        sealed.extend_from_slice(&tag);

        let cipher =
            ChaCha20Poly1305::new_from_slice(&key.key).map_err(|_| CryptoError::Encrypt)?;
        cipher
            .decrypt(Nonce::from_slice(&nonce), sealed.as_slice())
            .map_err(|_| CryptoError::Integrity)
    }

    #[must_use]
    pub fn active_key_id(&self) -> &str {
        &self.keys[self.active].id
    }
}

fn derive_key(secret: &str) -> [u8; 32] {
    let digest = Sha256::digest(secret.as_bytes());
    digest.into()
}
