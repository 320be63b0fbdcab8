//! Field sealing around the persistence boundary.
//!
//! Stores call [`Sealer::seal`] on content before writing it and
//! [`Sealer::unseal`] after reading it. A sealing failure aborts the
//! enclosing operation; nothing falls back to storing plaintext.
//!
//! [`AesGcmSealer`] output format: base64 of `nonce (12 bytes) || ciphertext`.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::SealError;

/// Nonce size for AES-256-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

/// Opaque sealed value as it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedBlob(String);

impl SealedBlob {
    /// Wrap an already-sealed value.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The sealed value as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Encryption capability applied to stored content.
#[async_trait]
pub trait Sealer: Send + Sync {
    async fn seal(&self, plaintext: &str) -> Result<SealedBlob, SealError>;

    async fn unseal(&self, blob: &SealedBlob) -> Result<String, SealError>;
}

/// Stores content as-is. Only for deployments that explicitly opt out of
/// encryption, and for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughSealer;

#[async_trait]
impl Sealer for PassthroughSealer {
    async fn seal(&self, plaintext: &str) -> Result<SealedBlob, SealError> {
        Ok(SealedBlob::new(plaintext))
    }

    async fn unseal(&self, blob: &SealedBlob) -> Result<String, SealError> {
        Ok(blob.as_str().to_string())
    }
}

/// AES-256-GCM sealer with a random nonce per call.
///
/// Sealing the same plaintext twice produces different blobs.
pub struct AesGcmSealer {
    cipher: Aes256Gcm,
}

impl AesGcmSealer {
    /// Create a sealer from a raw 32-byte key.
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.into()),
        }
    }

    /// Create a sealer from a base64-encoded 32-byte key.
    pub fn from_base64_key(encoded: &str) -> Result<Self, SealError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| SealError::InvalidKey)?;
        let key: [u8; 32] = bytes.try_into().map_err(|_| SealError::InvalidKey)?;
        Ok(Self::new(&key))
    }
}

#[async_trait]
impl Sealer for AesGcmSealer {
    async fn seal(&self, plaintext: &str) -> Result<SealedBlob, SealError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| SealError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(SealedBlob::new(STANDARD.encode(out)))
    }

    async fn unseal(&self, blob: &SealedBlob) -> Result<String, SealError> {
        let data = STANDARD
            .decode(blob.as_str())
            .map_err(|_| SealError::InvalidEncoding)?;
        if data.len() < NONCE_SIZE {
            return Err(SealError::CiphertextTooShort);
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| SealError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| SealError::DecryptionFailed)
    }
}
