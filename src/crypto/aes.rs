//! AES-256-GCM encryption-at-rest for OAuth tokens and webhook secrets
//! (spec.md §4.3/§4.7).

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encryption key for AES-256-GCM
#[derive(Clone)]
pub struct EncryptionKey {
    key: [u8; 32],
}

#[derive(Error, Debug)]
pub enum EncryptionError {
    #[error("Invalid key: must be exactly 32 bytes (256 bits)")]
    InvalidKeyLength,

    #[error("Invalid base64 encoding: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,

    #[error("Invalid ciphertext format")]
    InvalidCiphertextFormat,
}

impl EncryptionKey {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn from_base64(encoded: &str) -> Result<Self, EncryptionError> {
        let bytes = BASE64URL.decode(encoded)?;
        if bytes.len() != 32 {
            return Err(EncryptionError::InvalidKeyLength);
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        Ok(Self { key })
    }

    /// Derive a key from arbitrary configured material: used verbatim if
    /// already 32 bytes, otherwise SHA-256-hashed to size (spec.md §4.3).
    pub fn from_config_material(material: &[u8]) -> Self {
        if material.len() == 32 {
            let mut key = [0u8; 32];
            key.copy_from_slice(material);
            return Self { key };
        }
        let digest = Sha256::digest(material);
        Self { key: digest.into() }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

/// Encrypt plaintext using AES-256-GCM.
///
/// Output layout: `12-byte nonce ‖ 16-byte auth tag ‖ ciphertext`,
/// base64url-encoded (no padding) — spec.md §4.3.
pub fn encrypt(key: &EncryptionKey, plaintext: &str) -> Result<String, EncryptionError> {
    let cipher =
        Aes256Gcm::new_from_slice(&key.key).map_err(|_| EncryptionError::EncryptionFailed)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    // aes-gcm appends the 16-byte tag to the end of its ciphertext output.
    let mut sealed = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| EncryptionError::EncryptionFailed)?;
    let tag = sealed.split_off(sealed.len() - TAG_LEN);
    let ciphertext = sealed;

    let mut blob = Vec::with_capacity(NONCE_LEN + TAG_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&tag);
    blob.extend_from_slice(&ciphertext);

    Ok(BASE64URL.encode(blob))
}

/// Decrypt a blob produced by [encrypt].
pub fn decrypt(key: &EncryptionKey, encrypted: &str) -> Result<String, EncryptionError> {
    let blob = BASE64URL.decode(encrypted)?;
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(EncryptionError::InvalidCiphertextFormat);
    }

    let (nonce_bytes, rest) = blob.split_at(NONCE_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    let cipher =
        Aes256Gcm::new_from_slice(&key.key).map_err(|_| EncryptionError::DecryptionFailed)?;
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, sealed.as_ref())
        .map_err(|_| EncryptionError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| EncryptionError::DecryptionFailed)
}
