//! AES-256-GCM encryption primitives.
//!
//! [`EncryptionService`] seals short secrets (feed URLs) into compact,
//! text-safe tokens:
//!
//! ```text
//! v1.<key fingerprint>.<base64 nonce>.<base64 ciphertext>
//! ```
//!
//! The fingerprint lets a reader tell "sealed with another key" apart from
//! "corrupted" without attempting decryption.
//!
//! ## Usage
//!
//! ```rust
//! use hearth_common::crypto::encryption::EncryptionService;
//!
//! let key = EncryptionService::generate_key();
//! let service = EncryptionService::new(key)?;
//!
//! let token = service.encrypt_to_string(b"https://example.com/feed.ics")?;
//! let plaintext = service.decrypt_from_string(&token)?;
//! assert_eq!(plaintext, b"https://example.com/feed.ics");
//! # Ok::<(), hearth_common::error::CommonError>(())
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{CommonError, CommonResult};

const TOKEN_VERSION: &str = "v1";
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// AES-GCM encryption service bound to one process-wide key.
pub struct EncryptionService {
    cipher: Aes256Gcm,
    fingerprint: String,
}

impl std::fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionService")
            .field("key", &"[REDACTED]")
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl EncryptionService {
    /// Create a new encryption service from a raw 32-byte key.
    pub fn new(key: Vec<u8>) -> CommonResult<Self> {
        let key = Zeroizing::new(key);
        if key.len() != KEY_LEN {
            return Err(CommonError::invalid_key(format!(
                "Encryption key must be exactly {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CommonError::invalid_key(format!("Failed to create cipher: {e}")))?;

        Ok(Self { cipher, fingerprint: fingerprint(&key) })
    }

    /// Generate a random 32-byte symmetric key.
    pub fn generate_key() -> Vec<u8> {
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    /// Short fingerprint of the loaded key, safe to log and persist.
    pub fn key_fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Encrypt bytes into a compact token.
    pub fn encrypt_to_string(&self, data: &[u8]) -> CommonResult<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(&Nonce::from(nonce_bytes), data)
            .map_err(|e| CommonError::internal(format!("Encryption failed: {e}")))?;

        Ok(format!(
            "{TOKEN_VERSION}.{}.{}.{}",
            self.fingerprint,
            BASE64.encode(nonce_bytes),
            BASE64.encode(ciphertext)
        ))
    }

    /// Decrypt a token produced by [`Self::encrypt_to_string`].
    pub fn decrypt_from_string(&self, token: &str) -> CommonResult<Vec<u8>> {
        let mut parts = token.split('.');
        let (Some(version), Some(key_id), Some(nonce), Some(ciphertext), None) =
            (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CommonError::invalid_payload("Malformed encrypted token"));
        };

        if version != TOKEN_VERSION {
            return Err(CommonError::invalid_payload(format!(
                "Unsupported token version: {version}"
            )));
        }
        if key_id != self.fingerprint {
            return Err(CommonError::KeyMismatch { payload_fingerprint: key_id.to_string() });
        }

        let nonce = BASE64
            .decode(nonce)
            .map_err(|e| CommonError::invalid_payload(format!("Nonce decode failed: {e}")))?;
        let nonce: [u8; NONCE_LEN] = nonce
            .as_slice()
            .try_into()
            .map_err(|_| CommonError::invalid_payload("Nonce must be exactly 12 bytes"))?;
        let ciphertext = BASE64
            .decode(ciphertext)
            .map_err(|e| CommonError::invalid_payload(format!("Ciphertext decode failed: {e}")))?;

        self.cipher
            .decrypt(&Nonce::from(nonce), ciphertext.as_ref())
            .map_err(|_| CommonError::invalid_payload("Decryption failed"))
    }
}

fn fingerprint(key: &[u8]) -> String {
    let digest = Sha256::digest(key);
    hex::encode(&digest[..6])
}
