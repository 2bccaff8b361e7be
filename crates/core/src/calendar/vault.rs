//! Credential vault: feed URL protection at rest
//!
//! Feed URLs are secrets (most ICS links embed a private token), so they are
//! only ever stored AES-GCM encrypted. Duplicate detection uses a keyed
//! blake3 hash of the normalized URL, and anything shown to people or logs
//! goes through [`mask`].

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use hearth_common::{CommonError, EncryptionService, SecureString};
use hearth_domain::constants::MAX_FEED_URL_LENGTH;
use hearth_domain::{HearthError, Result};
use url::Url;

const HASH_CONTEXT: &str = "hearth 2024 feed url dedup hash v1";
const KEY_LEN: usize = 32;

/// Process-wide holder of the feed encryption key.
///
/// Built once at startup from immutable configuration and shared behind an
/// `Arc`; there is no way to construct one without key material.
pub struct CredentialVault {
    cipher: EncryptionService,
    hash_key: [u8; KEY_LEN],
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("key_fingerprint", &self.cipher.key_fingerprint())
            .finish()
    }
}

impl CredentialVault {
    /// Build a vault from a raw 32-byte key.
    pub fn new(key: Vec<u8>) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(HearthError::Configuration(format!(
                "feed encryption key must be {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        let hash_key = blake3::derive_key(HASH_CONTEXT, &key);
        let cipher = EncryptionService::new(key).map_err(key_error)?;
        Ok(Self { cipher, hash_key })
    }

    /// Build a vault from a hex or base64 encoded key.
    pub fn from_encoded_key(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(HearthError::Configuration(
                "feed encryption key is empty".to_string(),
            ));
        }

        let decoded = if encoded.len() == KEY_LEN * 2 {
            hex::decode(encoded).ok()
        } else {
            None
        }
        .or_else(|| STANDARD.decode(encoded).ok())
        .or_else(|| URL_SAFE_NO_PAD.decode(encoded).ok())
        .ok_or_else(|| {
            HearthError::Configuration(
                "feed encryption key must be hex or base64 encoded".to_string(),
            )
        })?;

        Self::new(decoded)
    }

    pub fn key_fingerprint(&self) -> &str {
        self.cipher.key_fingerprint()
    }

    /// Seal a feed URL for storage.
    pub fn encrypt(&self, plaintext_url: &str) -> Result<String> {
        self.cipher
            .encrypt_to_string(plaintext_url.as_bytes())
            .map_err(|e| HearthError::Internal(format!("feed URL encryption failed: {e}")))
    }

    /// Recover a stored feed URL.
    ///
    /// Fails with [`HearthError::Decryption`] for corrupt ciphertext or a
    /// payload sealed under a different key.
    pub fn decrypt(&self, ciphertext: &str) -> Result<SecureString> {
        let bytes = self.cipher.decrypt_from_string(ciphertext).map_err(|e| match e {
            CommonError::KeyMismatch { payload_fingerprint } => HearthError::Decryption(format!(
                "credential sealed with rotated key {payload_fingerprint}"
            )),
            other => HearthError::Decryption(other.to_string()),
        })?;
        String::from_utf8(bytes)
            .map(SecureString::new)
            .map_err(|_| HearthError::Decryption("decrypted URL is not UTF-8".to_string()))
    }

    /// Deterministic, non-reversible hash of a normalized URL.
    pub fn hash(&self, normalized_url: &str) -> String {
        blake3::keyed_hash(&self.hash_key, normalized_url.as_bytes()).to_hex().to_string()
    }
}

fn key_error(err: CommonError) -> HearthError {
    HearthError::Configuration(format!("invalid feed encryption key: {err}"))
}

/// Canonical form of a feed URL used for hashing and storage.
///
/// Rewrites `webcal://`/`webcals://` to `https://`, lower-cases scheme and
/// host, drops default ports, fragments, and trailing slashes. Credentials
/// and query parameters are kept since they usually carry the feed token.
pub fn normalize(raw_url: &str) -> Result<String> {
    let trimmed = raw_url.trim();
    if trimmed.is_empty() {
        return Err(HearthError::Validation("feed URL is empty".to_string()));
    }
    if trimmed.len() > MAX_FEED_URL_LENGTH {
        return Err(HearthError::Validation(format!(
            "feed URL exceeds {MAX_FEED_URL_LENGTH} characters"
        )));
    }

    let rewritten = rewrite_webcal(trimmed);
    let mut url = Url::parse(&rewritten)
        .map_err(|e| HearthError::Validation(format!("malformed feed URL: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(HearthError::Validation(format!("unsupported URL scheme: {other}")));
        }
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(HearthError::Validation("feed URL has no host".to_string()));
    }

    url.set_fragment(None);
    let trimmed_path = url.path().trim_end_matches('/').to_string();
    url.set_path(&trimmed_path);

    let mut canonical = url.to_string();
    if url.query().is_none() {
        while canonical.ends_with('/') {
            canonical.pop();
        }
    }
    Ok(canonical)
}

/// Display-safe preview: scheme, host, and port only.
pub fn mask(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) if !host.is_empty() => match parsed.port() {
                Some(port) => format!("{}://{}:{}/***", parsed.scheme(), host, port),
                None => format!("{}://{}/***", parsed.scheme(), host),
            },
            _ => "***".to_string(),
        },
        Err(_) => "***".to_string(),
    }
}

fn rewrite_webcal(url: &str) -> String {
    for prefix in ["webcals://", "webcal://"] {
        if url.get(..prefix.len()).is_some_and(|head| head.eq_ignore_ascii_case(prefix)) {
            return format!("https://{}", &url[prefix.len()..]);
        }
    }
    url.to_string()
}
