//! Common error types for reusable primitives
//!
//! Higher layers map these onto their own taxonomy; the credential vault, for
//! example, turns key problems into configuration errors and payload problems
//! into decryption errors.

use thiserror::Error;

/// Errors raised by primitives in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommonError {
    /// Key material is missing, malformed, or the wrong size.
    #[error("Invalid key material: {message}")]
    InvalidKey { message: String },

    /// Payload could not be decoded or authenticated.
    #[error("Invalid payload: {message}")]
    InvalidPayload { message: String },

    /// Payload was sealed with a different key than the one loaded.
    #[error("Key mismatch: payload sealed with key {payload_fingerprint}")]
    KeyMismatch { payload_fingerprint: String },

    /// Internal errors that shouldn't normally occur
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CommonError {
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey { message: message.into() }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

/// Result alias for common primitives.
pub type CommonResult<T> = Result<T, CommonError>;
