//! Shared cryptographic primitives.

pub mod encryption;

pub use encryption::EncryptionService;
