//! # Hearth Common
//!
//! Reusable primitives shared across the Hearth workspace.
//!
//! - [`crypto`]: AES-256-GCM sealing of short secrets
//! - [`security`]: zeroizing secret strings and constant-time comparison
//! - [`error`]: error type for the primitives above

pub mod crypto;
pub mod error;
pub mod security;

pub use crypto::EncryptionService;
pub use error::{CommonError, CommonResult};
pub use security::{constant_time_eq, SecureString};
