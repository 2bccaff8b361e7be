//! Startup loading of process-wide secrets
//!
//! The feed encryption key and the scheduler secret are read once from the
//! environment variables named in configuration. A missing or malformed
//! value fails fast with a configuration error.

use std::sync::Arc;

use hearth_common::{EncryptionService, SecureString};
use hearth_core::CredentialVault;
use hearth_domain::{HearthError, Result, SchedulerConfig, VaultConfig};
use tracing::info;

/// Loads secrets from the environment.
pub struct KeyManager;

impl KeyManager {
    /// Build the credential vault from the configured key variable.
    pub fn load_vault(config: &VaultConfig) -> Result<Arc<CredentialVault>> {
        let encoded = read_secret(&config.key_env_var, "feed encryption key")?;
        let vault = CredentialVault::from_encoded_key(encoded.expose())?;
        info!(key_fingerprint = vault.key_fingerprint(), "feed encryption key loaded");
        Ok(Arc::new(vault))
    }

    /// Read the shared secret that authenticates batch sync triggers.
    pub fn load_scheduler_secret(config: &SchedulerConfig) -> Result<SecureString> {
        read_secret(&config.secret_env_var, "scheduler secret")
    }

    /// Generate a new random hex-encoded feed encryption key.
    pub fn generate_key() -> String {
        hex::encode(EncryptionService::generate_key())
    }
}

fn read_secret(var: &str, what: &str) -> Result<SecureString> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(SecureString::new(value.trim().to_string())),
        _ => Err(HearthError::Configuration(format!("{what} not set: export {var}"))),
    }
}
