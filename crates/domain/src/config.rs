//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DEACTIVATE_AFTER_FAILURES, DEFAULT_FETCH_TIMEOUT_SECS,
    DEFAULT_REFRESH_INTERVAL_MINUTES, DEFAULT_SCHEDULER_JOB_TIMEOUT_SECS,
    DEFAULT_SCHEDULER_SECRET_ENV, DEFAULT_SWEEP_CONCURRENCY, DEFAULT_SWEEP_CRON,
    DEFAULT_USER_AGENT, DEFAULT_VAULT_KEY_ENV, MANUAL_SYNC_MIN_INTERVAL_SECS,
};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub vault: VaultConfig,
    pub sync: SyncConfig,
    pub scheduler: SchedulerConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "hearth.db".to_string(), pool_size: 8 }
    }
}

/// Where the feed encryption key is read from.
///
/// Only the variable name lives in configuration; the key itself is loaded
/// once at startup and never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub key_env_var: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self { key_env_var: DEFAULT_VAULT_KEY_ENV.to_string() }
    }
}

/// Sync engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub default_refresh_interval_minutes: u32,
    pub manual_min_interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub sweep_concurrency: usize,
    pub sweep_budget_secs: Option<u64>,
    pub deactivate_after_failures: u32,
    pub user_agent: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_refresh_interval_minutes: DEFAULT_REFRESH_INTERVAL_MINUTES,
            manual_min_interval_secs: MANUAL_SYNC_MIN_INTERVAL_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            sweep_concurrency: DEFAULT_SWEEP_CONCURRENCY,
            sweep_budget_secs: None,
            deactivate_after_failures: DEFAULT_DEACTIVATE_AFTER_FAILURES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// In-process cron trigger for the batch sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub cron_expression: String,
    pub job_timeout_secs: u64,
    pub secret_env_var: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron_expression: DEFAULT_SWEEP_CRON.to_string(),
            job_timeout_secs: DEFAULT_SCHEDULER_JOB_TIMEOUT_SECS,
            secret_env_var: DEFAULT_SCHEDULER_SECRET_ENV.to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1:8080".to_string() }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
