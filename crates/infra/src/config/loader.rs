//! Configuration loader
//!
//! ## Loading Strategy
//! 1. If `HEARTH_DB_PATH` is set, configuration comes from the environment;
//!    every other variable is optional and falls back to its default.
//! 2. Otherwise a `hearth.toml` / `hearth.json` file is probed.
//! 3. With neither, built-in defaults are used.
//!
//! ## Environment Variables
//! - `HEARTH_DB_PATH`, `HEARTH_DB_POOL_SIZE`
//! - `HEARTH_REFRESH_INTERVAL_MINUTES`, `HEARTH_MANUAL_MIN_INTERVAL_SECS`
//! - `HEARTH_FETCH_TIMEOUT_SECS`, `HEARTH_SWEEP_CONCURRENCY`,
//!   `HEARTH_SWEEP_BUDGET_SECS`, `HEARTH_DEACTIVATE_AFTER_FAILURES`,
//!   `HEARTH_USER_AGENT`
//! - `HEARTH_SCHEDULER_ENABLED`, `HEARTH_SCHEDULER_CRON`,
//!   `HEARTH_SCHEDULER_JOB_TIMEOUT_SECS`
//! - `HEARTH_BIND_ADDRESS`, `HEARTH_LOG_LEVEL`, `HEARTH_LOG_JSON`
//!
//! Secrets (vault key, scheduler secret) are never part of [`Config`]; only
//! the names of the variables that hold them are.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use hearth_domain::{Config, HearthError, Result};

const CONFIG_FILE_NAMES: [&str; 4] = ["hearth.toml", "hearth.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy.
pub fn load() -> Result<Config> {
    if std::env::var_os("HEARTH_DB_PATH").is_some() {
        let config = load_from_env()?;
        tracing::info!("configuration loaded from environment variables");
        return Ok(config);
    }

    match probe_config_paths() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::info!("no configuration file found; using defaults");
            Ok(Config::default())
        }
    }
}

/// Load configuration from environment variables.
///
/// `HEARTH_DB_PATH` is required; unset optional variables keep their defaults.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var("HEARTH_DB_PATH")?;
    apply(&mut config.database.pool_size, "HEARTH_DB_POOL_SIZE")?;

    apply(&mut config.sync.default_refresh_interval_minutes, "HEARTH_REFRESH_INTERVAL_MINUTES")?;
    apply(&mut config.sync.manual_min_interval_secs, "HEARTH_MANUAL_MIN_INTERVAL_SECS")?;
    apply(&mut config.sync.fetch_timeout_secs, "HEARTH_FETCH_TIMEOUT_SECS")?;
    apply(&mut config.sync.sweep_concurrency, "HEARTH_SWEEP_CONCURRENCY")?;
    if let Some(budget) = env_parse::<u64>("HEARTH_SWEEP_BUDGET_SECS")? {
        config.sync.sweep_budget_secs = Some(budget);
    }
    apply(&mut config.sync.deactivate_after_failures, "HEARTH_DEACTIVATE_AFTER_FAILURES")?;
    apply(&mut config.sync.user_agent, "HEARTH_USER_AGENT")?;

    config.scheduler.enabled = env_bool("HEARTH_SCHEDULER_ENABLED", config.scheduler.enabled);
    apply(&mut config.scheduler.cron_expression, "HEARTH_SCHEDULER_CRON")?;
    apply(&mut config.scheduler.job_timeout_secs, "HEARTH_SCHEDULER_JOB_TIMEOUT_SECS")?;

    apply(&mut config.server.bind_address, "HEARTH_BIND_ADDRESS")?;
    apply(&mut config.logging.level, "HEARTH_LOG_LEVEL")?;
    config.logging.json = env_bool("HEARTH_LOG_JSON", config.logging.json);

    Ok(config)
}

/// Load configuration from a file.
///
/// If `path` is `None`, probes the standard locations.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(HearthError::Configuration(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            HearthError::Configuration("no config file found in any standard location".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(|e| {
        HearthError::Configuration(format!("failed to read config file: {e}"))
    })?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content; format follows the extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| HearthError::Configuration(format!("invalid TOML config: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| HearthError::Configuration(format!("invalid JSON config: {e}"))),
        _ => Err(HearthError::Configuration(format!("unsupported config format: {extension}"))),
    }
}

/// First existing config file in the working directory, its parent, or next
/// to the executable.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }
    let exe_dir = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf));
    dirs.extend(exe_dir);

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        HearthError::Configuration(format!("missing required environment variable: {key}"))
    })
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| HearthError::Configuration(format!("invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

fn apply<T>(target: &mut T, key: &str) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = env_parse(key)? {
        *target = value;
    }
    Ok(())
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
