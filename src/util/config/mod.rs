//! fiberpool configuration loading
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. CLI arguments
//! 2. Environment variables (FIBERPOOL_*)
//! 3. Explicit config file, or ~/.config/fiberpool/config.toml
//! 4. Default values
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use fiberpool::util::config::load_config;
//!
//! let config = load_config(None).unwrap();
//! assert!(config.num_workers > 0);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::runtime::scheduler::SchedulerConfig;

/// Environment variable overriding `num_workers`.
pub const ENV_WORKERS: &str = "FIBERPOOL_WORKERS";
/// Environment variable overriding `idle_timeout_ms`.
pub const ENV_IDLE_TIMEOUT_MS: &str = "FIBERPOOL_IDLE_TIMEOUT_MS";
/// Environment variable overriding `drain_policy`.
pub const ENV_DRAIN: &str = "FIBERPOOL_DRAIN";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Config serialize error: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Invalid value for {key}: '{value}'")]
    InvalidEnv { key: String, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    // Try XDG config directory on Unix
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join("fiberpool"));
    }

    // Fallback to ~/.config/fiberpool
    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join("fiberpool"));
    }

    // On Windows, try %APPDATA%
    if let Ok(appdata) = std::env::var("APPDATA") {
        return Some(PathBuf::from(appdata).join("fiberpool"));
    }

    None
}

/// Get the user config file path (~/.config/fiberpool/config.toml)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Parse a configuration from TOML. Missing keys take their defaults.
pub fn from_toml_str(content: &str) -> Result<SchedulerConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Render a configuration as TOML.
pub fn to_toml_string(config: &SchedulerConfig) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}

/// Read a configuration file.
pub fn load_file(path: &Path) -> Result<SchedulerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    from_toml_str(&content)
}

/// Apply overrides looked up through `lookup` (normally `std::env::var`).
pub fn apply_overrides<F>(
    config: &mut SchedulerConfig,
    lookup: F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let invalid = |key: &str, value: &str| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    };

    if let Some(value) = lookup(ENV_WORKERS) {
        config.num_workers = value
            .trim()
            .parse()
            .map_err(|_| invalid(ENV_WORKERS, &value))?;
    }
    if let Some(value) = lookup(ENV_IDLE_TIMEOUT_MS) {
        config.idle_timeout_ms = value
            .trim()
            .parse()
            .map_err(|_| invalid(ENV_IDLE_TIMEOUT_MS, &value))?;
    }
    if let Some(value) = lookup(ENV_DRAIN) {
        config.drain_policy = value.trim().parse().map_err(|_| invalid(ENV_DRAIN, &value))?;
    }
    Ok(())
}

/// Load the effective configuration.
///
/// Reads `path` if given, otherwise the user config file if it exists, then
/// applies environment overrides and validates the result.
pub fn load_config(path: Option<&Path>) -> Result<SchedulerConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_file(path)?,
        None => match get_config_path() {
            Some(user) if user.exists() => load_file(&user)?,
            _ => SchedulerConfig::default(),
        },
    };
    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}
