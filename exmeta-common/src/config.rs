//! Bootstrap configuration loading and base URL resolution
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--base-url`)
//! 2. Environment variable (`EXMETA_BASE_URL`)
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: defaults are used and startup continues.

use crate::api::ApiRoutes;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable overriding the remote base URL
pub const BASE_URL_ENV: &str = "EXMETA_BASE_URL";

/// First port tried for the loopback login callback
pub const DEFAULT_CALLBACK_START_PORT: u16 = 8080;

/// How long the loopback listener waits for the browser redirect
pub const DEFAULT_CALLBACK_TIMEOUT_MS: u64 = 60_000;

/// Interval between token store polls while waiting for a login
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Total time spent polling the token store before giving up
pub const DEFAULT_POLL_BUDGET_MS: u64 = 60_000;

const CONFIG_DIR_NAME: &str = "exmeta";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Remote service base URL
    #[serde(default)]
    pub base_url: Option<String>,

    /// First port tried for the loopback callback listener
    #[serde(default)]
    pub callback_start_port: Option<u16>,

    /// Login timing overrides
    #[serde(default)]
    pub auth: AuthTimingConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[auth]` section: login timing overrides in milliseconds
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthTimingConfig {
    #[serde(default)]
    pub callback_timeout_ms: Option<u64>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub poll_budget_ms: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Fully resolved client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub routes: ApiRoutes,
    pub callback_start_port: u16,
    pub callback_timeout: Duration,
    pub poll_interval: Duration,
    pub poll_budget: Duration,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::resolve(None, &TomlConfig::default())
    }
}

impl ClientConfig {
    /// Resolve the effective configuration from all sources
    ///
    /// Blank values at any tier are skipped so that an empty environment
    /// variable does not mask the TOML value.
    pub fn resolve(cli_base_url: Option<&str>, toml_config: &TomlConfig) -> Self {
        let env_base_url = std::env::var(BASE_URL_ENV).ok();

        let base_url = [
            (cli_base_url, "command line"),
            (env_base_url.as_deref(), "environment"),
            (toml_config.base_url.as_deref(), "TOML"),
        ]
        .into_iter()
        .find_map(|(value, source)| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (v.to_string(), source))
        });

        let routes = match base_url {
            Some((url, source)) => {
                info!(base_url = %url, source, "Remote base URL resolved");
                ApiRoutes::new(url)
            }
            None => {
                let routes = ApiRoutes::compiled_default();
                info!(base_url = %routes.base_url(), "Using compiled default base URL");
                routes
            }
        };

        let timing = &toml_config.auth;
        Self {
            routes,
            callback_start_port: toml_config
                .callback_start_port
                .unwrap_or(DEFAULT_CALLBACK_START_PORT),
            callback_timeout: Duration::from_millis(
                timing.callback_timeout_ms.unwrap_or(DEFAULT_CALLBACK_TIMEOUT_MS),
            ),
            poll_interval: Duration::from_millis(
                timing.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS).max(1),
            ),
            poll_budget: Duration::from_millis(
                timing.poll_budget_ms.unwrap_or(DEFAULT_POLL_BUDGET_MS),
            ),
            log_level: toml_config.logging.level.clone(),
        }
    }
}

/// Default configuration file path for the platform
///
/// `~/.config/exmeta/config.toml` on Linux, `%APPDATA%\exmeta\config.toml`
/// on Windows, `~/Library/Application Support/exmeta/config.toml` on macOS.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load the TOML bootstrap configuration
///
/// With `explicit_path` set the file must exist. Without it the platform
/// default path is tried and a missing file yields defaults.
pub fn load_toml_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit_path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            Some(path) => {
                info!(path = %path.display(), "No config file found, using defaults");
                return Ok(TomlConfig::default());
            }
            None => {
                info!("Could not determine config directory, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    debug!(path = %path.display(), "Loading config file");
    let content = std::fs::read_to_string(&path)?;
    parse_toml_config(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Parse TOML text into a [`TomlConfig`]
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}
