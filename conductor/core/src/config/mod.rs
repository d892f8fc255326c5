//! TOML Configuration File Support
//!
//! Centralized configuration loading for the client, from a TOML file at
//! `~/.config/klai/client.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! The configuration file follows the XDG Base Directory specification:
//! - `$XDG_CONFIG_HOME/klai/client.toml` (typically `~/.config/klai/client.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! base_url = "http://localhost:8080"
//! query_timeout_secs = 60
//! probe_timeout_secs = 5
//! user_id = "anon"
//! session_id = "default"
//!
//! [monitor]
//! enabled = true
//! interval_secs = 30
//!
//! [conversation]
//! image_prompt = "Please analyze this image."
//! max_message_chars = 4000
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::availability::MonitorConfig;
use crate::backend::BackendConfig;
use crate::conductor::ConductorConfig;

/// Environment variable for the backend base URL
pub const ENV_BACKEND_URL: &str = "KLAI_BACKEND_URL";
/// Environment variable for the query timeout (seconds)
pub const ENV_QUERY_TIMEOUT: &str = "KLAI_QUERY_TIMEOUT_SECS";
/// Environment variable for the probe timeout (seconds)
pub const ENV_PROBE_TIMEOUT: &str = "KLAI_PROBE_TIMEOUT_SECS";
/// Environment variable for the backend user id
pub const ENV_USER_ID: &str = "KLAI_USER_ID";
/// Environment variable for the backend session id
pub const ENV_SESSION_ID: &str = "KLAI_SESSION_ID";
/// Environment variable enabling the availability monitor
pub const ENV_MONITOR_ENABLED: &str = "KLAI_MONITOR_ENABLED";
/// Environment variable for the monitor interval (seconds)
pub const ENV_MONITOR_INTERVAL: &str = "KLAI_MONITOR_INTERVAL_SECS";
/// Environment variable for the input length limit
pub const ENV_MAX_MESSAGE_CHARS: &str = "KLAI_MAX_MESSAGE_CHARS";

/// Setting keys accepted by [`ClientConfig::source_of`], named after their TOML paths
pub mod keys {
    /// `backend.base_url`
    pub const BACKEND_URL: &str = "backend.base_url";
    /// `backend.query_timeout_secs`
    pub const QUERY_TIMEOUT: &str = "backend.query_timeout_secs";
    /// `backend.probe_timeout_secs`
    pub const PROBE_TIMEOUT: &str = "backend.probe_timeout_secs";
    /// `backend.user_id`
    pub const USER_ID: &str = "backend.user_id";
    /// `backend.session_id`
    pub const SESSION_ID: &str = "backend.session_id";
    /// `monitor.enabled`
    pub const MONITOR_ENABLED: &str = "monitor.enabled";
    /// `monitor.interval_secs`
    pub const MONITOR_INTERVAL: &str = "monitor.interval_secs";
    /// `conversation.image_prompt`
    pub const IMAGE_PROMPT: &str = "conversation.image_prompt";
    /// `conversation.max_message_chars`
    pub const MAX_MESSAGE_CHARS: &str = "conversation.max_message_chars";
}

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Base URL of the assistant backend
    pub base_url: Option<String>,

    /// Query timeout in seconds
    pub query_timeout_secs: Option<u64>,

    /// Availability probe timeout in seconds
    pub probe_timeout_secs: Option<u64>,

    /// User identifier sent with queries
    pub user_id: Option<String>,

    /// Backend session identifier
    pub session_id: Option<String>,
}

/// Monitor section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorToml {
    /// Whether to poll availability
    pub enabled: Option<bool>,

    /// Seconds between probes
    pub interval_secs: Option<u64>,
}

/// Conversation section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationToml {
    /// Prompt sent when an image is submitted without text
    pub image_prompt: Option<String>,

    /// Longest accepted input, in characters
    pub max_message_chars: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Backend configuration section
    pub backend: BackendToml,

    /// Availability monitor section
    pub monitor: MonitorToml,

    /// Conversation section
    pub conversation: ConversationToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Centralized client configuration
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Backend connection settings
    pub backend: BackendConfig,

    /// Whether the availability monitor runs
    pub monitor_enabled: bool,

    /// Seconds between availability probes
    pub monitor_interval: Duration,

    /// Prompt sent when an image is submitted without text
    pub image_prompt: String,

    /// Longest accepted input, in characters
    pub max_message_chars: usize,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Where each non-default value came from, by setting key
    sources: HashMap<&'static str, ConfigSource>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            monitor_enabled: true,
            monitor_interval: Duration::from_secs(30),
            image_prompt: crate::conductor::DEFAULT_IMAGE_PROMPT.to_string(),
            max_message_chars: 4000,
            config_file_path: None,
            sources: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    ///
    /// The highest-priority layer that set any value.
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        [ConfigSource::Cli, ConfigSource::Env, ConfigSource::File]
            .into_iter()
            .find(|layer| self.sources.values().any(|s| s == layer))
            .unwrap_or(ConfigSource::Default)
    }

    /// Where a single setting came from
    ///
    /// `key` is one of the [`keys`] constants. Unknown keys and values left
    /// at their defaults report [`ConfigSource::Default`].
    #[must_use]
    pub fn source_of(&self, key: &str) -> ConfigSource {
        self.sources
            .get(key)
            .copied()
            .unwrap_or(ConfigSource::Default)
    }

    fn record(&mut self, key: &'static str, source: ConfigSource) {
        self.sources.insert(key, source);
    }

    /// Settings for the availability monitor
    #[must_use]
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: self.monitor_interval,
            probe_timeout: self.backend.probe_timeout,
        }
    }

    /// Settings for the Conductor
    #[must_use]
    pub fn conductor_config(&self) -> ConductorConfig {
        ConductorConfig {
            image_prompt: self.image_prompt.clone(),
            max_message_chars: self.max_message_chars,
            query_timeout: self.backend.query_timeout,
        }
    }

    /// Check that every value is usable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.backend.base_url).map_err(|e| {
            ConfigError::ValidationError(format!(
                "backend.base_url {:?} is not a URL: {e}",
                self.backend.base_url
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError(format!(
                "backend.base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.backend.query_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "backend.query_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.backend.probe_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "backend.probe_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.monitor_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "monitor.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_message_chars == 0 {
            return Err(ConfigError::ValidationError(
                "conversation.max_message_chars must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/klai/client.toml` or
/// `~/.config/klai/client.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("klai").join("client.toml"))
}

/// Load configuration from all sources with proper priority
///
/// CLI overrides are not handled here; apply [`ConfigOverrides`] afterwards
/// and call [`ClientConfig::validate`] again.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// a resulting value is invalid. A missing config file is not an error.
pub async fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path()).await
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub async fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    load_with_env(path.as_deref(), &|key| std::env::var(key).ok()).await
}

async fn load_with_env(
    path: Option<&Path>,
    env: &(dyn Fn(&str) -> Option<String> + Sync),
) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();

    if let Some(config_path) = path {
        match tokio::fs::read_to_string(config_path).await {
            Ok(toml_content) => {
                let toml_config: ClientToml = toml::from_str(&toml_content)?;
                apply_toml_config(&mut config, &toml_config);
                config.config_file_path = Some(config_path.to_path_buf());

                tracing::info!(
                    path = %config_path.display(),
                    "Loaded configuration from file"
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    path = %config_path.display(),
                    "Config file not found, using defaults"
                );
            }
            Err(e) => {
                return Err(ConfigError::ReadError {
                    path: config_path.to_path_buf(),
                    source: e,
                });
            }
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ClientConfig, toml: &ClientToml) {
    let file = ConfigSource::File;

    // Backend settings
    if let Some(ref url) = toml.backend.base_url {
        config.backend.base_url = url.trim_end_matches('/').to_string();
        config.record(keys::BACKEND_URL, file);
    }
    if let Some(secs) = toml.backend.query_timeout_secs {
        config.backend.query_timeout = Duration::from_secs(secs);
        config.record(keys::QUERY_TIMEOUT, file);
    }
    if let Some(secs) = toml.backend.probe_timeout_secs {
        config.backend.probe_timeout = Duration::from_secs(secs);
        config.record(keys::PROBE_TIMEOUT, file);
    }
    if let Some(ref user_id) = toml.backend.user_id {
        config.backend.user_id.clone_from(user_id);
        config.record(keys::USER_ID, file);
    }
    if let Some(ref session_id) = toml.backend.session_id {
        config.backend.session_id.clone_from(session_id);
        config.record(keys::SESSION_ID, file);
    }

    // Monitor settings
    if let Some(enabled) = toml.monitor.enabled {
        config.monitor_enabled = enabled;
        config.record(keys::MONITOR_ENABLED, file);
    }
    if let Some(secs) = toml.monitor.interval_secs {
        config.monitor_interval = Duration::from_secs(secs);
        config.record(keys::MONITOR_INTERVAL, file);
    }

    // Conversation settings
    if let Some(ref prompt) = toml.conversation.image_prompt {
        config.image_prompt.clone_from(prompt);
        config.record(keys::IMAGE_PROMPT, file);
    }
    if let Some(chars) = toml.conversation.max_message_chars {
        config.max_message_chars = chars;
        config.record(keys::MAX_MESSAGE_CHARS, file);
    }
}

fn parse_env<T: std::str::FromStr>(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = key, value = %raw, "Ignoring unparseable environment value");
            None
        }
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut ClientConfig, env: &dyn Fn(&str) -> Option<String>) {
    let from_env = ConfigSource::Env;

    if let Some(url) = env(ENV_BACKEND_URL) {
        config.backend.base_url = url.trim().trim_end_matches('/').to_string();
        config.record(keys::BACKEND_URL, from_env);
    }
    if let Some(secs) = parse_env::<u64>(env, ENV_QUERY_TIMEOUT) {
        config.backend.query_timeout = Duration::from_secs(secs);
        config.record(keys::QUERY_TIMEOUT, from_env);
    }
    if let Some(secs) = parse_env::<u64>(env, ENV_PROBE_TIMEOUT) {
        config.backend.probe_timeout = Duration::from_secs(secs);
        config.record(keys::PROBE_TIMEOUT, from_env);
    }
    if let Some(user_id) = env(ENV_USER_ID) {
        config.backend.user_id = user_id;
        config.record(keys::USER_ID, from_env);
    }
    if let Some(session_id) = env(ENV_SESSION_ID) {
        config.backend.session_id = session_id;
        config.record(keys::SESSION_ID, from_env);
    }
    if let Some(enabled) = env(ENV_MONITOR_ENABLED) {
        config.monitor_enabled = enabled != "0" && !enabled.eq_ignore_ascii_case("false");
        config.record(keys::MONITOR_ENABLED, from_env);
    }
    if let Some(secs) = parse_env::<u64>(env, ENV_MONITOR_INTERVAL) {
        config.monitor_interval = Duration::from_secs(secs);
        config.record(keys::MONITOR_INTERVAL, from_env);
    }
    if let Some(chars) = parse_env::<usize>(env, ENV_MAX_MESSAGE_CHARS) {
        config.max_message_chars = chars;
        config.record(keys::MAX_MESSAGE_CHARS, from_env);
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Backend URL override
    pub backend_url: Option<String>,

    /// Monitor enabled override
    pub monitor_enabled: Option<bool>,

    /// Query timeout override (seconds)
    pub query_timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set backend URL override
    #[must_use]
    pub fn with_backend_url(mut self, url: String) -> Self {
        self.backend_url = Some(url);
        self
    }

    /// Set monitor enabled override
    #[must_use]
    pub fn with_monitor_enabled(mut self, enabled: bool) -> Self {
        self.monitor_enabled = Some(enabled);
        self
    }

    /// Set query timeout override
    #[must_use]
    pub fn with_query_timeout_secs(mut self, secs: u64) -> Self {
        self.query_timeout_secs = Some(secs);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ClientConfig) {
        if let Some(ref url) = self.backend_url {
            config.backend.base_url = url.trim_end_matches('/').to_string();
            config.record(keys::BACKEND_URL, ConfigSource::Cli);
        }

        if let Some(enabled) = self.monitor_enabled {
            config.monitor_enabled = enabled;
            config.record(keys::MONITOR_ENABLED, ConfigSource::Cli);
        }

        if let Some(secs) = self.query_timeout_secs {
            config.backend.query_timeout = Duration::from_secs(secs);
            config.record(keys::QUERY_TIMEOUT, ConfigSource::Cli);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
