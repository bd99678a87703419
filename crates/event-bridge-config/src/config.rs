// crates/event-bridge-config/src/config.rs
// ============================================================================
// Module: Event Bridge Configuration
// Description: Configuration loading and validation for the event bridge.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with a size cap and validated
//! before any broker connection is attempted. Unknown fields are rejected.
//! Security posture: config inputs are untrusted; a config that cannot be
//! honoured fails closed at load time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::connection::Protocol;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "event-bridge.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "EVENT_BRIDGE_CONFIG";
/// Maximum size of the configuration file in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 256 * 1024;
/// Maximum total length of a config path.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default link credit / prefetch window.
pub const DEFAULT_CREDIT: u32 = 10;
/// Largest accepted credit window.
pub const MAX_CREDIT: u32 = 10_000;
/// Default MQTT client identifier.
const DEFAULT_CLIENT_ID: &str = "event-bridge";
/// AMQP container identifier used when `HOSTNAME` is unset or blank.
pub const DEFAULT_CONTAINER_ID: &str = "event-bridge";
/// Environment variable supplying the default AMQP container identifier.
pub const CONTAINER_ID_ENV_VAR: &str = "HOSTNAME";
/// Default MQTT keep-alive interval in seconds.
const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;
/// Smallest MQTT keep-alive the client library accepts.
pub const MIN_KEEP_ALIVE_SECS: u64 = 5;
/// Maximum number of MQTT topic filters.
const MAX_TOPICS: usize = 64;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Top-level bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Broker-side source configuration.
    pub source: SourceConfig,
    /// HTTP sink configuration.
    pub sink: SinkConfig,
    /// Failure policy for delivery and acknowledgment errors.
    #[serde(default)]
    pub policy: FailurePolicy,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Builds a configuration with defaults for everything but the two URIs.
    #[must_use]
    pub fn new(source_uri: impl Into<String>, sink_uri: impl Into<String>) -> Self {
        Self {
            source: SourceConfig::new(source_uri),
            sink: SinkConfig {
                uri: sink_uri.into(),
            },
            policy: FailurePolicy::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_config_path(path)?;
        let bytes = fs::read(&resolved)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", resolved.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.source.validate()?;
        self.sink.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Source
// ============================================================================

/// Whether the bridge dials the broker or accepts a broker connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Dial out to the broker.
    #[default]
    Client,
    /// Listen and accept a single inbound AMQP connection.
    Server,
}

/// MQTT topic filter with its subscription QoS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopicFilter {
    /// Topic filter, wildcards allowed.
    pub filter: String,
    /// Requested QoS level (0, 1, or 2).
    #[serde(default)]
    pub qos: u8,
}

/// Broker-side source configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Broker URI; may omit fields supplied by the credentials directory.
    pub uri: String,
    /// Client or server mode.
    #[serde(default)]
    pub mode: SourceMode,
    /// Credit window (AMQP link credit, MQTT inflight bound).
    #[serde(default = "default_credit")]
    pub credit: u32,
    /// Directory holding `connect-config` and `tls.ca`.
    #[serde(default)]
    pub credentials_dir: Option<PathBuf>,
    /// Skip TLS certificate verification. Testing only.
    #[serde(default)]
    pub insecure_skip_verify: bool,
    /// AMQP container identifier; defaults to `HOSTNAME` so replicas differ.
    #[serde(default = "default_container_id")]
    pub container_id: String,
    /// MQTT client identifier.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// MQTT keep-alive interval in seconds.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// MQTT topic filters; empty means the URI path at QoS 0.
    #[serde(default)]
    pub topics: Vec<TopicFilter>,
}

impl SourceConfig {
    /// Builds a client-mode source with default settings.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mode: SourceMode::Client,
            credit: DEFAULT_CREDIT,
            credentials_dir: None,
            insecure_skip_verify: false,
            container_id: default_container_id(),
            client_id: default_client_id(),
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            topics: Vec::new(),
        }
    }

    /// Returns the protocol implied by the URI scheme, if the URI has one.
    #[must_use]
    pub fn declared_protocol(&self) -> Option<Protocol> {
        let (scheme, _) = self.uri.split_once("://")?;
        Protocol::from_scheme(scheme)
    }

    /// Validates source settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a setting is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uri.trim().is_empty() {
            return Err(ConfigError::Invalid("source.uri must be non-empty".to_string()));
        }
        if let Some((scheme, _)) = self.uri.split_once("://")
            && Protocol::from_scheme(scheme).is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "source.uri scheme '{scheme}' is not supported"
            )));
        }
        if self.credit == 0 || self.credit > MAX_CREDIT {
            return Err(ConfigError::Invalid(format!(
                "source.credit must be between 1 and {MAX_CREDIT}"
            )));
        }
        if self.mode == SourceMode::Server && self.declared_protocol() == Some(Protocol::Mqtt) {
            return Err(ConfigError::Invalid(
                "source.mode = \"server\" is only supported for amqp".to_string(),
            ));
        }
        if self.container_id.trim().is_empty() {
            return Err(ConfigError::Invalid("source.container_id must be non-empty".to_string()));
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Invalid("source.client_id must be non-empty".to_string()));
        }
        if self.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
            return Err(ConfigError::Invalid(format!(
                "source.keep_alive_secs must be at least {MIN_KEEP_ALIVE_SECS}"
            )));
        }
        if self.topics.len() > MAX_TOPICS {
            return Err(ConfigError::Invalid(format!(
                "source.topics exceeds {MAX_TOPICS} entries"
            )));
        }
        for topic in &self.topics {
            if topic.filter.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "source.topics.filter must be non-empty".to_string(),
                ));
            }
            if topic.qos > 2 {
                return Err(ConfigError::Invalid(format!(
                    "source.topics qos {} for '{}' must be 0, 1, or 2",
                    topic.qos, topic.filter
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Sink
// ============================================================================

/// HTTP sink configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    /// Absolute http or https URL receiving one POST per event.
    pub uri: String,
}

impl SinkConfig {
    /// Validates the sink URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the URL is not absolute http(s).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.uri)
            .map_err(|err| ConfigError::Invalid(format!("sink.uri is invalid: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid("sink.uri must use http or https".to_string()));
        }
        if url.host().is_none() {
            return Err(ConfigError::Invalid("sink.uri must include a host".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Failure Policy
// ============================================================================

/// Action taken when translation or delivery fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryFailureAction {
    /// Reject the message and keep forwarding.
    #[default]
    Reject,
    /// Reject the message and stop the bridge.
    Terminate,
}

/// Action taken when acknowledging a message fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckFailureAction {
    /// Stop the bridge.
    #[default]
    Terminate,
    /// Log and keep forwarding.
    Continue,
}

/// Failure handling policy for the forwarding loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailurePolicy {
    /// Behaviour on translation or delivery failure.
    #[serde(default)]
    pub on_delivery_error: DeliveryFailureAction,
    /// Behaviour on acknowledgment failure.
    #[serde(default)]
    pub on_ack_error: AckFailureAction,
}

// ============================================================================
// SECTION: Logging
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable text lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level or filter directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Validates logging settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the level is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.level must be non-empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML or JSON parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the flag, environment, or default name.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the environment path is too long.
pub fn resolve_config_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Serde default for `source.credit`.
const fn default_credit() -> u32 {
    DEFAULT_CREDIT
}

/// Default AMQP container identifier taken from the environment.
#[must_use]
pub fn default_container_id() -> String {
    container_id_or_default(env::var(CONTAINER_ID_ENV_VAR).ok().as_deref())
}

/// Returns `hostname` when it is non-blank, else [`DEFAULT_CONTAINER_ID`].
#[must_use]
pub fn container_id_or_default(hostname: Option<&str>) -> String {
    hostname
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_CONTAINER_ID)
        .to_string()
}

/// Serde default for `source.client_id`.
fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

/// Serde default for `source.keep_alive_secs`.
const fn default_keep_alive_secs() -> u64 {
    DEFAULT_KEEP_ALIVE_SECS
}

/// Serde default for `logging.level`.
fn default_log_level() -> String {
    "info".to_string()
}
