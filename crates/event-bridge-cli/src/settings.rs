// crates/event-bridge-cli/src/settings.rs
// ============================================================================
// Module: Event Bridge Settings
// Description: Command line overrides layered over the TOML configuration.
// Purpose: Produce one validated configuration from file and flags.
// Dependencies: event-bridge-config
// ============================================================================

//! ## Overview
//! Flags win over file values. When neither `--config` nor
//! `EVENT_BRIDGE_CONFIG` names a file, the default file is absent, and both
//! URIs are given as flags, the bridge runs on defaults without a file.
//! Invariants:
//! - The returned configuration has passed [`BridgeConfig::validate`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::path::Path;
use std::path::PathBuf;

use event_bridge_config::BridgeConfig;
use event_bridge_config::CONFIG_ENV_VAR;
use event_bridge_config::ConfigError;
use event_bridge_config::DEFAULT_CONFIG_NAME;
use event_bridge_config::SourceMode;

// ============================================================================
// SECTION: Overrides
// ============================================================================

/// Values supplied on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Replaces `source.uri`.
    pub source_uri: Option<String>,
    /// Replaces `sink.uri`.
    pub sink_uri: Option<String>,
    /// Replaces `source.credit`.
    pub credit: Option<u32>,
    /// Replaces `source.credentials_dir`.
    pub credentials_dir: Option<PathBuf>,
    /// Forces `source.mode = "server"`.
    pub server: bool,
}

impl Overrides {
    /// Writes every supplied value into `config`.
    pub fn apply(&self, config: &mut BridgeConfig) {
        if let Some(uri) = &self.source_uri {
            config.source.uri.clone_from(uri);
        }
        if let Some(uri) = &self.sink_uri {
            config.sink.uri.clone_from(uri);
        }
        if let Some(credit) = self.credit {
            config.source.credit = credit;
        }
        if let Some(dir) = &self.credentials_dir {
            config.source.credentials_dir = Some(dir.clone());
        }
        if self.server {
            config.source.mode = SourceMode::Server;
        }
    }
}

/// Loads the configuration file, applies overrides, and validates the result.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be loaded or the merged
/// configuration is invalid.
pub fn load_config(
    path: Option<&Path>,
    overrides: &Overrides,
) -> Result<BridgeConfig, ConfigError> {
    let named = path.is_some() || env::var_os(CONFIG_ENV_VAR).is_some();
    let mut config = match (&overrides.source_uri, &overrides.sink_uri) {
        (Some(source), Some(sink)) if !named && !Path::new(DEFAULT_CONFIG_NAME).exists() => {
            BridgeConfig::new(source.clone(), sink.clone())
        }
        _ => BridgeConfig::load(path)?,
    };
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}
