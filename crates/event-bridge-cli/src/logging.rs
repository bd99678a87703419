// crates/event-bridge-cli/src/logging.rs
// ============================================================================
// Module: Event Bridge Logging
// Description: tracing subscriber installation from `[logging]`.
// Purpose: Emit structured text or JSON logs on stderr.
// Dependencies: tracing-subscriber, thiserror
// ============================================================================

//! ## Overview
//! Installs a global `tracing` subscriber once per process. `RUST_LOG`
//! overrides the configured level when it is set and non-empty.

// ============================================================================
// SECTION: Imports
// ============================================================================

use event_bridge_config::LogFormat;
use event_bridge_config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable that overrides the configured filter.
pub const LOG_ENV_VAR: &str = "RUST_LOG";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Logging setup failures.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Filter directive did not parse.
    #[error("invalid log filter '{directive}': {reason}")]
    Filter {
        /// Directive that was rejected.
        directive: String,
        /// Parser message.
        reason: String,
    },
    /// A global subscriber is already installed.
    #[error("logging initialization failed: {0}")]
    Init(String),
}

// ============================================================================
// SECTION: Setup
// ============================================================================

/// Builds the level filter, preferring a non-empty environment directive.
///
/// # Errors
///
/// Returns [`LoggingError::Filter`] when the chosen directive is invalid.
pub fn build_filter(level: &str, env_directive: Option<&str>) -> Result<EnvFilter, LoggingError> {
    let directive =
        env_directive.map(str::trim).filter(|directive| !directive.is_empty()).unwrap_or(level);
    EnvFilter::try_new(directive).map_err(|err| LoggingError::Filter {
        directive: directive.to_string(),
        reason: err.to_string(),
    })
}

/// Installs the global subscriber writing to stderr.
///
/// # Errors
///
/// Returns [`LoggingError`] when the filter is invalid or a subscriber is
/// already installed.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let env_directive = std::env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(&config.level, env_directive.as_deref())?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| LoggingError::Init(err.to_string()))
}
