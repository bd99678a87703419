// crates/event-bridge-cli/src/main.rs
// ============================================================================
// Module: Event Bridge CLI Entry Point
// Description: Command line entry for the AMQP/MQTT to CloudEvents bridge.
// Purpose: Load configuration, install logging, and run one bridge.
// Dependencies: clap, event-bridge-cli, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! `event-bridge` loads `event-bridge.toml` (or the path from `--config` or
//! `EVENT_BRIDGE_CONFIG`), applies flag overrides, and forwards messages
//! until the source ends or Ctrl-C is received. Exit status is 0 on a
//! graceful end and 1 on any configuration, connection, receive, or
//! terminating forwarding failure.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use event_bridge_cli::logging;
use event_bridge_cli::runner;
use event_bridge_cli::settings::Overrides;
use event_bridge_cli::settings::load_config;
use thiserror::Error;
use tracing::error;
use tracing::info;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "event-bridge", version, about = "Forward AMQP or MQTT messages as CloudEvents")]
struct Cli {
    /// Configuration file (overrides `EVENT_BRIDGE_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Broker URI, e.g. `amqps://broker:5671/queue` or `mqtt://host/topic`.
    #[arg(long, value_name = "URI")]
    source_uri: Option<String>,
    /// CloudEvents HTTP endpoint.
    #[arg(long, value_name = "URI")]
    sink_uri: Option<String>,
    /// Maximum unsettled messages.
    #[arg(long, value_name = "N")]
    credit: Option<u32>,
    /// Directory holding `connect-config` and `tls.ca`.
    #[arg(long, value_name = "DIR")]
    credentials_dir: Option<PathBuf>,
    /// Accept one inbound AMQP connection instead of dialing.
    #[arg(long)]
    server: bool,
}

impl Cli {
    /// Collects flag values that override the configuration file.
    fn overrides(&self) -> Overrides {
        Overrides {
            source_uri: self.source_uri.clone(),
            sink_uri: self.sink_uri.clone(),
            credit: self.credit,
            credentials_dir: self.credentials_dir.clone(),
            server: self.server,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Loads configuration, installs logging, and runs the bridge.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), &cli.overrides())
        .map_err(|err| CliError::new(format!("configuration error: {err}")))?;
    logging::init(&config.logging).map_err(|err| CliError::new(err.to_string()))?;

    match runner::run(&config, shutdown_signal()).await {
        Ok(summary) => {
            info!(
                received = summary.received,
                forwarded = summary.forwarded,
                rejected = summary.rejected,
                "bridge stopped"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!(kind = err.kind().as_str(), error = %err, "bridge failed");
            Err(CliError::new(format!("{} error: {err}", err.kind())))
        }
    }
}

/// Resolves on Ctrl-C; never resolves when the handler cannot be installed.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
