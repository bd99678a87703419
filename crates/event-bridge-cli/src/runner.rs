// crates/event-bridge-cli/src/runner.rs
// ============================================================================
// Module: Event Bridge Runner
// Description: Connection resolution and source selection.
// Purpose: Turn a validated configuration into a running bridge.
// Dependencies: event-bridge-broker, event-bridge-config, event-bridge-core, tracing
// ============================================================================

//! ## Overview
//! [`run`] resolves the broker endpoint against the credentials directory,
//! builds the translator from the protocol and canonical endpoint, opens the
//! HTTP sink, and then connects the source selected by protocol and mode.
//! The sink is built before the broker is contacted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use event_bridge_broker::AmqpOptions;
use event_bridge_broker::AmqpSource;
use event_bridge_broker::Bridge;
use event_bridge_broker::BridgeError;
use event_bridge_broker::BridgeSummary;
use event_bridge_broker::HttpSink;
use event_bridge_broker::MqttSettings;
use event_bridge_broker::MqttSource;
use event_bridge_broker::connect;
use event_bridge_config::BridgeConfig;
use event_bridge_config::ConfigError;
use event_bridge_config::ConnectionConfig;
use event_bridge_config::Protocol;
use event_bridge_config::SourceMode;
use event_bridge_core::Translator;
use tracing::info;

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Runs the bridge described by `config` until end of stream, a terminating
/// error, or `shutdown`.
///
/// # Errors
///
/// Returns [`BridgeError`] for configuration, connection, and terminating
/// loop failures.
pub async fn run<F>(config: &BridgeConfig, shutdown: F) -> Result<BridgeSummary, BridgeError>
where
    F: Future<Output = ()>,
{
    let connection = ConnectionConfig::resolve(
        &config.source.uri,
        config.source.credentials_dir.as_deref(),
        config.source.insecure_skip_verify,
    )?;
    let translator = Translator::new(connection.protocol.event_type(), connection.canonical());
    let sink = HttpSink::new(&config.sink.uri)?;
    info!(
        source = %connection.canonical(),
        protocol = connection.protocol.as_str(),
        server_mode = config.source.mode == SourceMode::Server,
        tls = connection.tls,
        credit = config.source.credit,
        container_id = %config.source.container_id,
        "resolved broker connection"
    );

    match (connection.protocol, config.source.mode) {
        (Protocol::Amqp, SourceMode::Client) => {
            let options = AmqpOptions::from_config(&config.source);
            let source = AmqpSource::client(&connection, &options).await?;
            Bridge::new(source, translator, sink, config.policy).run_until(shutdown).await
        }
        (Protocol::Amqp, SourceMode::Server) => {
            let options = AmqpOptions::from_config(&config.source);
            let listener = connect::listen(&connection).await?;
            info!(listen = %connection.endpoint.authority(), "waiting for amqp peer");
            let source = AmqpSource::server(&listener, &options).await?;
            Bridge::new(source, translator, sink, config.policy).run_until(shutdown).await
        }
        (Protocol::Mqtt, SourceMode::Client) => {
            let settings = MqttSettings::from_config(&config.source, &connection)?;
            let source = MqttSource::connect(&connection, &settings).await?;
            Bridge::new(source, translator, sink, config.policy).run_until(shutdown).await
        }
        (Protocol::Mqtt, SourceMode::Server) => Err(BridgeError::Config(ConfigError::Invalid(
            "server mode is only supported for amqp".to_string(),
        ))),
    }
}
