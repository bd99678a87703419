// crates/event-bridge-broker/src/lib.rs
// ============================================================================
// Module: Event Bridge Broker Library
// Description: Broker sources, CloudEvents sinks, and the forwarding loop.
// Purpose: Move AMQP and MQTT messages to HTTP endpoints with acknowledgments.
// Dependencies: event-bridge-config, event-bridge-core, fe2o3-amqp, reqwest, rumqttc, tokio
// ============================================================================

//! ## Overview
//! Event Bridge Broker provides the [`Source`] implementations for AMQP 1.0
//! and MQTT 3.1.1, the [`HttpSink`] CloudEvents target, and the [`Bridge`]
//! loop that connects them under a credit window.
//! Invariants:
//! - A message is accepted only after the sink confirmed delivery.
//! - No more than the configured credit of messages is ever unsettled.
//! - Sinks return receipts only on successful delivery.
//!
//! Security posture: broker and sink endpoints are untrusted; credentials are
//! never rendered into logs or event attributes.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod bridge;
pub mod connect;
pub mod credit;
pub mod sink;
pub mod source;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use bridge::Bridge;
pub use bridge::BridgeError;
pub use bridge::BridgeSummary;
pub use bridge::Disposition;
pub use bridge::ErrorKind;
pub use bridge::LoopState;
pub use connect::BoxedStream;
pub use connect::ConnectError;
pub use connect::Transport;
pub use connect::tls_client_config;
pub use credit::CreditError;
pub use credit::CreditWindow;
pub use sink::ChannelSink;
pub use sink::DeliveryReceipt;
pub use sink::HttpSink;
pub use sink::Sink;
pub use sink::SinkError;
pub use source::AmqpOptions;
pub use source::AmqpSource;
pub use source::ChannelSource;
pub use source::DeliveryTag;
pub use source::MqttSettings;
pub use source::MqttSource;
pub use source::Received;
pub use source::Settlement;
pub use source::SettlementLog;
pub use source::Source;
pub use source::SourceError;
