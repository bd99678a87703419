// crates/event-bridge-broker/src/source/mod.rs
// ============================================================================
// Module: Event Bridge Message Sources
// Description: Source trait and broker-backed implementations.
// Purpose: Yield broker messages and settle them once forwarding completes.
// Dependencies: async-trait, event-bridge-core, thiserror
// ============================================================================

//! ## Overview
//! A [`Source`] yields [`Received`] messages, each carrying an opaque handle
//! that must be passed back to [`Source::accept`] or [`Source::reject`].
//! `Ok(None)` from [`Source::receive`] is a graceful end of stream.
//! Invariants:
//! - At most `credit` messages are unsettled at any time.
//! - A handle is settled exactly once.
//!
//! Security posture: message content is untrusted and passed through without
//! interpretation beyond the CloudEvents mapping.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use event_bridge_core::Message;
use thiserror::Error;

use crate::connect::ConnectError;
use crate::credit::CreditError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A message together with its acknowledgment handle.
#[derive(Debug)]
pub struct Received<H> {
    /// Decoded message.
    pub message: Message,
    /// Protocol handle used to settle the message.
    pub handle: H,
}

/// Errors emitted by message sources.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport or protocol setup failed.
    #[error(transparent)]
    Connect(#[from] ConnectError),
    /// Receive attempted while every credit is held by an unsettled message.
    #[error("credit exhausted: {outstanding} of {max} messages unsettled")]
    CreditExhausted {
        /// Unsettled message count.
        outstanding: u32,
        /// Window size.
        max: u32,
    },
    /// The broker connection or link failed while receiving.
    #[error("receive failed: {0}")]
    Receive(String),
    /// Accept or reject could not be sent.
    #[error("acknowledgment failed: {0}")]
    Acknowledge(String),
    /// The source was already closed.
    #[error("source is closed")]
    Closed,
}

impl From<CreditError> for SourceError {
    fn from(err: CreditError) -> Self {
        match err {
            CreditError::Exhausted {
                outstanding,
                max,
            } => Self::CreditExhausted {
                outstanding,
                max,
            },
            CreditError::NothingOutstanding => Self::Acknowledge(err.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Source Trait
// ============================================================================

/// Broker-side message source.
#[async_trait]
pub trait Source: Send {
    /// Acknowledgment handle returned with each message.
    type Handle: Send;

    /// Waits for the next message.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when receiving fails or no credit is left.
    async fn receive(&mut self) -> Result<Option<Received<Self::Handle>>, SourceError>;

    /// Settles a message as successfully forwarded.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Acknowledge`] when the outcome cannot be sent.
    async fn accept(&mut self, handle: Self::Handle) -> Result<(), SourceError>;

    /// Settles a message as not forwarded.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Acknowledge`] when the outcome cannot be sent.
    async fn reject(&mut self, handle: Self::Handle) -> Result<(), SourceError>;

    /// Releases the link and connection.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the peer rejects the close.
    async fn close(&mut self) -> Result<(), SourceError>;

    /// Canonical, credential-free description of where messages come from.
    fn endpoint(&self) -> &str;
}

// ============================================================================
// SECTION: Implementations
// ============================================================================

pub mod amqp;
pub mod channel;
pub mod mqtt;

pub use amqp::AmqpOptions;
pub use amqp::AmqpSource;
pub use channel::ChannelSource;
pub use channel::DeliveryTag;
pub use channel::Settlement;
pub use channel::SettlementLog;
pub use mqtt::MqttSettings;
pub use mqtt::MqttSource;
