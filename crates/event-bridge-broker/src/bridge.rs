// crates/event-bridge-broker/src/bridge.rs
// ============================================================================
// Module: Event Bridge Forwarding Loop
// Description: Receive, translate, deliver, and settle, one message at a time.
// Purpose: Tie acknowledgments to forwarding outcomes under one failure policy.
// Dependencies: event-bridge-config, event-bridge-core, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! [`Bridge`] drives a [`Source`] and a [`Sink`] through the states
//! `Idle -> Receiving -> Translating -> Delivering -> Acking -> Receiving`.
//! Every error is classified by [`BridgeError::kind`] and resolved by
//! [`ErrorKind::disposition`] against the configured [`FailurePolicy`]; this
//! is the single place where the loop decides to continue or stop.
//! Invariants:
//! - A second receive is never issued before the prior message is settled.
//! - A message is accepted only after the sink confirmed delivery.
//! - End of stream closes the source and returns the summary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::pin::pin;

use event_bridge_config::AckFailureAction;
use event_bridge_config::ConfigError;
use event_bridge_config::DeliveryFailureAction;
use event_bridge_config::FailurePolicy;
use event_bridge_core::Message;
use event_bridge_core::TranslateError;
use event_bridge_core::Translator;
use event_bridge_core::event_id;
use thiserror::Error;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::connect::ConnectError;
use crate::sink::DeliveryReceipt;
use crate::sink::Sink;
use crate::sink::SinkError;
use crate::source::Received;
use crate::source::Source;
use crate::source::SourceError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error category used for the continue-or-stop decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Configuration could not be loaded or resolved.
    Configuration,
    /// Transport, TLS, or protocol setup failed.
    Connection,
    /// Receiving from the broker failed.
    Receive,
    /// The message body cannot be expressed as a CloudEvent.
    UnsupportedFormat,
    /// The sink did not accept the event.
    Delivery,
    /// Accept or reject could not be sent to the broker.
    Acknowledge,
}

/// Outcome of applying the failure policy to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep forwarding.
    Continue,
    /// Stop the loop and report the error.
    Terminate,
}

impl ErrorKind {
    /// Resolves this kind against the failure policy.
    #[must_use]
    pub const fn disposition(self, policy: &FailurePolicy) -> Disposition {
        match self {
            Self::Configuration | Self::Connection | Self::Receive => Disposition::Terminate,
            Self::UnsupportedFormat | Self::Delivery => match policy.on_delivery_error {
                DeliveryFailureAction::Reject => Disposition::Continue,
                DeliveryFailureAction::Terminate => Disposition::Terminate,
            },
            Self::Acknowledge => match policy.on_ack_error {
                AckFailureAction::Continue => Disposition::Continue,
                AckFailureAction::Terminate => Disposition::Terminate,
            },
        }
    }

    /// Returns a stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Connection => "connection",
            Self::Receive => "receive",
            Self::UnsupportedFormat => "unsupported_format",
            Self::Delivery => "delivery",
            Self::Acknowledge => "acknowledge",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified bridge error.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Connection failure outside a source.
    #[error(transparent)]
    Connect(#[from] ConnectError),
    /// Source failure.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// Translation failure.
    #[error(transparent)]
    Translate(#[from] TranslateError),
    /// Sink failure.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl BridgeError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Connect(_) | Self::Source(SourceError::Connect(_)) => ErrorKind::Connection,
            Self::Source(SourceError::Acknowledge(_)) => ErrorKind::Acknowledge,
            Self::Source(_) => ErrorKind::Receive,
            Self::Translate(_) => ErrorKind::UnsupportedFormat,
            Self::Sink(_) => ErrorKind::Delivery,
        }
    }
}

// ============================================================================
// SECTION: Loop State
// ============================================================================

/// Forwarding loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Not started.
    Idle,
    /// Waiting for the next message.
    Receiving,
    /// Building the CloudEvent.
    Translating,
    /// Posting to the sink.
    Delivering,
    /// Sending accept or reject.
    Acking,
}

impl LoopState {
    /// Returns a stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Receiving => "receiving",
            Self::Translating => "translating",
            Self::Delivering => "delivering",
            Self::Acking => "acking",
        }
    }
}

/// Message counts for one bridge run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeSummary {
    /// Messages received from the source.
    pub received: u64,
    /// Messages delivered and accepted.
    pub forwarded: u64,
    /// Messages rejected after a translation or delivery failure.
    pub rejected: u64,
}

// ============================================================================
// SECTION: Bridge
// ============================================================================

/// Sequential forwarding loop.
pub struct Bridge<S, K> {
    /// Message source.
    source: S,
    /// CloudEvents translator.
    translator: Translator,
    /// Event sink.
    sink: K,
    /// Failure policy.
    policy: FailurePolicy,
    /// Current state.
    state: LoopState,
    /// Running counts.
    summary: BridgeSummary,
}

impl<S, K> Bridge<S, K>
where
    S: Source,
    K: Sink,
{
    /// Assembles a bridge in the idle state.
    #[must_use]
    pub const fn new(source: S, translator: Translator, sink: K, policy: FailurePolicy) -> Self {
        Self {
            source,
            translator,
            sink,
            policy,
            state: LoopState::Idle,
            summary: BridgeSummary {
                received: 0,
                forwarded: 0,
                rejected: 0,
            },
        }
    }

    /// Runs until end of stream or a terminating error.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] when an error's disposition is terminate.
    pub async fn run(self) -> Result<BridgeSummary, BridgeError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs until end of stream, a terminating error, or `shutdown` resolves.
    ///
    /// `shutdown` is only observed while waiting for a message, so an
    /// in-flight message is always settled first.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] when an error's disposition is terminate.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<BridgeSummary, BridgeError>
    where
        F: Future<Output = ()>,
    {
        info!(
            source = self.source.endpoint(),
            sink = self.sink.target(),
            event_type = self.translator.event_type(),
            "bridge started"
        );
        let mut shutdown = pin!(shutdown);
        loop {
            self.transition(LoopState::Receiving);
            let received = tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!(source = self.source.endpoint(), "shutdown requested");
                    self.close_source().await;
                    return Ok(self.summary);
                }
                received = self.source.receive() => received,
            };
            match received {
                Ok(Some(received)) => {
                    self.summary.received += 1;
                    if let Err(err) = self.handle(received).await {
                        error!(
                            source = self.source.endpoint(),
                            sink = self.sink.target(),
                            kind = err.kind().as_str(),
                            error = %err,
                            "bridge terminating"
                        );
                        self.close_source().await;
                        return Err(err);
                    }
                }
                Ok(None) => {
                    info!(
                        source = self.source.endpoint(),
                        received = self.summary.received,
                        forwarded = self.summary.forwarded,
                        rejected = self.summary.rejected,
                        "source reached end of stream"
                    );
                    self.close_source().await;
                    self.transition(LoopState::Idle);
                    return Ok(self.summary);
                }
                Err(err) => {
                    let err = BridgeError::from(err);
                    error!(
                        source = self.source.endpoint(),
                        kind = err.kind().as_str(),
                        error = %err,
                        "receive failed"
                    );
                    self.close_source().await;
                    return Err(err);
                }
            }
        }
    }

    /// Forwards one message and settles it. `Err` means terminate.
    async fn handle(&mut self, received: Received<S::Handle>) -> Result<(), BridgeError> {
        let Received {
            message,
            handle,
        } = received;
        let id = event_id(&message.id);
        match self.forward(&message).await {
            Ok(receipt) => {
                self.transition(LoopState::Acking);
                match self.source.accept(handle).await {
                    Ok(()) => {
                        self.summary.forwarded += 1;
                        debug!(
                            source = self.source.endpoint(),
                            event_id = %receipt.event_id,
                            status = receipt.status.unwrap_or_default(),
                            "message forwarded and accepted"
                        );
                        Ok(())
                    }
                    Err(err) => self.settlement_failed(err, &id),
                }
            }
            Err(err) => {
                warn!(
                    source = self.source.endpoint(),
                    sink = self.sink.target(),
                    message_id = %id,
                    kind = err.kind().as_str(),
                    error = %err,
                    "forwarding failed; rejecting message"
                );
                self.transition(LoopState::Acking);
                match self.source.reject(handle).await {
                    Ok(()) => self.summary.rejected += 1,
                    Err(ack) => self.settlement_failed(ack, &id)?,
                }
                match err.kind().disposition(&self.policy) {
                    Disposition::Continue => Ok(()),
                    Disposition::Terminate => Err(err),
                }
            }
        }
    }

    /// Translates and delivers one message.
    async fn forward(&mut self, message: &Message) -> Result<DeliveryReceipt, BridgeError> {
        self.transition(LoopState::Translating);
        let request = self.translator.translate(message)?;
        self.transition(LoopState::Delivering);
        Ok(self.sink.deliver(&request).await?)
    }

    /// Applies the acknowledgment policy to a failed accept or reject.
    fn settlement_failed(&self, err: SourceError, message_id: &str) -> Result<(), BridgeError> {
        let err = BridgeError::from(err);
        match err.kind().disposition(&self.policy) {
            Disposition::Continue => {
                warn!(
                    source = self.source.endpoint(),
                    message_id = %message_id,
                    error = %err,
                    "acknowledgment failed; continuing"
                );
                Ok(())
            }
            Disposition::Terminate => Err(err),
        }
    }

    /// Closes the source, logging rather than propagating failures.
    async fn close_source(&mut self) {
        if let Err(err) = self.source.close().await {
            warn!(source = self.source.endpoint(), error = %err, "source close failed");
        }
    }

    /// Records a state transition.
    fn transition(&mut self, next: LoopState) {
        debug!(from = self.state.as_str(), to = next.as_str(), "bridge state");
        self.state = next;
    }
}
