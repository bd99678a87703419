// crates/event-bridge-broker/src/sink/mod.rs
// ============================================================================
// Module: Event Bridge Sinks
// Description: Sink trait and implementations for CloudEvents delivery.
// Purpose: Deliver translated events to concrete targets.
// Dependencies: async-trait, event-bridge-core, thiserror
// ============================================================================

//! ## Overview
//! Sinks deliver [`EventRequest`] values and return a [`DeliveryReceipt`]
//! only when the target confirmed the event.
//! Invariants:
//! - Receipts are returned only after successful delivery.
//! - Sinks never retry; the caller decides what a failure means.
//!
//! Security posture: the sink is an external system; response bodies are
//! logged only as a bounded prefix.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use event_bridge_core::EventRequest;
use thiserror::Error;

// ============================================================================
// SECTION: Sink Errors
// ============================================================================

/// Errors emitted by sinks.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Sink URI is unusable.
    #[error("invalid sink uri: {0}")]
    InvalidUri(String),
    /// HTTP client could not be constructed.
    #[error("http client setup failed: {0}")]
    Client(String),
    /// Request could not be sent or the response was not read.
    #[error("sink request failed: {0}")]
    Request(String),
    /// Sink answered with a non-success status.
    #[error("sink returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Bounded prefix of the response body.
        body: String,
    },
    /// In-process receiver is gone or full.
    #[error("sink channel unavailable: {0}")]
    Channel(String),
}

// ============================================================================
// SECTION: Receipts
// ============================================================================

/// Confirmation of a delivered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// CloudEvents id of the delivered event.
    pub event_id: String,
    /// HTTP status when the sink is HTTP.
    pub status: Option<u16>,
}

// ============================================================================
// SECTION: Sink Trait
// ============================================================================

/// Delivers translated events.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Delivers one event.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when delivery fails.
    async fn deliver(&self, request: &EventRequest) -> Result<DeliveryReceipt, SinkError>;

    /// Credential-free description of the target for logs.
    fn target(&self) -> &str;
}

// ============================================================================
// SECTION: Implementations
// ============================================================================

pub mod channel;
pub mod http;

pub use channel::ChannelSink;
pub use http::HttpSink;
