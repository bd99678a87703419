// crates/event-bridge-broker/src/sink/channel.rs
// ============================================================================
// Module: Event Bridge Channel Sink
// Description: Channel-based sink for in-process delivery.
// Purpose: Send translated events through a Tokio mpsc channel.
// Dependencies: event-bridge-core, tokio
// ============================================================================

//! ## Overview
//! [`ChannelSink`] delivers events by sending them into a
//! `tokio::sync::mpsc` channel.
//! Invariants:
//! - Successful deliveries enqueue exactly one [`EventRequest`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use event_bridge_core::EventRequest;
use tokio::sync::mpsc::Sender;

use crate::sink::DeliveryReceipt;
use crate::sink::Sink;
use crate::sink::SinkError;

// ============================================================================
// SECTION: Channel Sink
// ============================================================================

/// Channel-based event sink.
#[derive(Debug)]
pub struct ChannelSink {
    /// Sender used to hand off events.
    sender: Sender<EventRequest>,
    /// Target description.
    target: String,
}

impl ChannelSink {
    /// Creates a channel sink.
    #[must_use]
    pub fn new(sender: Sender<EventRequest>) -> Self {
        Self {
            sender,
            target: "channel://local".to_string(),
        }
    }
}

#[async_trait]
impl Sink for ChannelSink {
    async fn deliver(&self, request: &EventRequest) -> Result<DeliveryReceipt, SinkError> {
        self.sender
            .send(request.clone())
            .await
            .map_err(|err| SinkError::Channel(err.to_string()))?;
        Ok(DeliveryReceipt {
            event_id: request.id().to_string(),
            status: None,
        })
    }

    fn target(&self) -> &str {
        &self.target
    }
}
