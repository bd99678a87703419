// crates/event-bridge-broker/src/source/channel.rs
// ============================================================================
// Module: Event Bridge Channel Source
// Description: In-memory source fed by a Tokio mpsc channel.
// Purpose: Embed the bridge in-process and drive the loop in tests.
// Dependencies: event-bridge-core, tokio
// ============================================================================

//! ## Overview
//! [`ChannelSource`] yields messages sent through a `tokio::sync::mpsc`
//! channel. Dropping every sender ends the stream gracefully. Settlements are
//! recorded in a shared [`SettlementLog`].
//! Invariants:
//! - Credit is enforced exactly as for broker sources.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use async_trait::async_trait;
use event_bridge_core::Message;
use tokio::sync::mpsc;

use crate::credit::CreditWindow;
use crate::source::Received;
use crate::source::Source;
use crate::source::SourceError;

// ============================================================================
// SECTION: Settlements
// ============================================================================

/// Sequence number assigned to each yielded message, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeliveryTag(pub u64);

/// Recorded outcome for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Message was accepted.
    Accepted(DeliveryTag),
    /// Message was rejected.
    Rejected(DeliveryTag),
}

/// Shared, append-only record of settlements.
#[derive(Debug, Clone, Default)]
pub struct SettlementLog {
    /// Outcomes in settlement order.
    entries: Arc<Mutex<Vec<Settlement>>>,
}

impl SettlementLog {
    /// Returns a copy of every settlement so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Settlement> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Appends a settlement.
    fn record(&self, settlement: Settlement) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).push(settlement);
    }
}

// ============================================================================
// SECTION: Channel Source
// ============================================================================

/// Source backed by an in-memory channel.
#[derive(Debug)]
pub struct ChannelSource {
    /// Incoming messages.
    receiver: mpsc::Receiver<Message>,
    /// Unsettled message window.
    credit: CreditWindow,
    /// Last tag handed out.
    last_tag: u64,
    /// Settlement record.
    log: SettlementLog,
    /// Description used as the endpoint.
    endpoint: String,
    /// Whether `close` was called.
    closed: bool,
}

impl ChannelSource {
    /// Wraps an existing receiver.
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<Message>, credit: u32) -> Self {
        Self {
            receiver,
            credit: CreditWindow::new(credit),
            last_tag: 0,
            log: SettlementLog::default(),
            endpoint: "channel://local".to_string(),
            closed: false,
        }
    }

    /// Creates a channel of `capacity` and a source reading from it.
    #[must_use]
    pub fn pair(capacity: usize, credit: u32) -> (mpsc::Sender<Message>, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (sender, Self::new(receiver, credit))
    }

    /// Returns a handle onto the settlement record.
    #[must_use]
    pub fn settlements(&self) -> SettlementLog {
        self.log.clone()
    }

    /// Returns the current credit window.
    #[must_use]
    pub const fn credit(&self) -> CreditWindow {
        self.credit
    }
}

#[async_trait]
impl Source for ChannelSource {
    type Handle = DeliveryTag;

    async fn receive(&mut self) -> Result<Option<Received<DeliveryTag>>, SourceError> {
        if self.closed {
            return Err(SourceError::Closed);
        }
        if self.credit.is_exhausted() {
            return Err(SourceError::CreditExhausted {
                outstanding: self.credit.outstanding(),
                max: self.credit.max(),
            });
        }
        let Some(message) = self.receiver.recv().await else {
            return Ok(None);
        };
        self.credit.issue()?;
        self.last_tag += 1;
        Ok(Some(Received {
            message,
            handle: DeliveryTag(self.last_tag),
        }))
    }

    async fn accept(&mut self, handle: DeliveryTag) -> Result<(), SourceError> {
        self.credit.settle()?;
        self.log.record(Settlement::Accepted(handle));
        Ok(())
    }

    async fn reject(&mut self, handle: DeliveryTag) -> Result<(), SourceError> {
        self.credit.settle()?;
        self.log.record(Settlement::Rejected(handle));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        self.receiver.close();
        self.closed = true;
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
