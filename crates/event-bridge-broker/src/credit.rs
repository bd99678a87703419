// crates/event-bridge-broker/src/credit.rs
// ============================================================================
// Module: Credit Window
// Description: Bounded count of unsettled messages.
// Purpose: Enforce the prefetch bound shared by every source.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`CreditWindow`] tracks how many received messages are still awaiting an
//! accept or reject. Sources call [`CreditWindow::issue`] before yielding a
//! message and [`CreditWindow::settle`] when it is acknowledged.
//! Invariants:
//! - `outstanding <= max` at all times.
//! - A window is reset only by constructing a new one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Credit accounting failures.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CreditError {
    /// Every credit is held by an unsettled message.
    #[error("credit exhausted: {outstanding} of {max} messages unsettled")]
    Exhausted {
        /// Unsettled message count.
        outstanding: u32,
        /// Window size.
        max: u32,
    },
    /// A settle arrived with nothing outstanding.
    #[error("settle without an outstanding message")]
    NothingOutstanding,
}

// ============================================================================
// SECTION: Credit Window
// ============================================================================

/// Prefetch window over unsettled messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditWindow {
    /// Configured window size.
    max: u32,
    /// Messages issued and not yet settled.
    outstanding: u32,
}

impl CreditWindow {
    /// Creates an empty window of size `max`.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self {
            max,
            outstanding: 0,
        }
    }

    /// Returns the configured window size.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Returns the number of unsettled messages.
    #[must_use]
    pub const fn outstanding(&self) -> u32 {
        self.outstanding
    }

    /// Returns the credit still available.
    #[must_use]
    pub const fn available(&self) -> u32 {
        self.max.saturating_sub(self.outstanding)
    }

    /// Returns true when no credit is left.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.outstanding >= self.max
    }

    /// Reserves one credit for a message about to be yielded.
    ///
    /// # Errors
    ///
    /// Returns [`CreditError::Exhausted`] when the window is full.
    pub const fn issue(&mut self) -> Result<(), CreditError> {
        if self.is_exhausted() {
            return Err(CreditError::Exhausted {
                outstanding: self.outstanding,
                max: self.max,
            });
        }
        self.outstanding += 1;
        Ok(())
    }

    /// Releases one credit after an accept or reject.
    ///
    /// # Errors
    ///
    /// Returns [`CreditError::NothingOutstanding`] when nothing was issued.
    pub const fn settle(&mut self) -> Result<(), CreditError> {
        if self.outstanding == 0 {
            return Err(CreditError::NothingOutstanding);
        }
        self.outstanding -= 1;
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
