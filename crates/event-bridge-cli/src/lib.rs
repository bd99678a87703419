// crates/event-bridge-cli/src/lib.rs
// ============================================================================
// Module: Event Bridge CLI Library
// Description: Configuration overrides, logging setup, and bridge wiring.
// Purpose: Keep the binary entry point thin and the wiring testable.
// Dependencies: event-bridge-broker, event-bridge-config, tracing-subscriber
// ============================================================================

//! ## Overview
//! Support code for the `event-bridge` binary: [`settings`] merges command
//! line overrides into the file configuration, [`logging`] installs the
//! `tracing` subscriber, and [`runner`] resolves the broker connection and
//! runs the matching source through the forwarding loop.
//! Invariants:
//! - Configuration is fully validated before any connection is attempted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod logging;
pub mod runner;
pub mod settings;
