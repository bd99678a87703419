// crates/event-bridge-config/src/lib.rs
// ============================================================================
// Module: Event Bridge Config Library
// Description: Bridge configuration model, credential overlay, and validation.
// Purpose: Single source of truth for event-bridge.toml semantics.
// Dependencies: event-bridge-core, rustls-pki-types, serde, toml
// ============================================================================

//! ## Overview
//! `event-bridge-config` defines the configuration model for the bridge and
//! resolves the broker URI plus an optional credentials directory into an
//! immutable [`ConnectionConfig`]. Validation is strict and fail-closed: a
//! configuration that would fail later is rejected before any connection is
//! attempted.
//!
//! Security posture: configuration and credential files are untrusted input;
//! passwords are never rendered by `Debug` or `Display`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod connection;
pub mod credentials;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use connection::ConnectionConfig;
pub use connection::Protocol;
pub use connection::decode_root_ca;
pub use credentials::ConnectOverlay;
pub use credentials::CredentialsDir;
