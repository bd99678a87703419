// crates/event-bridge-core/src/lib.rs
// ============================================================================
// Module: Event Bridge Core Library
// Description: Wire-agnostic message model and CloudEvents translation.
// Purpose: Share message, endpoint, and event types across bridge crates.
// Dependencies: base64, serde_json, thiserror, time, url, uuid
// ============================================================================

//! ## Overview
//! `event-bridge-core` holds the protocol-neutral pieces of the bridge: the
//! [`Message`] model produced by broker sources, the [`Endpoint`] address type
//! used for canonical event sources, and the [`Translator`] that turns a
//! message into a CloudEvents HTTP request.
//! Invariants:
//! - Message ids and bodies are closed variants fixed at construction.
//! - Translation is a pure function of the message; no shared counters.
//!
//! Security posture: endpoints may carry credentials; they are never rendered
//! into event attributes or log output.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod endpoint;
pub mod event;
pub mod message;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use endpoint::Credentials;
pub use endpoint::Endpoint;
pub use endpoint::EndpointError;
pub use event::CLOUDEVENTS_JSON;
pub use event::EventMode;
pub use event::EventRequest;
pub use event::SPEC_VERSION;
pub use event::TranslateError;
pub use event::Translator;
pub use event::event_id;
pub use event::is_cloudevents_json;
pub use event::looks_like_structured_event;
pub use message::Body;
pub use message::Message;
pub use message::MessageId;
