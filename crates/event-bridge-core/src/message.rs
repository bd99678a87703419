// crates/event-bridge-core/src/message.rs
// ============================================================================
// Module: Event Bridge Message Model
// Description: Wire-agnostic representation of a received broker message.
// Purpose: Decouple protocol decoding from CloudEvents translation.
// Dependencies: time
// ============================================================================

//! ## Overview
//! A [`Message`] is what every source hands to the forwarding loop. Protocol
//! adapters classify the message id and body exactly once, into the closed
//! [`MessageId`] and [`Body`] variants, so the translator never inspects
//! runtime types.
//! Invariants:
//! - [`Body::Unsupported`] messages are never forwarded.
//! - Header keys are unique; later inserts replace earlier values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use time::OffsetDateTime;

// ============================================================================
// SECTION: Message Identifiers
// ============================================================================

/// Broker-assigned message identifier.
///
/// # Invariants
/// - Variants mirror the identifier encodings brokers actually emit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MessageId {
    /// No identifier was set on the message.
    #[default]
    None,
    /// UTF-8 string identifier.
    String(String),
    /// Unsigned numeric identifier.
    Ulong(u64),
    /// 16-byte UUID identifier.
    Uuid([u8; 16]),
    /// Opaque binary identifier.
    Binary(Vec<u8>),
    /// Identifier of an encoding the bridge does not render.
    Other(String),
}

// ============================================================================
// SECTION: Message Body
// ============================================================================

/// Message payload classified at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Textual payload.
    Text(String),
    /// Opaque binary payload.
    Binary(Vec<u8>),
    /// Payload encoding that cannot be forwarded; holds the encoding name.
    Unsupported(String),
}

impl Body {
    /// Returns the payload as text when it is textual.
    ///
    /// Binary payloads qualify when their bytes are valid UTF-8.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(bytes) => std::str::from_utf8(bytes).ok(),
            Self::Unsupported(_) => None,
        }
    }

    /// Returns the raw payload bytes, or `None` for unsupported payloads.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Text(text) => Some(text.as_bytes()),
            Self::Binary(bytes) => Some(bytes),
            Self::Unsupported(_) => None,
        }
    }

    /// Returns a stable label for the payload kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

// ============================================================================
// SECTION: Message
// ============================================================================

/// Received broker message.
///
/// # Invariants
/// - Owned by the forwarding loop until it is accepted or rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Broker-assigned identifier.
    pub id: MessageId,
    /// Creation time reported by the producer.
    pub creation_time: Option<OffsetDateTime>,
    /// Declared content type.
    pub content_type: Option<String>,
    /// Subject or topic the message was published under.
    pub subject: Option<String>,
    /// Application headers rendered as strings.
    pub headers: BTreeMap<String, String>,
    /// Message payload.
    pub body: Body,
}

impl Message {
    /// Creates a message with the given body and no metadata.
    #[must_use]
    pub const fn new(body: Body) -> Self {
        Self {
            id: MessageId::None,
            creation_time: None,
            content_type: None,
            subject: None,
            headers: BTreeMap::new(),
            body,
        }
    }

    /// Creates a message with a textual body.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(Body::Text(body.into()))
    }

    /// Creates a message with a binary body.
    #[must_use]
    pub fn binary(body: impl Into<Vec<u8>>) -> Self {
        Self::new(Body::Binary(body.into()))
    }

    /// Sets the message identifier.
    #[must_use]
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    /// Sets the declared content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the creation time.
    #[must_use]
    pub const fn with_creation_time(mut self, creation_time: OffsetDateTime) -> Self {
        self.creation_time = Some(creation_time);
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Adds an application header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}
