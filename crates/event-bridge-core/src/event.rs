// crates/event-bridge-core/src/event.rs
// ============================================================================
// Module: Event Bridge CloudEvents Translator
// Description: Maps broker messages to CloudEvents HTTP requests.
// Purpose: Select binary or structured mode and render event attributes.
// Dependencies: base64, serde_json, thiserror, time, uuid
// ============================================================================

//! ## Overview
//! [`Translator`] classifies each [`Message`] into one of two outbound forms:
//! - structured: textual bodies declared as `application/cloudevents+json` are
//!   forwarded verbatim with the same `Content-Type`;
//! - binary: everything else is forwarded as the raw payload with event
//!   attributes carried in `ce-*` headers.
//!
//! Invariants:
//! - Output depends only on the message and the translator settings.
//! - Header maps are ordered, so repeated translations are byte-identical.
//! - [`Body::Unsupported`] payloads are rejected, never forwarded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::message::Body;
use crate::message::Message;
use crate::message::MessageId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Media type of structured-mode CloudEvents JSON documents.
pub const CLOUDEVENTS_JSON: &str = "application/cloudevents+json";
/// CloudEvents specification version emitted in binary mode.
pub const SPEC_VERSION: &str = "1.0";
/// Content type applied to binary payloads without a declared type.
const DEFAULT_BINARY_CONTENT_TYPE: &str = "application/octet-stream";
/// Content type applied to text payloads without a declared type.
const DEFAULT_TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
/// Prefix for binary-mode attribute headers.
const ATTRIBUTE_HEADER_PREFIX: &str = "ce-";
/// Message header prefixes that carry CloudEvents attributes.
const ATTRIBUTE_PROPERTY_PREFIXES: [&str; 2] = ["cloudEvents:", "cloudEvents_"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while translating messages.
///
/// # Invariants
/// - Every variant means the message must be rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    /// Message body encoding cannot be forwarded.
    #[error("unsupported message format: {0}")]
    UnsupportedFormat(String),
    /// An event attribute cannot be carried in an HTTP header.
    #[error("invalid event attribute: {0}")]
    InvalidAttribute(String),
}

// ============================================================================
// SECTION: Event Request
// ============================================================================

/// CloudEvents content mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventMode {
    /// Attributes in headers, payload as body.
    Binary,
    /// Entire event as one JSON document body.
    Structured,
}

impl EventMode {
    /// Returns a stable label for the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Structured => "structured",
        }
    }
}

/// Translated outbound HTTP request content.
///
/// # Invariants
/// - `headers` holds lowercase `ce-*` names; empty in structured mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRequest {
    /// Content mode used.
    pub mode: EventMode,
    /// Value for the `Content-Type` header.
    pub content_type: String,
    /// CloudEvents attribute headers.
    pub headers: BTreeMap<String, String>,
    /// HTTP request body.
    pub body: Vec<u8>,
}

impl EventRequest {
    /// Returns an attribute header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Returns the event id attribute, or an empty string in structured mode.
    #[must_use]
    pub fn id(&self) -> &str {
        self.header("ce-id").unwrap_or_default()
    }
}

// ============================================================================
// SECTION: Translator
// ============================================================================

/// Message to CloudEvents translator.
///
/// # Invariants
/// - `source` is a canonical endpoint string without credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translator {
    /// Fixed event type naming the originating protocol.
    event_type: String,
    /// Canonical broker endpoint used as the event source.
    source: String,
}

impl Translator {
    /// Creates a translator for the given event type and canonical source.
    #[must_use]
    pub fn new(event_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
        }
    }

    /// Returns the event type attribute.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Returns the event source attribute.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Translates a message into a CloudEvents HTTP request.
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError`] when the body encoding is unsupported or an
    /// attribute cannot be carried in a header.
    pub fn translate(&self, message: &Message) -> Result<EventRequest, TranslateError> {
        if let Body::Unsupported(kind) = &message.body {
            return Err(TranslateError::UnsupportedFormat(kind.clone()));
        }
        if let Some(content_type) = message.content_type.as_deref()
            && is_cloudevents_json(content_type)
            && let Some(document) = message.body.as_text()
        {
            return Ok(EventRequest {
                mode: EventMode::Structured,
                content_type: content_type.to_string(),
                headers: BTreeMap::new(),
                body: document.as_bytes().to_vec(),
            });
        }
        self.binary(message)
    }

    /// Builds a binary-mode request.
    fn binary(&self, message: &Message) -> Result<EventRequest, TranslateError> {
        let (content_type, body) = match &message.body {
            Body::Text(text) => (
                message
                    .content_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TEXT_CONTENT_TYPE.to_string()),
                text.as_bytes().to_vec(),
            ),
            Body::Binary(bytes) => (
                message
                    .content_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BINARY_CONTENT_TYPE.to_string()),
                bytes.clone(),
            ),
            Body::Unsupported(kind) => return Err(TranslateError::UnsupportedFormat(kind.clone())),
        };

        let mut headers = BTreeMap::new();
        headers.insert(attribute_header("specversion"), SPEC_VERSION.to_string());
        headers.insert(attribute_header("id"), event_id(&message.id));
        headers.insert(attribute_header("type"), self.event_type.clone());
        headers.insert(attribute_header("source"), self.source.clone());
        if let Some(time) = message.creation_time.and_then(|time| time.format(&Rfc3339).ok()) {
            headers.insert(attribute_header("time"), time);
        }
        if let Some(subject) = &message.subject {
            headers.insert(attribute_header("subject"), subject.clone());
        }
        for (key, value) in &message.headers {
            let Some(name) = attribute_property_name(key) else {
                continue;
            };
            if name == "datacontenttype" {
                continue;
            }
            headers.insert(attribute_header(&name), value.clone());
        }
        for (name, value) in &headers {
            if !is_header_safe(value) {
                return Err(TranslateError::InvalidAttribute(name.clone()));
            }
        }
        if !is_header_safe(&content_type) {
            return Err(TranslateError::InvalidAttribute("content-type".to_string()));
        }

        Ok(EventRequest {
            mode: EventMode::Binary,
            content_type,
            headers,
            body,
        })
    }
}

// ============================================================================
// SECTION: Attribute Helpers
// ============================================================================

/// Renders the CloudEvents id for a message id.
///
/// String ids pass through, numeric ids render base-10, UUIDs render in
/// canonical hyphenated form, binary ids render as standard base64, and
/// anything else renders as the empty string.
#[must_use]
pub fn event_id(id: &MessageId) -> String {
    match id {
        MessageId::String(value) => value.clone(),
        MessageId::Ulong(value) => value.to_string(),
        MessageId::Uuid(bytes) => Uuid::from_bytes(*bytes).hyphenated().to_string(),
        MessageId::Binary(bytes) => BASE64.encode(bytes),
        MessageId::None | MessageId::Other(_) => String::new(),
    }
}

/// Returns true when the content type names the CloudEvents JSON format.
///
/// Media type parameters are ignored and the comparison is case-insensitive.
#[must_use]
pub fn is_cloudevents_json(content_type: &str) -> bool {
    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    media_type.eq_ignore_ascii_case(CLOUDEVENTS_JSON)
}

/// Returns true when the bytes are a JSON object carrying `specversion`.
#[must_use]
pub fn looks_like_structured_event(bytes: &[u8]) -> bool {
    let trimmed = bytes.trim_ascii_start();
    if !trimmed.starts_with(b"{") {
        return false;
    }
    matches!(
        serde_json::from_slice::<Value>(trimmed),
        Ok(Value::Object(map)) if map.contains_key("specversion")
    )
}

/// Returns the header name for a CloudEvents attribute.
fn attribute_header(name: &str) -> String {
    format!("{ATTRIBUTE_HEADER_PREFIX}{name}")
}

/// Extracts an attribute name from a prefixed message header key.
fn attribute_property_name(key: &str) -> Option<String> {
    let name = ATTRIBUTE_PROPERTY_PREFIXES.iter().find_map(|prefix| key.strip_prefix(prefix))?;
    if name.is_empty() || !name.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return None;
    }
    Some(name.to_ascii_lowercase())
}

/// Returns true when the value is a legal HTTP header value.
fn is_header_safe(value: &str) -> bool {
    value.bytes().all(|byte| byte == b'\t' || (byte >= 0x20 && byte != 0x7f))
}
