// crates/event-bridge-core/tests/translator.rs
// ============================================================================
// Module: Translator Tests
// Description: Binary and structured CloudEvents translation checks.
// Purpose: Pin attribute mapping, defaults, and rejection behavior.
// Dependencies: event-bridge-core, time
// ============================================================================

//! ## Overview
//! Exercises [`Translator`] mode selection, attribute headers, content type
//! defaults, and message id rendering.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use event_bridge_core::Body;
use event_bridge_core::CLOUDEVENTS_JSON;
use event_bridge_core::EventMode;
use event_bridge_core::Message;
use event_bridge_core::MessageId;
use event_bridge_core::TranslateError;
use event_bridge_core::Translator;
use event_bridge_core::event_id;
use event_bridge_core::is_cloudevents_json;
use event_bridge_core::looks_like_structured_event;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn translator() -> Translator {
    Translator::new("amqp.message.delivery", "amqp://broker:5672/orders")
}

// ============================================================================
// SECTION: Mode Selection
// ============================================================================

#[test]
fn plain_text_message_is_sent_in_binary_mode() {
    let message = Message::text("binary").with_content_type("text/plain");
    let request = translator().translate(&message).expect("translate");

    assert_eq!(request.mode, EventMode::Binary);
    assert_eq!(request.body, b"binary");
    assert_eq!(request.content_type, "text/plain");
    assert_eq!(request.header("ce-type"), Some("amqp.message.delivery"));
    assert_eq!(request.header("ce-specversion"), Some("1.0"));
    assert_eq!(request.header("ce-source"), Some("amqp://broker:5672/orders"));
}

#[test]
fn cloudevents_json_text_is_forwarded_verbatim() {
    let document = r#"{"specversion":"0.2","contenttype":"text/plain","data":"x"}"#;
    let message = Message::text(document).with_content_type(CLOUDEVENTS_JSON);
    let request = translator().translate(&message).expect("translate");

    assert_eq!(request.mode, EventMode::Structured);
    assert_eq!(request.body, document.as_bytes());
    assert_eq!(request.content_type, CLOUDEVENTS_JSON);
    assert!(request.headers.is_empty());
}

#[test]
fn cloudevents_json_with_parameters_keeps_declared_content_type() {
    let document = r#"{"specversion":"1.0","id":"1"}"#;
    let content_type = "Application/CloudEvents+JSON; charset=utf-8";
    let message = Message::binary(document.as_bytes().to_vec()).with_content_type(content_type);
    let request = translator().translate(&message).expect("translate");

    assert_eq!(request.mode, EventMode::Structured);
    assert_eq!(request.content_type, content_type);
    assert_eq!(request.body, document.as_bytes());
}

#[test]
fn non_utf8_body_with_cloudevents_type_falls_back_to_binary() {
    let message = Message::binary(vec![0xff, 0xfe, 0x00]).with_content_type(CLOUDEVENTS_JSON);
    let request = translator().translate(&message).expect("translate");

    assert_eq!(request.mode, EventMode::Binary);
    assert_eq!(request.body, vec![0xff, 0xfe, 0x00]);
}

#[test]
fn unsupported_body_is_rejected() {
    let message = Message::new(Body::Unsupported("amqp-sequence".to_string()));
    let err = translator().translate(&message).unwrap_err();
    assert_eq!(err, TranslateError::UnsupportedFormat("amqp-sequence".to_string()));
}

// ============================================================================
// SECTION: Content Type Defaults
// ============================================================================

#[test]
fn text_body_defaults_to_utf8_plain_text() {
    let request = translator().translate(&Message::text("hello")).expect("translate");
    assert_eq!(request.content_type, "text/plain; charset=utf-8");
}

#[test]
fn binary_body_defaults_to_octet_stream() {
    let request = translator().translate(&Message::binary(vec![1, 2, 3])).expect("translate");
    assert_eq!(request.content_type, "application/octet-stream");
    assert_eq!(request.body, vec![1, 2, 3]);
}

// ============================================================================
// SECTION: Attributes
// ============================================================================

#[test]
fn creation_time_renders_as_rfc3339() {
    let created = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("timestamp");
    let message = Message::text("t").with_creation_time(created);
    let request = translator().translate(&message).expect("translate");
    assert_eq!(request.header("ce-time"), Some("2023-11-14T22:13:20Z"));
}

#[test]
fn missing_creation_time_omits_time_header() {
    let request = translator().translate(&Message::text("t")).expect("translate");
    assert_eq!(request.header("ce-time"), None);
}

#[test]
fn subject_maps_to_subject_attribute() {
    let message = Message::text("t").with_subject("sensors/kitchen");
    let request = translator().translate(&message).expect("translate");
    assert_eq!(request.header("ce-subject"), Some("sensors/kitchen"));
}

#[test]
fn prefixed_properties_override_generated_attributes() {
    let message = Message::text("binary")
        .with_header("cloudEvents:specversion", "0.2")
        .with_header("cloudEvents_extension1", "value")
        .with_header("not-for-cloudevents", "binary");
    let request = translator().translate(&message).expect("translate");

    assert_eq!(request.header("ce-specversion"), Some("0.2"));
    assert_eq!(request.header("ce-extension1"), Some("value"));
    assert!(request.headers.keys().all(|name| name.starts_with("ce-")));
    assert!(!request.headers.values().any(|value| value == "binary"));
}

#[test]
fn header_values_with_control_characters_are_rejected() {
    let message = Message::text("t").with_header("cloudEvents:subject", "line\nbreak");
    let err = translator().translate(&message).unwrap_err();
    assert_eq!(err, TranslateError::InvalidAttribute("ce-subject".to_string()));
}

// ============================================================================
// SECTION: Event Identifiers
// ============================================================================

#[test]
fn event_id_renders_each_identifier_kind() {
    assert_eq!(event_id(&MessageId::String("abc".to_string())), "abc");
    assert_eq!(event_id(&MessageId::Ulong(42)), "42");
    let uuid = [
        0xc4, 0xb0, 0x4c, 0x04, 0x8a, 0x8e, 0x4a, 0x7d, 0x94, 0x8a, 0x5e, 0x58, 0x43, 0x43, 0x3b,
        0x4d,
    ];
    assert_eq!(event_id(&MessageId::Uuid(uuid)), "c4b04c04-8a8e-4a7d-948a-5e5843433b4d");
    assert_eq!(event_id(&MessageId::Binary(b"hello".to_vec())), "aGVsbG8=");
    assert_eq!(event_id(&MessageId::None), "");
    assert_eq!(event_id(&MessageId::Other("symbol".to_string())), "");
}

#[test]
fn binary_request_carries_rendered_event_id() {
    let message = Message::text("t").with_id(MessageId::Ulong(7));
    let request = translator().translate(&message).expect("translate");
    assert_eq!(request.id(), "7");
}

// ============================================================================
// SECTION: Classification Helpers
// ============================================================================

#[test]
fn cloudevents_json_media_type_matching() {
    assert!(is_cloudevents_json("application/cloudevents+json"));
    assert!(is_cloudevents_json(" application/cloudevents+json ; charset=utf-8"));
    assert!(!is_cloudevents_json("application/json"));
    assert!(!is_cloudevents_json("application/cloudevents-batch+json"));
}

#[test]
fn structured_event_sniffing_requires_specversion_object() {
    assert!(looks_like_structured_event(br#" {"specversion":"1.0","id":"1"}"#));
    assert!(!looks_like_structured_event(br#"{"id":"1"}"#));
    assert!(!looks_like_structured_event(br#"["specversion"]"#));
    assert!(!looks_like_structured_event(b"specversion"));
}
