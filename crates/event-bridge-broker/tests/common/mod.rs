// crates/event-bridge-broker/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared helpers for event-bridge-broker tests.
// Purpose: Provide a recording HTTP sink server and message builders.
// Dependencies: event-bridge-core, tiny_http
// ============================================================================

//! ## Overview
//! Provides a blocking `tiny_http` server that records requests and answers
//! with a scripted list of status codes, plus message and translator helpers.

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

use std::collections::BTreeMap;
#[allow(unused_imports, reason = "Only used by helpers that some test binaries never call.")]
use std::io::Read;
use std::thread;
use std::time::Duration;

use event_bridge_core::Message;
use event_bridge_core::MessageId;
use event_bridge_core::Translator;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Recording Server
// ============================================================================

/// How long the server waits for each scripted request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Request observed by the recording server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Headers with lowercase names.
    pub headers: BTreeMap<String, String>,
    /// Raw body.
    pub body: Vec<u8>,
}

impl CapturedRequest {
    /// Returns a header value by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Returns the `ce-*` headers only.
    pub fn event_headers(&self) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .filter(|(name, _)| name.starts_with("ce-"))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// HTTP server answering each request with the next scripted status.
pub struct RecordingServer {
    /// Base URL including the `/events` path.
    pub url: String,
    /// Server thread returning what it saw.
    handle: thread::JoinHandle<Vec<CapturedRequest>>,
}

impl RecordingServer {
    /// Starts a server that answers `statuses.len()` requests, then stops.
    pub fn start(statuses: Vec<u16>) -> Self {
        let server = Server::http("127.0.0.1:0").expect("http server");
        let addr = server.server_addr().to_ip().expect("ip listener");
        let url = format!("http://{addr}/events");
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for status in statuses {
                let Ok(Some(mut request)) = server.recv_timeout(REQUEST_TIMEOUT) else {
                    break;
                };
                let mut body = Vec::new();
                request.as_reader().read_to_end(&mut body).expect("read body");
                let headers = request
                    .headers()
                    .iter()
                    .map(|header| {
                        (header.field.to_string().to_ascii_lowercase(), header.value.to_string())
                    })
                    .collect();
                seen.push(CapturedRequest {
                    method: request.method().to_string(),
                    path: request.url().to_string(),
                    headers,
                    body,
                });
                let text = if (200 .. 300).contains(&status) { "ok" } else { "sink unavailable" };
                let response = Response::from_string(text).with_status_code(status);
                request.respond(response).expect("respond");
            }
            seen
        });
        Self {
            url,
            handle,
        }
    }

    /// Waits for the server thread and returns the captured requests.
    pub fn finish(self) -> Vec<CapturedRequest> {
        self.handle.join().expect("server thread")
    }
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Canonical source used by test translators.
pub const SAMPLE_SOURCE: &str = "amqp://broker.example:5672/orders";

/// Event type used by test translators.
pub const SAMPLE_TYPE: &str = "amqp.message.delivery";

/// Returns a translator for the sample AMQP endpoint.
pub fn sample_translator() -> Translator {
    Translator::new(SAMPLE_TYPE, SAMPLE_SOURCE)
}

/// Returns a text message with a string id and content type.
pub fn text_message(id: &str, body: &str) -> Message {
    Message::text(body).with_id(MessageId::String(id.to_string())).with_content_type("text/plain")
}

/// Returns a structured CloudEvents JSON message.
pub fn structured_message(id: &str) -> Message {
    let document = format!(
        r#"{{"specversion":"1.0","id":"{id}","type":"com.example.order","source":"/orders"}}"#
    );
    Message::text(document).with_content_type("application/cloudevents+json")
}
