// crates/event-bridge-broker/src/sink/http.rs
// ============================================================================
// Module: Event Bridge HTTP Sink
// Description: POST each CloudEvent to an HTTP endpoint.
// Purpose: Deliver binary and structured events over HTTP(S).
// Dependencies: reqwest, url, tracing
// ============================================================================

//! ## Overview
//! [`HttpSink`] issues one POST per event using a default `reqwest` client:
//! no retries, no custom pooling, no request timeout. Any 2xx status is a
//! success; everything else is a [`SinkError`].
//! Invariants:
//! - Event headers are sent exactly as produced by the translator.
//! - At most [`MAX_LOGGED_BODY_BYTES`] of a response body are kept.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use event_bridge_core::EventRequest;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use crate::sink::DeliveryReceipt;
use crate::sink::Sink;
use crate::sink::SinkError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Response body bytes kept for logs and errors.
pub const MAX_LOGGED_BODY_BYTES: usize = 512;

// ============================================================================
// SECTION: HTTP Sink
// ============================================================================

/// HTTP(S) CloudEvents sink.
#[derive(Debug, Clone)]
pub struct HttpSink {
    /// HTTP client.
    client: Client,
    /// Target URL.
    url: Url,
    /// URL rendered without userinfo.
    target: String,
}

impl HttpSink {
    /// Creates a sink posting to `uri` with a default client.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the URI is not absolute http(s) or the
    /// client cannot be built.
    pub fn new(uri: &str) -> Result<Self, SinkError> {
        let client = Client::builder().build().map_err(|err| SinkError::Client(err.to_string()))?;
        Self::with_client(uri, client)
    }

    /// Creates a sink posting to `uri` with a caller-provided client.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::InvalidUri`] when the URI is not absolute http(s).
    pub fn with_client(uri: &str, client: Client) -> Result<Self, SinkError> {
        let url = Url::parse(uri).map_err(|err| SinkError::InvalidUri(err.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SinkError::InvalidUri(format!("unsupported scheme '{}'", url.scheme())));
        }
        let mut redacted = url.clone();
        let _ = redacted.set_username("");
        let _ = redacted.set_password(None);
        Ok(Self {
            client,
            url,
            target: redacted.to_string(),
        })
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn deliver(&self, request: &EventRequest) -> Result<DeliveryReceipt, SinkError> {
        let mut builder = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, request.content_type.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder
            .body(request.body.clone())
            .send()
            .await
            .map_err(|err| SinkError::Request(err.without_url().to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| SinkError::Request(err.without_url().to_string()))?;
        let prefix = bytes.get(..MAX_LOGGED_BODY_BYTES).unwrap_or(&bytes[..]);
        let body = String::from_utf8_lossy(prefix).into_owned();
        debug!(
            sink = %self.target,
            event_id = request.id(),
            mode = request.mode.as_str(),
            status = status.as_u16(),
            body = %body,
            "sink responded"
        );
        if !status.is_success() {
            return Err(SinkError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(DeliveryReceipt {
            event_id: request.id().to_string(),
            status: Some(status.as_u16()),
        })
    }

    fn target(&self) -> &str {
        &self.target
    }
}
