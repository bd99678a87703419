// crates/event-bridge-core/src/endpoint.rs
// ============================================================================
// Module: Event Bridge Endpoints
// Description: Broker and sink addresses with optional credentials.
// Purpose: Provide canonical, credential-free endpoint rendering.
// Dependencies: percent-encoding, thiserror, url
// ============================================================================

//! ## Overview
//! [`Endpoint`] describes a broker or sink address. [`Endpoint::canonical`]
//! renders the address used as the CloudEvents `source` attribute and in log
//! records; it never includes credentials.
//! Invariants:
//! - `host` is stored without IPv6 brackets.
//! - `Display` and `Debug` never expose the password.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Cow;
use std::fmt;

use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::Host;
use url::Url;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while parsing endpoints.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    /// URI failed to parse.
    #[error("invalid uri: {0}")]
    InvalidUri(String),
    /// URI has no host component.
    #[error("uri has no host: {0}")]
    MissingHost(String),
}

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// User name and password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password; never rendered.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// SECTION: Endpoint
// ============================================================================

/// Broker or sink address.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// URI scheme, lowercase.
    pub scheme: String,
    /// Host name or IP literal without brackets.
    pub host: String,
    /// Explicit or defaulted port.
    pub port: Option<u16>,
    /// Path including the leading slash, or empty.
    pub path: String,
    /// Optional credentials.
    pub credentials: Option<Credentials>,
}

impl Endpoint {
    /// Parses an endpoint from a URI string.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] when the URI is malformed or has no host.
    pub fn parse(uri: &str) -> Result<Self, EndpointError> {
        let url = Url::parse(uri).map_err(|err| EndpointError::InvalidUri(err.to_string()))?;
        Self::from_url(&url)
    }

    /// Builds an endpoint from a parsed URL.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::MissingHost`] when the URL has no host and
    /// [`EndpointError::InvalidUri`] when userinfo is not percent-encoded UTF-8.
    pub fn from_url(url: &Url) -> Result<Self, EndpointError> {
        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(EndpointError::MissingHost(redacted_url(url))),
        };
        let credentials = if url.username().is_empty() && url.password().is_none() {
            None
        } else {
            Some(Credentials {
                username: decode_userinfo(url.username(), "user name")?,
                password: url
                    .password()
                    .map(|raw| decode_userinfo(raw, "password"))
                    .transpose()?
                    .unwrap_or_default(),
            })
        };
        let path = match url.path() {
            "/" => String::new(),
            other => other.to_string(),
        };
        Ok(Self {
            scheme: url.scheme().to_ascii_lowercase(),
            host,
            port: url.port(),
            path,
            credentials,
        })
    }

    /// Returns the endpoint with `port` filled in when no port was given.
    #[must_use]
    pub fn with_default_port(mut self, port: u16) -> Self {
        if self.port.is_none() {
            self.port = Some(port);
        }
        self
    }

    /// Returns the link address or topic encoded in the path, without the leading slash.
    #[must_use]
    pub fn address(&self) -> &str {
        self.path.strip_prefix('/').unwrap_or(&self.path)
    }

    /// Returns `host:port` suitable for socket dialing.
    #[must_use]
    pub fn authority(&self) -> String {
        let host = bracket_host(&self.host);
        match self.port {
            Some(port) => format!("{host}:{port}"),
            None => host,
        }
    }

    /// Renders `scheme://host[:port][/path]` with credentials stripped.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}://{}{}", self.scheme, self.authority(), self.path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("uri", &self.canonical())
            .field("credentials", &self.credentials)
            .finish()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Wraps IPv6 literals in brackets.
fn bracket_host(host: &str) -> String {
    if host.contains(':') { format!("[{host}]") } else { host.to_string() }
}

/// Renders a URL with any password removed.
fn redacted_url(url: &Url) -> String {
    let mut copy = url.clone();
    let _ = copy.set_password(None);
    copy.to_string()
}

/// Decodes a percent-encoded userinfo component; the value itself is never
/// included in the error.
fn decode_userinfo(raw: &str, component: &str) -> Result<String, EndpointError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|_| EndpointError::InvalidUri(format!("{component} is not valid utf-8")))
}
