// crates/event-bridge-config/src/connection.rs
// ============================================================================
// Module: Connection Configuration
// Description: Merge a broker URI with the credentials directory overlay.
// Purpose: Produce one immutable, validated connection description.
// Dependencies: event-bridge-core, rustls-pki-types, url
// ============================================================================

//! ## Overview
//! [`ConnectionConfig::resolve`] combines the configured broker URI with the
//! optional `connect-config` overlay and `tls.ca` bundle. Fields present in
//! the URI win over overlay fields, one field at a time. The URI may be a
//! full `scheme://` URI, a scheme-less `//host:port/path`, or a bare address
//! when the overlay supplies the rest.
//! Invariants:
//! - The resolved endpoint always has a scheme, a host, and a port.
//! - A present but undecodable CA bundle is rejected here, never at dial time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::Path;

use event_bridge_core::Credentials;
use event_bridge_core::Endpoint;
use rustls_pki_types::CertificateDer;
use rustls_pki_types::pem::PemObject;
use url::Host;
use url::Url;

use crate::config::ConfigError;
use crate::credentials::ConnectOverlay;
use crate::credentials::CredentialsDir;
use crate::credentials::TLS_CA_FILE;

// ============================================================================
// SECTION: Protocol
// ============================================================================

/// Broker protocol selected by the URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// AMQP 1.0.
    Amqp,
    /// MQTT 3.1.1.
    Mqtt,
}

impl Protocol {
    /// Maps a URI scheme to a protocol.
    #[must_use]
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "amqp" | "amqps" => Some(Self::Amqp),
            "mqtt" | "mqtts" | "tcp" | "ssl" | "tls" => Some(Self::Mqtt),
            _ => None,
        }
    }

    /// Returns true when the scheme requires TLS.
    #[must_use]
    pub fn scheme_uses_tls(scheme: &str) -> bool {
        matches!(scheme.to_ascii_lowercase().as_str(), "amqps" | "mqtts" | "ssl" | "tls")
    }

    /// Returns the IANA default port.
    #[must_use]
    pub const fn default_port(self, tls: bool) -> u16 {
        match (self, tls) {
            (Self::Amqp, false) => 5672,
            (Self::Amqp, true) => 5671,
            (Self::Mqtt, false) => 1883,
            (Self::Mqtt, true) => 8883,
        }
    }

    /// Returns the CloudEvents `type` attribute for deliveries.
    #[must_use]
    pub const fn event_type(self) -> &'static str {
        match self {
            Self::Amqp => "amqp.message.delivery",
            Self::Mqtt => "mqtt.message.delivery",
        }
    }

    /// Returns the lowercase protocol name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Amqp => "amqp",
            Self::Mqtt => "mqtt",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Connection Config
// ============================================================================

/// Fully resolved broker connection settings.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Broker endpoint with default port applied.
    pub endpoint: Endpoint,
    /// Protocol implied by the scheme.
    pub protocol: Protocol,
    /// Whether the transport is TLS.
    pub tls: bool,
    /// Custom trust anchors from `tls.ca`; `None` means platform roots.
    pub root_ca: Option<Vec<CertificateDer<'static>>>,
    /// Skip certificate verification. Testing only.
    pub insecure_skip_verify: bool,
}

impl ConnectionConfig {
    /// Resolves the broker URI against an optional credentials directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the merged result lacks a scheme or host,
    /// names an unsupported scheme, or when a credentials file is malformed.
    pub fn resolve(
        uri: &str,
        credentials_dir: Option<&Path>,
        insecure_skip_verify: bool,
    ) -> Result<Self, ConfigError> {
        let dir = match credentials_dir {
            Some(path) => CredentialsDir::load(path)?,
            None => CredentialsDir::default(),
        };
        let root_ca = dir.root_ca_pem.as_deref().map(decode_root_ca).transpose()?;
        let mut config = Self::merge(uri, dir.overlay.as_ref())?;
        config.root_ca = root_ca;
        config.insecure_skip_verify = insecure_skip_verify;
        Ok(config)
    }

    /// Merges a URI with an overlay, URI fields taking precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the merged result is incomplete.
    pub fn merge(uri: &str, overlay: Option<&ConnectOverlay>) -> Result<Self, ConfigError> {
        let parts = UriParts::parse(uri)?;
        let fallback = ConnectOverlay::default();
        let overlay = overlay.unwrap_or(&fallback);

        let scheme = parts
            .scheme
            .or_else(|| overlay.scheme.clone())
            .map(|scheme| scheme.to_ascii_lowercase())
            .ok_or_else(|| ConfigError::Invalid(format!("broker uri has no scheme: {uri}")))?;
        let protocol = Protocol::from_scheme(&scheme).ok_or_else(|| {
            ConfigError::Invalid(format!("unsupported broker scheme '{scheme}'"))
        })?;
        let host = parts
            .host
            .or_else(|| overlay.host.clone())
            .ok_or_else(|| ConfigError::Invalid("broker uri has no host".to_string()))?;
        let tls = Protocol::scheme_uses_tls(&scheme);
        let credentials = parts.credentials.or_else(|| {
            overlay.user.as_ref().map(|user| Credentials {
                username: user.clone(),
                password: overlay.password.clone().unwrap_or_default(),
            })
        });
        let endpoint = Endpoint {
            scheme,
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port: parts.port.or(overlay.port),
            path: parts.path,
            credentials,
        }
        .with_default_port(protocol.default_port(tls));
        Ok(Self {
            endpoint,
            protocol,
            tls,
            root_ca: None,
            insecure_skip_verify: false,
        })
    }

    /// Returns the canonical, credential-free broker address.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.endpoint.canonical()
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("protocol", &self.protocol)
            .field("tls", &self.tls)
            .field("root_ca_count", &self.root_ca.as_ref().map(Vec::len))
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .finish()
    }
}

// ============================================================================
// SECTION: URI Parsing
// ============================================================================

/// Fields recovered from a possibly partial broker URI.
#[derive(Default)]
struct UriParts {
    /// Scheme, when written.
    scheme: Option<String>,
    /// Host, when written.
    host: Option<String>,
    /// Port, when written.
    port: Option<u16>,
    /// Userinfo, when written.
    credentials: Option<Credentials>,
    /// Path with leading slash, or empty.
    path: String,
}

impl UriParts {
    /// Parses any of the accepted URI shapes.
    fn parse(uri: &str) -> Result<Self, ConfigError> {
        let uri = uri.trim();
        if uri.contains("://") {
            let url = Url::parse(uri)
                .map_err(|err| ConfigError::Invalid(format!("invalid broker uri: {err}")))?;
            let mut parts = Self::from_url(&url)?;
            parts.scheme = Some(url.scheme().to_string());
            return Ok(parts);
        }
        if uri.starts_with("//") {
            let url = Url::parse(&format!("placeholder:{uri}"))
                .map_err(|err| ConfigError::Invalid(format!("invalid broker uri: {err}")))?;
            return Self::from_url(&url);
        }
        let path = match uri {
            "" | "/" => String::new(),
            other if other.starts_with('/') => other.to_string(),
            other => format!("/{other}"),
        };
        Ok(Self {
            path,
            ..Self::default()
        })
    }

    /// Extracts host, port, userinfo, and path from a parsed URL.
    fn from_url(url: &Url) -> Result<Self, ConfigError> {
        let host = match url.host() {
            Some(Host::Domain("")) | None => None,
            Some(_) => {
                let endpoint = Endpoint::from_url(url)
                    .map_err(|err| ConfigError::Invalid(err.to_string()))?;
                Some(endpoint)
            }
        };
        let path = match url.path() {
            "/" => String::new(),
            other => other.to_string(),
        };
        match host {
            Some(endpoint) => Ok(Self {
                scheme: None,
                host: Some(endpoint.host),
                port: endpoint.port,
                credentials: endpoint.credentials,
                path,
            }),
            None => Ok(Self {
                path,
                ..Self::default()
            }),
        }
    }
}

// ============================================================================
// SECTION: Root CA
// ============================================================================

/// Decodes a PEM bundle into DER certificates.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the bundle is malformed or holds no
/// certificates.
pub fn decode_root_ca(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ConfigError::Invalid(format!("{TLS_CA_FILE}: {err}")))?;
    if certs.is_empty() {
        return Err(ConfigError::Invalid(format!("{TLS_CA_FILE}: no certificates found")));
    }
    Ok(certs)
}
