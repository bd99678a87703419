// crates/event-bridge-broker/src/connect.rs
// ============================================================================
// Module: Connection Establisher
// Description: TCP and TLS transport setup for broker connections.
// Purpose: Turn a resolved ConnectionConfig into a byte stream.
// Dependencies: rustls, tokio, tokio-rustls, webpki-roots
// ============================================================================

//! ## Overview
//! [`dial`] opens a TCP connection to the broker and, for TLS schemes, runs
//! the rustls handshake with SNI set to the broker host. [`listen`] and
//! [`accept_one`] cover server mode, where the broker connects to us.
//! Invariants:
//! - Custom trust anchors replace the platform roots, never extend them.
//! - Certificate verification is skipped only when explicitly configured.
//!
//! Security posture: the broker is a remote peer; failures here are fatal and
//! never retried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use event_bridge_config::ConnectionConfig;
use rustls::ClientConfig;
use rustls::DigitallySignedStruct;
use rustls::RootCertStore;
use rustls::SignatureScheme;
use rustls::client::danger::HandshakeSignatureValid;
use rustls::client::danger::ServerCertVerified;
use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::CryptoProvider;
use rustls::crypto::verify_tls12_signature;
use rustls::crypto::verify_tls13_signature;
use rustls::pki_types::CertificateDer;
use rustls::pki_types::ServerName;
use rustls::pki_types::UnixTime;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;
use tracing::warn;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Connection establishment failures. All are fatal.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// TLS client configuration could not be built.
    #[error("tls configuration failed: {0}")]
    TlsConfig(String),
    /// Broker host is not a valid TLS server name.
    #[error("invalid tls server name: {0}")]
    ServerName(String),
    /// TCP connect failed.
    #[error("failed to connect to {address}: {reason}")]
    Dial {
        /// Canonical endpoint.
        address: String,
        /// Underlying failure.
        reason: String,
    },
    /// TLS handshake failed.
    #[error("tls handshake with {address} failed: {reason}")]
    Handshake {
        /// Canonical endpoint.
        address: String,
        /// Underlying failure.
        reason: String,
    },
    /// Listener could not be bound or accept failed.
    #[error("listener error on {address}: {reason}")]
    Listen {
        /// Bind address.
        address: String,
        /// Underlying failure.
        reason: String,
    },
    /// Protocol-level open, session, or link setup failed.
    #[error("{protocol} setup with {address} failed: {reason}")]
    Protocol {
        /// Protocol name.
        protocol: &'static str,
        /// Canonical endpoint.
        address: String,
        /// Underlying failure.
        reason: String,
    },
}

// ============================================================================
// SECTION: Streams
// ============================================================================

/// Byte stream usable by the protocol clients.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug {}

/// Owned, type-erased broker stream.
pub type BoxedStream = Box<dyn AsyncStream>;

// ============================================================================
// SECTION: Transport
// ============================================================================

/// Wire transport selected by the URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Plain TCP.
    Tcp,
    /// TCP wrapped in TLS.
    Tls,
}

impl Transport {
    /// Maps a URI scheme to a transport. Unknown schemes use plain TCP.
    #[must_use]
    pub fn for_scheme(scheme: &str) -> Self {
        match scheme.to_ascii_lowercase().as_str() {
            "amqps" | "mqtts" | "ssl" | "tls" => Self::Tls,
            _ => Self::Tcp,
        }
    }
}

/// Builds the rustls client configuration for a connection.
///
/// # Errors
///
/// Returns [`ConnectError::TlsConfig`] when a trust anchor is rejected.
pub fn tls_client_config(config: &ConnectionConfig) -> Result<Arc<ClientConfig>, ConnectError> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|err| ConnectError::TlsConfig(err.to_string()))?;
    if config.insecure_skip_verify {
        warn!(
            endpoint = %config.canonical(),
            "tls certificate verification is disabled; use for testing only"
        );
        let verifier = Arc::new(SkipServerVerification {
            provider,
        });
        let tls = builder
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();
        return Ok(Arc::new(tls));
    }
    let mut roots = RootCertStore::empty();
    match &config.root_ca {
        Some(certs) => {
            for cert in certs {
                roots
                    .add(cert.clone())
                    .map_err(|err| ConnectError::TlsConfig(format!("tls.ca rejected: {err}")))?;
            }
        }
        None => roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
    }
    Ok(Arc::new(builder.with_root_certificates(roots).with_no_client_auth()))
}

// ============================================================================
// SECTION: Dial / Listen
// ============================================================================

/// Opens the broker stream described by `config`.
///
/// # Errors
///
/// Returns [`ConnectError`] when TCP connect or the TLS handshake fails.
pub async fn dial(config: &ConnectionConfig) -> Result<BoxedStream, ConnectError> {
    let address = config.canonical();
    let tcp = TcpStream::connect(config.endpoint.authority()).await.map_err(|err| {
        ConnectError::Dial {
            address: address.clone(),
            reason: err.to_string(),
        }
    })?;
    if let Err(err) = tcp.set_nodelay(true) {
        debug!(endpoint = %address, error = %err, "failed to set TCP_NODELAY");
    }
    if Transport::for_scheme(&config.endpoint.scheme) == Transport::Tcp {
        debug!(endpoint = %address, "connected over tcp");
        return Ok(Box::new(tcp));
    }
    let tls = tls_client_config(config)?;
    let server_name = ServerName::try_from(config.endpoint.host.clone())
        .map_err(|err| ConnectError::ServerName(format!("{}: {err}", config.endpoint.host)))?;
    let stream = TlsConnector::from(tls).connect(server_name, tcp).await.map_err(|err| {
        ConnectError::Handshake {
            address: address.clone(),
            reason: err.to_string(),
        }
    })?;
    debug!(endpoint = %address, "connected over tls");
    Ok(Box::new(stream))
}

/// Binds a listener on the endpoint's host and port.
///
/// # Errors
///
/// Returns [`ConnectError::Listen`] when binding fails or TLS is requested.
pub async fn listen(config: &ConnectionConfig) -> Result<TcpListener, ConnectError> {
    let address = config.endpoint.authority();
    if Transport::for_scheme(&config.endpoint.scheme) == Transport::Tls {
        return Err(ConnectError::Listen {
            address,
            reason: "tls listeners are not supported".to_string(),
        });
    }
    TcpListener::bind(&address).await.map_err(|err| ConnectError::Listen {
        address: address.clone(),
        reason: err.to_string(),
    })
}

/// Accepts a single inbound connection.
///
/// # Errors
///
/// Returns [`ConnectError::Listen`] when accept fails.
pub async fn accept_one(listener: &TcpListener) -> Result<BoxedStream, ConnectError> {
    let local = listener
        .local_addr()
        .map_or_else(|_| "<unbound>".to_string(), |addr| addr.to_string());
    let (stream, peer) = listener.accept().await.map_err(|err| ConnectError::Listen {
        address: local.clone(),
        reason: err.to_string(),
    })?;
    debug!(listener = %local, peer = %peer, "accepted inbound connection");
    Ok(Box::new(stream))
}

// ============================================================================
// SECTION: Insecure Verifier
// ============================================================================

/// Certificate verifier that accepts any server certificate.
///
/// Handshake signatures are still checked so the session keys are sound.
#[derive(Debug)]
struct SkipServerVerification {
    /// Provider supplying signature algorithms.
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}
