// crates/event-bridge-config/src/credentials.rs
// ============================================================================
// Module: Credentials Directory
// Description: Optional connect-config overlay and root CA bundle.
// Purpose: Read mounted secret files without trusting their shape.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A credentials directory may hold two files:
//! - `connect-config`: JSON with optional `scheme`, `host`, `port`, `user`
//!   and `password` members.
//! - `tls.ca`: a PEM bundle of root certificates.
//!
//! Either file may be absent. A present but unreadable or malformed file is a
//! configuration error.
//! Security posture: the overlay password is redacted from `Debug` output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;

use crate::config::ConfigError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// File name of the JSON connection overlay.
pub const CONNECT_CONFIG_FILE: &str = "connect-config";
/// File name of the PEM root CA bundle.
pub const TLS_CA_FILE: &str = "tls.ca";
/// Upper bound on either credentials file.
const MAX_CREDENTIAL_FILE_SIZE: u64 = 1024 * 1024;

// ============================================================================
// SECTION: Overlay
// ============================================================================

/// Port given either as a JSON number or a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum PortValue {
    /// Numeric form.
    Number(u16),
    /// String form, as written by secret templating tools.
    Text(String),
}

/// Wire form of `connect-config`.
#[derive(Deserialize)]
struct RawOverlay {
    /// URI scheme.
    #[serde(default)]
    scheme: Option<String>,
    /// Host name.
    #[serde(default)]
    host: Option<String>,
    /// Port number.
    #[serde(default)]
    port: Option<PortValue>,
    /// User name.
    #[serde(default)]
    user: Option<String>,
    /// Password.
    #[serde(default)]
    password: Option<String>,
}

/// Connection fields supplied by the credentials directory.
///
/// Empty strings are treated as absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectOverlay {
    /// URI scheme.
    pub scheme: Option<String>,
    /// Host name.
    pub host: Option<String>,
    /// Port number.
    pub port: Option<u16>,
    /// User name.
    pub user: Option<String>,
    /// Password; never rendered.
    pub password: Option<String>,
}

impl ConnectOverlay {
    /// Parses the JSON overlay document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] for an unusable port.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let raw: RawOverlay = serde_json::from_slice(bytes)
            .map_err(|err| ConfigError::Parse(format!("{CONNECT_CONFIG_FILE}: {err}")))?;
        let port = match raw.port {
            None => None,
            Some(PortValue::Number(port)) => Some(port),
            Some(PortValue::Text(text)) if text.trim().is_empty() => None,
            Some(PortValue::Text(text)) => Some(text.trim().parse::<u16>().map_err(|_| {
                ConfigError::Invalid(format!("{CONNECT_CONFIG_FILE}: invalid port '{text}'"))
            })?),
        };
        Ok(Self {
            scheme: non_empty(raw.scheme),
            host: non_empty(raw.host),
            port,
            user: non_empty(raw.user),
            password: non_empty(raw.password),
        })
    }
}

impl fmt::Debug for ConnectOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOverlay")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================================================
// SECTION: Directory
// ============================================================================

/// Contents of a credentials directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialsDir {
    /// Parsed `connect-config`, when present.
    pub overlay: Option<ConnectOverlay>,
    /// Raw `tls.ca` bytes, when present.
    pub root_ca_pem: Option<Vec<u8>>,
}

impl CredentialsDir {
    /// Reads the optional files under `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a present file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_dir() {
            return Err(ConfigError::Io(format!(
                "credentials directory {} does not exist",
                path.display()
            )));
        }
        let overlay = read_optional(&path.join(CONNECT_CONFIG_FILE))?
            .map(|bytes| ConnectOverlay::from_json(&bytes))
            .transpose()?;
        let root_ca_pem = read_optional(&path.join(TLS_CA_FILE))?;
        Ok(Self {
            overlay,
            root_ca_pem,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a file, mapping "not found" to `None`.
fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, ConfigError> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > MAX_CREDENTIAL_FILE_SIZE => {
            return Err(ConfigError::Invalid(format!(
                "{} exceeds size limit",
                path.display()
            )));
        }
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(ConfigError::Io(format!("{}: {err}", path.display()))),
    }
    fs::read(path).map(Some).map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))
}

/// Drops empty or whitespace-only strings.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
