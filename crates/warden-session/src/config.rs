//! Session configuration.
//!
//! The manager only consumes these values; loading them is a convenience
//! for servers that keep settings in a JSON file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Cookie name used when none is configured.
pub const DEFAULT_COOKIE_NAME: &str = "warden";

/// Identifier body length used when none (or zero) is configured.
pub const DEFAULT_ID_BODY_LENGTH: usize = 16;

/// Default inactivity TTL: 30 minutes.
pub const DEFAULT_TTL_SECS: u64 = 30 * 60;

/// Configuration for session identifiers, expiry, host binding and the
/// session cookie.
///
/// Every field has a default, so a JSON file only needs the keys it wants
/// to override:
///
/// ```rust
/// use warden_session::SessionConfig;
///
/// let config: SessionConfig =
///     serde_json::from_str(r#"{ "ttl_secs": 60, "host_binding": false }"#)
///         .unwrap();
/// assert_eq!(config.id_body_length, 16);
/// assert!(!config.host_binding);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Prepended to every identifier as `"{prefix}-"`. Empty for none.
    pub id_prefix: String,

    /// Number of random characters in an identifier.
    pub id_body_length: usize,

    /// Inactivity timeout in seconds. 0 disables expiration.
    pub ttl_secs: u64,

    /// Bind sessions to the remote host they logged in from.
    pub host_binding: bool,

    /// Name of the session cookie. If empty, [`validated`](Self::validated)
    /// derives it: `"warden"`, or `"warden__{prefix}"` with an `id_prefix`.
    pub cookie_name: String,

    /// `Path` attribute of the session cookie.
    pub cookie_path: String,

    /// `Domain` attribute of the session cookie. Empty for a host-only
    /// cookie.
    pub cookie_domain: String,

    /// Mark the cookie `Secure` (HTTPS only).
    pub cookie_secure: bool,

    /// Mark the cookie `HttpOnly` (hidden from scripts).
    pub cookie_http_only: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id_prefix: String::new(),
            id_body_length: DEFAULT_ID_BODY_LENGTH,
            ttl_secs: DEFAULT_TTL_SECS,
            host_binding: true,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_path: "/".to_string(),
            cookie_domain: String::new(),
            cookie_secure: false,
            cookie_http_only: false,
        }
    }
}

impl SessionConfig {
    /// Reads a JSON config file. Missing keys keep their defaults; the
    /// result is passed through [`validated`](Self::validated).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config.validated())
    }

    /// Fills fields that were explicitly emptied so the config is safe to
    /// use. Called automatically by the manager. Rules:
    /// - `id_body_length` 0 becomes [`DEFAULT_ID_BODY_LENGTH`].
    /// - An empty `cookie_name` becomes `"warden"`, or
    ///   `"warden__{prefix}"` when a prefix is set.
    /// - An empty `cookie_path` becomes `"/"`.
    pub fn validated(mut self) -> Self {
        if self.id_body_length == 0 {
            self.id_body_length = DEFAULT_ID_BODY_LENGTH;
        }
        if self.cookie_name.is_empty() {
            self.cookie_name = if self.id_prefix.is_empty() {
                DEFAULT_COOKIE_NAME.to_string()
            } else {
                format!("{DEFAULT_COOKIE_NAME}__{}", self.id_prefix)
            };
        }
        if self.cookie_path.is_empty() {
            self.cookie_path = "/".to_string();
        }
        self
    }

    /// The inactivity TTL. `Duration::ZERO` means sessions never expire.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Builds a full identifier from a random body.
    pub(crate) fn compose_id(&self, body: &str) -> String {
        if self.id_prefix.is_empty() {
            body.to_string()
        } else {
            format!("{}-{body}", self.id_prefix)
        }
    }
}
