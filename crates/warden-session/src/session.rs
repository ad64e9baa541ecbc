//! Session types: identifiers, the identity bound to one, the outcome of
//! resolving a presented identifier, and outbound cookie instructions.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// An opaque session identifier, as carried in the session cookie.
///
/// Serialized as the bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an identifier string as-is. No format is enforced; unknown
    /// identifiers simply resolve to nothing.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as sent in the cookie value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The identity bound to a live session.
///
/// Set once at login and never changed. Returned by value from the store,
/// so holding one does not keep the session alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The identifier the client presents in its cookie.
    pub id: SessionId,

    /// Application-level identity, opaque to Warden.
    pub username: String,

    /// Remote host recorded at login. Always `Some` (and non-empty) when
    /// host binding is enabled, `None` otherwise.
    pub host: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Why a presented identifier was not accepted.
///
/// Callers handle every reason the same way (treat the request as
/// anonymous and delete the client cookie). The reason exists for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No live session under this identifier (never issued, logged out or
    /// expired).
    Unknown,
    /// The session exists but was bound to a different remote host.
    HostMismatch,
}

/// Outcome of resolving a presented session identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The identifier names a live session valid for this request.
    Active(Session),
    /// Not a session for this request. The client cookie should be deleted.
    Rejected(RejectReason),
}

impl Resolution {
    /// The resolved session, if any.
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Active(session) => Some(session),
            Self::Rejected(_) => None,
        }
    }

    /// Consumes the resolution, yielding the session if it is active.
    pub fn into_session(self) -> Option<Session> {
        match self {
            Self::Active(session) => Some(session),
            Self::Rejected(_) => None,
        }
    }

    /// Returns `true` when the caller should instruct the client to delete
    /// its session cookie.
    pub fn clears_cookie(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

// ---------------------------------------------------------------------------
// SessionCookie
// ---------------------------------------------------------------------------

/// An instruction for the response layer to set (or delete) the session
/// cookie. Serializing it into a `Set-Cookie` header is the response
/// layer's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    /// Cookie name, from [`SessionConfig::cookie_name`](crate::SessionConfig::cookie_name).
    pub name: String,
    /// The session identifier, or empty for a removal cookie.
    pub value: String,
    /// `Path` attribute.
    pub path: String,
    /// Empty for a host-only cookie.
    pub domain: String,
    /// Send the `Secure` attribute.
    pub secure: bool,
    /// Send the `HttpOnly` attribute.
    pub http_only: bool,
    /// How long the client should keep the cookie.
    pub lifetime: CookieLifetime,
}

/// How long the client should keep the cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieLifetime {
    /// No `Max-Age`/`Expires`: the browser drops it with the browsing
    /// session. Used when session expiry is disabled.
    BrowserSession,
    /// Keep for this long, rounded to whole seconds.
    MaxAge(Duration),
    /// Delete immediately (`Max-Age=0`, `Expires` at the Unix epoch).
    Expired,
}

impl SessionCookie {
    /// Returns `true` if this cookie deletes the client's session cookie.
    pub fn is_removal(&self) -> bool {
        matches!(self.lifetime, CookieLifetime::Expired)
    }
}
