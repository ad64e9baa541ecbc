//! Error types for the session layer.

use warden_token::TokenError;

/// Errors that can occur during session management.
///
/// All of them are local and synchronous. Only [`DuplicateId`] is retried,
/// and the manager does that internally.
///
/// [`DuplicateId`]: SessionError::DuplicateId
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The operation requires an active session and none was found.
    #[error("not logged in")]
    NotLoggedIn,

    /// Login attempted on a request context that already holds a session.
    #[error("already logged in")]
    AlreadyLoggedIn,

    /// Host binding is enabled but the caller supplied no remote host.
    #[error("host binding is enabled and no remote host was supplied")]
    HostBindingRequired,

    /// The caller asked for the bound host while host binding is off.
    #[error("host binding is disabled")]
    HostBindingDisabled,

    /// The token generator is stopped (shutdown in progress or complete).
    #[error(transparent)]
    Token(#[from] TokenError),

    /// A record already exists under this identifier. Internal retry
    /// signal; never returned from [`SessionManager`](crate::SessionManager).
    #[error("session identifier {0} already in use")]
    DuplicateId(crate::SessionId),
}

impl SessionError {
    /// Returns `true` if the token generator was unavailable.
    pub fn is_generator_stopped(&self) -> bool {
        matches!(self, Self::Token(TokenError::GeneratorStopped))
    }
}

/// Errors raised while loading a [`SessionConfig`](crate::SessionConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read session config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for `SessionConfig`.
    #[error("failed to parse session config: {0}")]
    Parse(#[from] serde_json::Error),
}
