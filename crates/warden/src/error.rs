//! Unified error type for Warden.

use warden_session::{ConfigError, SessionError};
use warden_token::TokenError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates `From` impls, so `?`
/// converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// A session-level error (not logged in, host binding, ...).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The token generator is stopped.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The session configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
