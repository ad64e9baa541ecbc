//! Cookie session management for Warden.
//!
//! This crate handles the lifecycle of a session identifier:
//!
//! 1. **Login** — minting a unique identifier from [`warden_token`]
//!    entropy and binding it to a username (and optionally a remote host)
//! 2. **Resolution** — validating the identifier presented on each request
//! 3. **Expiry** — evicting sessions after a period of inactivity, with a
//!    sliding window restarted by [`SessionManager::touch`]
//! 4. **Logout**
//!
//! # How it fits in the stack
//!
//! ```text
//! Request handling (above)  ← reads cookies, writes Set-Cookie
//!     ↕
//! RequestContext / SessionManager (this crate)
//!     ↕
//! SessionStore + expiry timers (this crate) ← TokenGenerator (warden-token)
//! ```

mod config;
mod context;
mod error;
mod manager;
mod session;
mod store;
mod timer;

pub use config::{DEFAULT_COOKIE_NAME, DEFAULT_ID_BODY_LENGTH, DEFAULT_TTL_SECS, SessionConfig};
pub use context::RequestContext;
pub use error::{ConfigError, SessionError};
pub use manager::SessionManager;
pub use session::{CookieLifetime, RejectReason, Resolution, Session, SessionCookie, SessionId};
pub use store::SessionStore;
