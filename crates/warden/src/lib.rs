//! # Warden
//!
//! Server-side session identity for cookie-authenticated request handling.
//!
//! Warden hands out opaque random session identifiers, binds them to a
//! username (and optionally the remote host that logged in), expires them
//! after a period of inactivity, and validates them on every request.
//!
//! ## Quick Start
//!
//! ```rust
//! use warden::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), WardenError> {
//! let sessions = SessionManager::start(SessionConfig::default()).await;
//!
//! let id = sessions.login("alice", Some("10.0.0.1")).await?;
//! let resolution = sessions.resolve(&id, Some("10.0.0.1"))?;
//! assert_eq!(resolution.session().unwrap().username, "alice");
//!
//! sessions.touch(&id).await?;
//! sessions.logout(&id).await?;
//! sessions.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod error;
pub mod telemetry;

pub use error::WardenError;
pub use warden_session as session;
pub use warden_token as token;

/// Everything a request handler typically needs, in one import.
pub mod prelude {
    pub use crate::WardenError;
    pub use crate::telemetry::init_tracing;
    pub use warden_session::{
        CookieLifetime, RejectReason, RequestContext, Resolution, Session, SessionConfig,
        SessionCookie, SessionError, SessionId, SessionManager,
    };
    pub use warden_token::TokenGenerator;
}
