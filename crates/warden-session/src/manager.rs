//! The session manager: the public façade over tokens, store and config.
//!
//! It's responsible for:
//! - Minting unique session identifiers at login
//! - Validating presented identifiers (optionally against the remote host)
//! - Sliding-window expiry (`touch` on every authenticated request)
//! - Logout
//! - Building the session/removal cookie instructions
//!
//! # Concurrency note
//!
//! `SessionManager` is `Send + Sync` and meant to be shared behind an
//! `Arc` by every request task. The store and the token generator do their
//! own synchronisation; the manager holds no locks of its own.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use warden_token::TokenGenerator;

use crate::{
    CookieLifetime, RejectReason, RequestContext, Resolution, Session, SessionConfig,
    SessionCookie, SessionError, SessionId, SessionStore,
};

/// Manages all live sessions.
///
/// ## Lifecycle
///
/// ```text
/// login() ──→ [Active] ──touch()──→ [Active] (countdown restarted)
///                │
///                ├──logout()──→ [Gone]
///                └──ttl elapses without touch()──→ [Gone]
/// ```
pub struct SessionManager {
    config: SessionConfig,
    store: SessionStore,
    tokens: Arc<TokenGenerator>,
}

impl SessionManager {
    /// Creates a manager with its own token generator, already started.
    pub async fn start(config: SessionConfig) -> Self {
        let tokens = Arc::new(TokenGenerator::new());
        tokens.start().await;
        Self::with_generator(config, tokens)
    }

    /// Creates a manager drawing identifiers from a shared generator.
    /// Starting and stopping that generator is the caller's job.
    pub fn with_generator(config: SessionConfig, tokens: Arc<TokenGenerator>) -> Self {
        Self {
            config: config.validated(),
            store: SessionStore::new(),
            tokens,
        }
    }

    /// The validated configuration this manager runs with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The underlying store. Exposed for diagnostics.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Stops the token generator. Later logins fail with
    /// `GeneratorStopped`; existing sessions keep working.
    pub async fn shutdown(&self) {
        self.tokens.stop().await;
    }

    /// Creates a session for `username` and returns its identifier.
    ///
    /// # Errors
    /// - [`SessionError::HostBindingRequired`] if host binding is on and
    ///   `remote_host` is missing or empty
    /// - [`SessionError::Token`] if the token generator is stopped
    pub async fn login(
        &self,
        username: &str,
        remote_host: Option<&str>,
    ) -> Result<SessionId, SessionError> {
        let host = if self.config.host_binding {
            match remote_host {
                Some(host) if !host.is_empty() => Some(host.to_string()),
                _ => return Err(SessionError::HostBindingRequired),
            }
        } else {
            None
        };

        let id = loop {
            let body = self.tokens.next_token(self.config.id_body_length).await?;
            let id = SessionId::new(self.config.compose_id(&body));
            let session = Session {
                id: id.clone(),
                username: username.to_string(),
                host: host.clone(),
            };
            match self.store.insert(session) {
                Ok(()) => break id,
                Err(SessionError::DuplicateId(taken)) => {
                    tracing::debug!(id = %taken, "session id collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        };

        self.store.arm_timer(&id, self.config.ttl());

        tracing::info!(%id, username, "session created");
        Ok(id)
    }

    /// Looks up a presented identifier for the current request.
    ///
    /// An unknown identifier and a host mismatch both resolve to
    /// [`Resolution::Rejected`]; neither is an error.
    ///
    /// # Errors
    /// [`SessionError::HostBindingRequired`] if host binding is on and
    /// `remote_host` is `None`.
    pub fn resolve(
        &self,
        id: &SessionId,
        remote_host: Option<&str>,
    ) -> Result<Resolution, SessionError> {
        let Some(session) = self.store.lookup(id) else {
            return Ok(Resolution::Rejected(RejectReason::Unknown));
        };

        if self.config.host_binding {
            let remote = remote_host.ok_or(SessionError::HostBindingRequired)?;
            if session.host.as_deref() != Some(remote) {
                tracing::warn!(
                    %id,
                    bound = session.host.as_deref().unwrap_or_default(),
                    remote,
                    "session presented from a different host"
                );
                return Ok(Resolution::Rejected(RejectReason::HostMismatch));
            }
        }

        Ok(Resolution::Active(session))
    }

    /// Ends the session.
    ///
    /// # Errors
    /// [`SessionError::NotLoggedIn`] if no such session exists.
    pub async fn logout(&self, id: &SessionId) -> Result<(), SessionError> {
        if !self.store.unarm(id).await {
            return Err(SessionError::NotLoggedIn);
        }
        tracing::info!(%id, "session logged out");
        Ok(())
    }

    /// Restarts the session's inactivity countdown at the configured TTL.
    ///
    /// # Errors
    /// [`SessionError::NotLoggedIn`] if no such session exists.
    pub async fn touch(&self, id: &SessionId) -> Result<(), SessionError> {
        if self.store.refresh_timer(id, self.config.ttl()).await {
            Ok(())
        } else {
            Err(SessionError::NotLoggedIn)
        }
    }

    /// Builds the per-request context from the session cookie value (if
    /// any) and the peer address supplied by the transport.
    ///
    /// A stale or host-mismatched cookie yields an anonymous context that
    /// already carries a removal cookie.
    ///
    /// # Errors
    /// [`SessionError::HostBindingRequired`] if a cookie was presented,
    /// host binding is on and `peer` is `None`.
    pub fn parse_request(
        &self,
        cookie_value: Option<&str>,
        peer: Option<SocketAddr>,
    ) -> Result<RequestContext<'_>, SessionError> {
        let remote_host = peer.map(|addr| addr.ip().to_string());
        let mut ctx = RequestContext::anonymous(self, remote_host.clone());

        let Some(value) = cookie_value else {
            return Ok(ctx);
        };

        let resolution = self.resolve(&SessionId::from(value), remote_host.as_deref())?;
        if resolution.clears_cookie() {
            ctx.set_response_cookie(self.removal_cookie());
        }
        if let Some(session) = resolution.into_session() {
            ctx.attach(session);
        }
        Ok(ctx)
    }

    /// The cookie that hands `id` to the client. Its max-age matches the
    /// TTL rounded to whole seconds; with expiry disabled it is a browser
    /// session cookie.
    pub fn session_cookie(&self, id: &SessionId) -> SessionCookie {
        let ttl = self.config.ttl();
        let lifetime = if ttl.is_zero() {
            CookieLifetime::BrowserSession
        } else {
            CookieLifetime::MaxAge(Duration::from_secs(ttl.as_secs()))
        };
        SessionCookie {
            name: self.config.cookie_name.clone(),
            value: id.to_string(),
            path: self.config.cookie_path.clone(),
            domain: self.config.cookie_domain.clone(),
            secure: self.config.cookie_secure,
            http_only: self.config.cookie_http_only,
            lifetime,
        }
    }

    /// The cookie that tells the client to forget its session identifier.
    pub fn removal_cookie(&self) -> SessionCookie {
        SessionCookie {
            name: self.config.cookie_name.clone(),
            value: String::new(),
            path: self.config.cookie_path.clone(),
            domain: self.config.cookie_domain.clone(),
            secure: false,
            http_only: false,
            lifetime: CookieLifetime::Expired,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `SessionManager`.
    //!
    //! Naming convention: `test_{function}_{scenario}_{expected}`.
    //!
    //! Time-dependent tests run on a paused Tokio clock
    //! (`start_paused = true`), so sleeping 31 seconds is instant and
    //! deterministic.

    use super::*;

    const HOST: &str = "10.0.0.1";
    const OTHER_HOST: &str = "10.0.0.2";

    // -- Helpers ----------------------------------------------------------

    async fn manager_with_ttl(ttl_secs: u64) -> SessionManager {
        SessionManager::start(SessionConfig {
            ttl_secs,
            ..SessionConfig::default()
        })
        .await
    }

    async fn manager_without_binding() -> SessionManager {
        SessionManager::start(SessionConfig {
            host_binding: false,
            ..SessionConfig::default()
        })
        .await
    }

    // =====================================================================
    // login()
    // =====================================================================

    #[tokio::test]
    async fn test_login_returns_id_of_configured_length() {
        let mgr = manager_with_ttl(60).await;

        let id = mgr.login("alice", Some(HOST)).await.unwrap();

        assert_eq!(id.as_str().len(), 16);
        let session = mgr.store().lookup(&id).expect("stored");
        assert_eq!(session.username, "alice");
        assert_eq!(session.host.as_deref(), Some(HOST));
    }

    #[tokio::test]
    async fn test_login_with_prefix_prepends_it() {
        let mgr = SessionManager::start(SessionConfig {
            id_prefix: "api".into(),
            id_body_length: 8,
            ..SessionConfig::default()
        })
        .await;

        let id = mgr.login("alice", Some(HOST)).await.unwrap();

        assert!(id.as_str().starts_with("api-"));
        assert_eq!(id.as_str().len(), "api-".len() + 8);
    }

    #[tokio::test]
    async fn test_login_without_host_when_binding_enabled_fails() {
        let mgr = manager_with_ttl(60).await;

        assert_eq!(
            mgr.login("alice", None).await,
            Err(SessionError::HostBindingRequired)
        );
        assert_eq!(
            mgr.login("alice", Some("")).await,
            Err(SessionError::HostBindingRequired)
        );
        assert!(mgr.store().is_empty());
    }

    #[tokio::test]
    async fn test_login_without_binding_ignores_host() {
        let mgr = manager_without_binding().await;

        let id = mgr.login("alice", Some(HOST)).await.unwrap();

        assert_eq!(mgr.store().lookup(&id).unwrap().host, None);
    }

    #[tokio::test]
    async fn test_login_arms_timer_only_when_ttl_positive() {
        let timed = manager_with_ttl(60).await;
        let untimed = manager_with_ttl(0).await;

        let a = timed.login("alice", Some(HOST)).await.unwrap();
        let b = untimed.login("bob", Some(HOST)).await.unwrap();

        assert_eq!(timed.store().timer_armed(&a), Some(true));
        assert_eq!(untimed.store().timer_armed(&b), Some(false));
    }

    #[tokio::test]
    async fn test_login_after_shutdown_reports_generator_stopped() {
        let mgr = manager_with_ttl(60).await;
        mgr.shutdown().await;

        let err = mgr.login("alice", Some(HOST)).await.unwrap_err();

        assert!(err.is_generator_stopped());
    }

    #[tokio::test]
    async fn test_login_retries_past_id_collisions() {
        // One-character bodies: 62 possible ids, so later logins collide
        // repeatedly and must keep regenerating until a free one appears.
        let mgr = SessionManager::start(SessionConfig {
            id_body_length: 1,
            ttl_secs: 0,
            host_binding: false,
            ..SessionConfig::default()
        })
        .await;

        let mut ids = std::collections::HashSet::new();
        for i in 0..62 {
            let id = mgr.login(&format!("user{i}"), None).await.unwrap();
            assert!(ids.insert(id), "duplicate id handed out");
        }

        assert_eq!(mgr.store().len(), 62);
    }

    // =====================================================================
    // resolve()
    // =====================================================================

    #[tokio::test]
    async fn test_resolve_same_host_returns_session() {
        let mgr = manager_with_ttl(30).await;
        let id = mgr.login("alice", Some(HOST)).await.unwrap();

        let resolution = mgr.resolve(&id, Some(HOST)).unwrap();

        assert_eq!(resolution.session().unwrap().username, "alice");
        assert!(!resolution.clears_cookie());
    }

    #[tokio::test]
    async fn test_resolve_other_host_is_rejected() {
        let mgr = manager_with_ttl(30).await;
        let id = mgr.login("alice", Some(HOST)).await.unwrap();

        let resolution = mgr.resolve(&id, Some(OTHER_HOST)).unwrap();

        assert_eq!(resolution, Resolution::Rejected(RejectReason::HostMismatch));
        assert!(resolution.clears_cookie());
        // The session itself survives; only this request is refused.
        assert!(mgr.resolve(&id, Some(HOST)).unwrap().session().is_some());
    }

    #[tokio::test]
    async fn test_resolve_unknown_is_rejected() {
        let mgr = manager_with_ttl(30).await;

        let resolution = mgr.resolve(&SessionId::new("stale"), Some(HOST)).unwrap();

        assert_eq!(resolution, Resolution::Rejected(RejectReason::Unknown));
    }

    #[tokio::test]
    async fn test_resolve_without_host_when_binding_enabled_fails() {
        let mgr = manager_with_ttl(30).await;
        let id = mgr.login("alice", Some(HOST)).await.unwrap();

        assert_eq!(
            mgr.resolve(&id, None),
            Err(SessionError::HostBindingRequired)
        );
    }

    #[tokio::test]
    async fn test_resolve_without_binding_accepts_any_host() {
        let mgr = manager_without_binding().await;
        let id = mgr.login("alice", None).await.unwrap();

        assert!(mgr.resolve(&id, Some(OTHER_HOST)).unwrap().session().is_some());
        assert!(mgr.resolve(&id, None).unwrap().session().is_some());
    }

    // =====================================================================
    // logout() / touch()
    // =====================================================================

    #[tokio::test]
    async fn test_logout_removes_session_and_timer() {
        let mgr = manager_with_ttl(30).await;
        let id = mgr.login("alice", Some(HOST)).await.unwrap();

        mgr.logout(&id).await.unwrap();

        assert!(mgr.store().lookup(&id).is_none());
        assert_eq!(mgr.store().pending_timers(), 0);
    }

    #[tokio::test]
    async fn test_logout_twice_returns_not_logged_in() {
        let mgr = manager_with_ttl(30).await;
        let id = mgr.login("alice", Some(HOST)).await.unwrap();
        mgr.logout(&id).await.unwrap();

        assert_eq!(mgr.logout(&id).await, Err(SessionError::NotLoggedIn));
    }

    #[tokio::test]
    async fn test_touch_unknown_returns_not_logged_in() {
        let mgr = manager_with_ttl(30).await;

        assert_eq!(
            mgr.touch(&SessionId::new("ghost")).await,
            Err(SessionError::NotLoggedIn)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_alice_expires_after_31_seconds() {
        let mgr = manager_with_ttl(30).await;
        let id = mgr.login("alice", Some(HOST)).await.unwrap();

        let same = mgr.resolve(&id, Some(HOST)).unwrap();
        assert_eq!(same.session().unwrap().username, "alice");

        let other = mgr.resolve(&id, Some(OTHER_HOST)).unwrap();
        assert!(other.session().is_none());
        assert!(other.clears_cookie());

        tokio::time::sleep(Duration::from_secs(31)).await;

        let later = mgr.resolve(&id, Some(HOST)).unwrap();
        assert_eq!(later, Resolution::Rejected(RejectReason::Unknown));
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_every_half_ttl_keeps_session_alive() {
        let mgr = manager_with_ttl(10).await;
        let id = mgr.login("alice", Some(HOST)).await.unwrap();

        for _ in 0..20 {
            tokio::time::sleep(Duration::from_secs(5)).await;
            mgr.touch(&id).await.expect("still alive");
        }

        // Stop touching: alive just before the TTL, gone just after.
        tokio::time::sleep(Duration::from_millis(9_999)).await;
        assert!(mgr.resolve(&id, Some(HOST)).unwrap().session().is_some());
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(mgr.resolve(&id, Some(HOST)).unwrap().session().is_none());
    }

    // =====================================================================
    // cookies
    // =====================================================================

    #[tokio::test]
    async fn test_session_cookie_carries_id_and_ttl() {
        let mgr = SessionManager::start(SessionConfig {
            cookie_name: "sid".into(),
            cookie_domain: "example.com".into(),
            cookie_secure: true,
            cookie_http_only: true,
            ttl_secs: 90,
            ..SessionConfig::default()
        })
        .await;

        let cookie = mgr.session_cookie(&SessionId::new("abc"));

        assert_eq!(cookie.name, "sid");
        assert_eq!(cookie.value, "abc");
        assert_eq!(cookie.path, "/");
        assert_eq!(cookie.domain, "example.com");
        assert!(cookie.secure && cookie.http_only);
        assert_eq!(cookie.lifetime, CookieLifetime::MaxAge(Duration::from_secs(90)));
        assert!(!cookie.is_removal());
    }

    #[tokio::test]
    async fn test_session_cookie_without_ttl_is_browser_session() {
        let mgr = manager_with_ttl(0).await;

        let cookie = mgr.session_cookie(&SessionId::new("abc"));

        assert_eq!(cookie.lifetime, CookieLifetime::BrowserSession);
    }

    #[tokio::test]
    async fn test_removal_cookie_is_empty_and_expired() {
        let mgr = manager_with_ttl(30).await;

        let cookie = mgr.removal_cookie();

        assert_eq!(cookie.name, "warden");
        assert!(cookie.value.is_empty());
        assert!(cookie.is_removal());
    }
}
