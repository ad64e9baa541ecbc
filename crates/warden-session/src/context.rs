//! Per-request view of the session manager.
//!
//! A [`RequestContext`] is built by [`SessionManager::parse_request`] for
//! every inbound request. It remembers whether the request carries a valid
//! session and which cookie, if any, the response should set. The response
//! layer reads [`RequestContext::response_cookie`] when it writes headers.

use crate::{Session, SessionCookie, SessionError, SessionId, SessionManager};

/// Session state for a single request.
pub struct RequestContext<'m> {
    manager: &'m SessionManager,
    /// Host of the peer that sent this request, if the transport knew it.
    remote_host: Option<String>,
    session: Option<Session>,
    response_cookie: Option<SessionCookie>,
}

impl<'m> RequestContext<'m> {
    pub(crate) fn anonymous(manager: &'m SessionManager, remote_host: Option<String>) -> Self {
        Self {
            manager,
            remote_host,
            session: None,
            response_cookie: None,
        }
    }

    pub(crate) fn attach(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub(crate) fn set_response_cookie(&mut self, cookie: SessionCookie) {
        self.response_cookie = Some(cookie);
    }

    /// Whether the request carries a live session.
    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    /// The session identifier of this request.
    pub fn id(&self) -> Result<&SessionId, SessionError> {
        self.current().map(|s| &s.id)
    }

    /// The username the session was created for.
    pub fn username(&self) -> Result<&str, SessionError> {
        self.current().map(|s| s.username.as_str())
    }

    /// The host the session is bound to.
    ///
    /// # Errors
    /// - [`SessionError::NotLoggedIn`] for an anonymous request
    /// - [`SessionError::HostBindingDisabled`] when host binding is off
    pub fn host(&self) -> Result<&str, SessionError> {
        let session = self.current()?;
        if !self.manager.config().host_binding {
            return Err(SessionError::HostBindingDisabled);
        }
        session
            .host
            .as_deref()
            .ok_or(SessionError::HostBindingDisabled)
    }

    /// Logs `username` in and queues the session cookie for the response.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyLoggedIn`] if this request already has a
    ///   session
    /// - anything [`SessionManager::login`] returns
    pub async fn login(&mut self, username: &str) -> Result<(), SessionError> {
        if self.session.is_some() {
            return Err(SessionError::AlreadyLoggedIn);
        }
        let id = self
            .manager
            .login(username, self.remote_host.as_deref())
            .await?;
        self.response_cookie = Some(self.manager.session_cookie(&id));
        self.session = Some(Session {
            host: self
                .manager
                .config()
                .host_binding
                .then(|| self.remote_host.clone())
                .flatten(),
            id,
            username: username.to_string(),
        });
        Ok(())
    }

    /// Logs out and queues the removal cookie for the response.
    ///
    /// The context becomes anonymous even if the session had already
    /// expired in the store.
    ///
    /// # Errors
    /// [`SessionError::NotLoggedIn`] for an anonymous request.
    pub async fn logout(&mut self) -> Result<(), SessionError> {
        let session = self.session.take().ok_or(SessionError::NotLoggedIn)?;
        self.response_cookie = Some(self.manager.removal_cookie());
        match self.manager.logout(&session.id).await {
            Ok(()) | Err(SessionError::NotLoggedIn) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Restarts the session's inactivity countdown and re-issues the
    /// session cookie with a fresh max-age.
    ///
    /// # Errors
    /// [`SessionError::NotLoggedIn`] for an anonymous request, or if the
    /// session was removed from the store since this request began.
    pub async fn reset_timer(&mut self) -> Result<(), SessionError> {
        let id = self.id()?.clone();
        if let Err(e) = self.manager.touch(&id).await {
            self.session = None;
            self.response_cookie = Some(self.manager.removal_cookie());
            return Err(e);
        }
        self.response_cookie = Some(self.manager.session_cookie(&id));
        Ok(())
    }

    /// The cookie the response should set, if any.
    pub fn response_cookie(&self) -> Option<&SessionCookie> {
        self.response_cookie.as_ref()
    }

    fn current(&self) -> Result<&Session, SessionError> {
        self.session.as_ref().ok_or(SessionError::NotLoggedIn)
    }
}
