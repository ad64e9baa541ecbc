//! The session store: identifier → record, plus the expiry protocol.
//!
//! The store is the single source of truth for whether a session exists.
//! Every record optionally owns one [`ExpiryTimer`]; when that timer fires
//! its callback removes the record from the map. Callers that want to
//! replace or drop a timer race with that callback, and resolve the race
//! through the timer's done signal:
//!
//! ```text
//! refresh_timer(id)
//!   lock, take old timer ──→ cancel() ──ok──→ arm new timer, unlock
//!                               │
//!                             fired
//!                               ▼
//!   unlock, await done ──→ lock ──→ record still there? re-arm it
//!                                   removed by expiry?  re-insert + arm
//!                                   removed by logout?  leave it gone
//! ```
//!
//! The map lock is a plain `std::sync::Mutex`: it is never held across an
//! `.await`, and timer callbacks take it synchronously.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, info};

use crate::timer::ExpiryTimer;
use crate::{Session, SessionError, SessionId};

/// A session's identity plus its expiry timer (if TTL > 0).
struct SessionRecord {
    session: Session,
    timer: Option<ExpiryTimer>,
    /// Serial of a fired timer taken by a refresh that is waiting on its
    /// callback. Cleared whenever a new timer is installed.
    detached: Option<u64>,
}

impl SessionRecord {
    fn new(session: Session, timer: Option<ExpiryTimer>) -> Self {
        Self {
            session,
            timer,
            detached: None,
        }
    }

    /// Whether the timer with `serial` still decides this record's fate.
    fn expires_with(&self, serial: u64) -> bool {
        self.detached == Some(serial)
            || self.timer.as_ref().is_some_and(|t| t.serial() == serial)
    }
}

struct StoreInner {
    records: Mutex<HashMap<SessionId, SessionRecord>>,
    next_serial: AtomicU64,
    /// Number of timers that have neither fired nor been cancelled.
    armed: Arc<AtomicUsize>,
}

impl StoreInner {
    fn records(&self) -> MutexGuard<'_, HashMap<SessionId, SessionRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Timer callback. Removes the record only if this timer still owns it,
    /// i.e. no newer timer was installed and the record was not explicitly
    /// disarmed meanwhile. Returns whether it removed it.
    fn expire(&self, id: &SessionId, serial: u64) -> bool {
        let mut records = self.records();
        if !records.get(id).is_some_and(|r| r.expires_with(serial)) {
            return false;
        }
        records.remove(id);
        info!(%id, "session expired");
        true
    }
}

/// Concurrent map from session identifier to session record.
///
/// Cheap to clone; clones share the same map.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl SessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                records: Mutex::new(HashMap::new()),
                next_serial: AtomicU64::new(0),
                armed: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Inserts a timer-less record for `session`.
    ///
    /// # Errors
    /// [`SessionError::DuplicateId`] if a record already exists under
    /// `session.id`. The existing record is left untouched.
    pub fn insert(&self, session: Session) -> Result<(), SessionError> {
        let mut records = self.inner.records();
        if records.contains_key(&session.id) {
            return Err(SessionError::DuplicateId(session.id));
        }
        records.insert(session.id.clone(), SessionRecord::new(session, None));
        Ok(())
    }

    /// Returns a snapshot of the live session, if any.
    pub fn lookup(&self, id: &SessionId) -> Option<Session> {
        self.inner.records().get(id).map(|r| r.session.clone())
    }

    /// Deletes the record. Its timer, if still pending, is cancelled.
    /// Returns `false` if there was nothing to delete.
    pub fn remove(&self, id: &SessionId) -> bool {
        self.inner.records().remove(id).is_some()
    }

    /// Gives the record a fresh expiry timer of `ttl`, replacing (and
    /// cancelling) any existing one. A zero `ttl` leaves it timer-less.
    /// Returns `false` if the record does not exist.
    ///
    /// A replaced timer whose callback is already in flight no longer owns
    /// the record, so it cannot remove it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm_timer(&self, id: &SessionId, ttl: Duration) -> bool {
        let mut records = self.inner.records();
        let Some(record) = records.get_mut(id) else {
            return false;
        };
        self.install_timer(record, id, ttl);
        true
    }

    /// Restarts the record's expiry countdown at `ttl` (zero removes the
    /// timer), safely against the old timer firing concurrently.
    ///
    /// Returns `false` if the record does not exist, or was logged out
    /// while this call waited on an in-flight expiry.
    pub async fn refresh_timer(&self, id: &SessionId, ttl: Duration) -> bool {
        let (session, mut fired) = {
            let mut records = self.inner.records();
            let Some(record) = records.get_mut(id) else {
                return false;
            };
            match record.timer.take() {
                // Lost the race: the old timer's callback is in flight.
                Some(timer) if !timer.cancel() => {
                    record.detached = Some(timer.serial());
                    (record.session.clone(), timer)
                }
                _ => {
                    self.install_timer(record, id, ttl);
                    debug!(%id, ?ttl, "session timer refreshed");
                    return true;
                }
            }
        };

        let removed_by_expiry = fired.finished().await;

        let mut records = self.inner.records();
        if let Some(record) = records.get_mut(id) {
            self.install_timer(record, id, ttl);
            debug!(%id, ?ttl, "session timer refreshed after concurrent re-arm");
            return true;
        }
        if !removed_by_expiry {
            return false;
        }
        let timer = self.spawn_timer(id, ttl);
        records.insert(id.clone(), SessionRecord::new(session, timer));
        debug!(%id, ?ttl, "session restored after concurrent expiry");
        true
    }

    /// Removes the record for logout. If its timer already fired, waits
    /// for the expiry callback to finish before returning, so the caller
    /// never observes a half-expired session.
    ///
    /// Returns `false` if the record did not exist.
    pub async fn unarm(&self, id: &SessionId) -> bool {
        let Some(mut record) = self.inner.records().remove(id) else {
            return false;
        };
        if let Some(timer) = record.timer.take() {
            timer.stop().await;
        }
        true
    }

    /// Whether the record has a pending timer. `None` if it does not exist.
    pub fn timer_armed(&self, id: &SessionId) -> Option<bool> {
        self.inner
            .records()
            .get(id)
            .map(|r| r.timer.as_ref().is_some_and(ExpiryTimer::is_pending))
    }

    /// Number of timers, across all records, that have not yet fired or
    /// been cancelled.
    pub fn pending_timers(&self) -> usize {
        self.inner.armed.load(Ordering::Acquire)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.records().len()
    }

    /// Whether there are no live sessions.
    pub fn is_empty(&self) -> bool {
        self.inner.records().is_empty()
    }

    /// Replaces the record's timer (dropping the old one cancels it) and
    /// takes ownership back from any detached, in-flight expiry.
    fn install_timer(&self, record: &mut SessionRecord, id: &SessionId, ttl: Duration) {
        record.timer = self.spawn_timer(id, ttl);
        record.detached = None;
    }

    fn spawn_timer(&self, id: &SessionId, ttl: Duration) -> Option<ExpiryTimer> {
        if ttl.is_zero() {
            return None;
        }
        let serial = self.inner.next_serial.fetch_add(1, Ordering::Relaxed);
        let store: Weak<StoreInner> = Arc::downgrade(&self.inner);
        let id = id.clone();
        Some(ExpiryTimer::spawn(
            serial,
            ttl,
            Arc::clone(&self.inner.armed),
            move || store.upgrade().is_some_and(|inner| inner.expire(&id, serial)),
        ))
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
