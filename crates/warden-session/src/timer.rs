//! One-shot expiry timers with a cancel-or-rendezvous protocol.
//!
//! An [`ExpiryTimer`] bundles the handle used to cancel a pending timer with
//! the receiving end of its done signal, so the two can only be replaced
//! together. Each timer runs as its own Tokio task:
//!
//! ```text
//!            cancel() wins                 ttl elapses first
//! Pending ───────────────→ Cancelled   Pending ───────────────→ Fired
//!                                                                  │
//!                                                 on_fire() runs, then the
//!                                                 done signal is sent once
//! ```
//!
//! Exactly one of `cancel` and the timer task wins the transition out of
//! `Pending`. A caller whose `cancel` lost must wait on
//! [`ExpiryTimer::finished`] before touching the state `on_fire` mutates.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, oneshot};

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

struct TimerState {
    phase: AtomicU8,
    cancelled: Notify,
    /// Shared count of timers still in `Pending`, owned by the store.
    armed: Arc<AtomicUsize>,
}

impl TimerState {
    /// Moves `Pending` to `to`. Returns `false` if another party already
    /// moved it.
    fn leave_pending(&self, to: u8) -> bool {
        let won = self
            .phase
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.armed.fetch_sub(1, Ordering::AcqRel);
        }
        won
    }
}

/// A pending (or just-fired) expiry timer and its done signal.
///
/// Dropping an `ExpiryTimer` cancels it if it has not fired yet.
pub(crate) struct ExpiryTimer {
    serial: u64,
    state: Arc<TimerState>,
    /// Carries `on_fire`'s return value once the callback has completed.
    done: oneshot::Receiver<bool>,
}

impl ExpiryTimer {
    /// Spawns a timer task that calls `on_fire` once `ttl` elapses, unless
    /// cancelled first. Must be called from within a Tokio runtime.
    pub(crate) fn spawn<F>(
        serial: u64,
        ttl: Duration,
        armed: Arc<AtomicUsize>,
        on_fire: F,
    ) -> Self
    where
        F: FnOnce() -> bool + Send + 'static,
    {
        armed.fetch_add(1, Ordering::AcqRel);
        let state = Arc::new(TimerState {
            phase: AtomicU8::new(PENDING),
            cancelled: Notify::new(),
            armed,
        });
        let (done_tx, done) = oneshot::channel();

        let task_state = Arc::clone(&state);
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(ttl) => {}
                () = task_state.cancelled.notified() => return,
            }
            if !task_state.leave_pending(FIRED) {
                return;
            }
            let outcome = on_fire();
            // The receiver is gone when nobody raced this timer.
            let _ = done_tx.send(outcome);
        });

        Self {
            serial,
            state,
            done,
        }
    }

    /// Identifies this timer among all timers of one store.
    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }

    /// Returns `true` while the timer has neither fired nor been cancelled.
    pub(crate) fn is_pending(&self) -> bool {
        self.state.phase.load(Ordering::Acquire) == PENDING
    }

    /// Attempts to cancel the timer.
    ///
    /// Returns `true` if the timer will never fire. Returns `false` if it
    /// already fired: its callback is running or has run, and the caller
    /// must wait on [`finished`](Self::finished).
    pub(crate) fn cancel(&self) -> bool {
        if self.state.leave_pending(CANCELLED) {
            // A stored permit covers a task that has not polled yet.
            self.state.cancelled.notify_one();
            return true;
        }
        self.state.phase.load(Ordering::Acquire) == CANCELLED
    }

    /// Waits for the fired callback to complete and returns its result.
    /// Only meaningful after [`cancel`](Self::cancel) returned `false`.
    pub(crate) async fn finished(&mut self) -> bool {
        (&mut self.done).await.unwrap_or(false)
    }

    /// Cancels the timer, or waits for its callback if it already fired.
    /// Returns the callback's result in the latter case.
    pub(crate) async fn stop(mut self) -> Option<bool> {
        if self.cancel() {
            None
        } else {
            Some(self.finished().await)
        }
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
