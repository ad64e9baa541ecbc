//! Background entropy producer for Warden session identifiers.
//!
//! A single dedicated thread draws characters uniformly from a fixed
//! 62-character alphanumeric alphabet and pushes them into a bounded queue.
//! Callers that need an N-character token pull N characters from that
//! queue instead of constructing their own PRNG on every request.
//!
//! # Lifecycle
//!
//! ```text
//! new() ──→ start() ──→ next_token() … ──→ stop()
//!   [Stopped]  [Running]                   [Stopped]
//! ```
//!
//! Both `start` and `stop` are idempotent. `stop` waits for in-flight
//! [`TokenGenerator::next_token`] calls, then drains the queue until the
//! producer closes it, so the producer thread always observes the stop
//! signal and exits instead of staying blocked on a full queue.
//!
//! # Example
//!
//! ```rust
//! use warden_token::TokenGenerator;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), warden_token::TokenError> {
//! let tokens = TokenGenerator::new();
//! tokens.start().await;
//! let body = tokens.next_token(16).await?;
//! assert_eq!(body.len(), 16);
//! tokens.stop().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, error};

/// Characters a token may contain.
pub const ALPHABET: &[u8; 62] =
    b"qwertyuiopasdfghjklzxcvbnmQWERTYUIOPASDFGHJKLZXCVBNM0123456789";

/// Capacity of the queue between the producer thread and consumers.
pub const QUEUE_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by [`TokenGenerator`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// The generator is stopped, or its queue closed before the requested
    /// number of characters was delivered (`stop` raced with consumption).
    #[error("token generator is stopped")]
    GeneratorStopped,
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// The running half of the generator: the consumer end of the queue plus
/// the flag the producer thread polls between pushes.
struct Producer {
    chars: Mutex<mpsc::Receiver<u8>>,
    halt: Arc<AtomicBool>,
}

/// Owned entropy service. Construct one per process (or per manager) and
/// share it behind an `Arc`.
pub struct TokenGenerator {
    /// `None` while stopped. `next_token` holds a read guard for the whole
    /// token so `stop` (a writer) waits for in-flight calls.
    state: RwLock<Option<Producer>>,
}

impl TokenGenerator {
    /// Creates a stopped generator. Call [`start`](Self::start) before
    /// requesting tokens.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(None),
        }
    }

    /// Spawns the producer thread. No-op if already running.
    ///
    /// If the OS refuses to spawn the thread the generator stays stopped
    /// and every `next_token` call fails with
    /// [`TokenError::GeneratorStopped`].
    pub async fn start(&self) {
        let mut state = self.state.write().await;
        if state.is_some() {
            return;
        }

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let halt = Arc::new(AtomicBool::new(false));
        let seed = time_seed();

        let spawned = thread::Builder::new()
            .name("warden-token-producer".into())
            .spawn({
                let halt = Arc::clone(&halt);
                move || produce(tx, halt, seed)
            });

        match spawned {
            Ok(_) => {
                *state = Some(Producer {
                    chars: Mutex::new(rx),
                    halt,
                });
                debug!(capacity = QUEUE_CAPACITY, "token generator started");
            }
            Err(e) => {
                error!(error = %e, "failed to spawn token producer thread");
            }
        }
    }

    /// Halts the producer and drains the queue. No-op if not running.
    ///
    /// Calls to [`next_token`](Self::next_token) already holding the
    /// consumer side finish normally; calls arriving afterwards fail with
    /// [`TokenError::GeneratorStopped`].
    pub async fn stop(&self) {
        let mut state = self.state.write().await;
        let Some(producer) = state.take() else {
            return;
        };

        producer.halt.store(true, Ordering::Release);

        // Every receive frees a slot, so a producer blocked on a full queue
        // gets to re-check `halt`. `None` means it dropped its sender.
        let mut chars = producer.chars.into_inner();
        let mut drained = 0usize;
        while chars.recv().await.is_some() {
            drained += 1;
        }

        debug!(drained, "token generator stopped");
    }

    /// Returns `true` between `start` and `stop`.
    pub async fn is_running(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Pulls `length` characters from the queue and returns them as one
    /// string. A zero length returns an empty string without consuming
    /// entropy.
    ///
    /// # Errors
    /// [`TokenError::GeneratorStopped`] if the generator is not running or
    /// its queue closes before `length` characters arrive.
    pub async fn next_token(&self, length: usize) -> Result<String, TokenError> {
        if length == 0 {
            return Ok(String::new());
        }

        let state = self.state.read().await;
        let producer = state.as_ref().ok_or(TokenError::GeneratorStopped)?;

        let mut chars = producer.chars.lock().await;
        let mut token = String::with_capacity(length);
        for _ in 0..length {
            let c = chars.recv().await.ok_or(TokenError::GeneratorStopped)?;
            token.push(char::from(c));
        }
        Ok(token)
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TokenGenerator {
    fn drop(&mut self) {
        // Dropping the receiver makes the producer's next push fail, so the
        // thread exits even without the flag.
        if let Some(producer) = self.state.get_mut().take() {
            producer.halt.store(true, Ordering::Release);
        }
    }
}

/// Producer thread body. Runs until `halt` is set or the queue's receiver
/// is gone; dropping `tx` on return closes the queue.
fn produce(tx: mpsc::Sender<u8>, halt: Arc<AtomicBool>, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    while !halt.load(Ordering::Acquire) {
        let c = ALPHABET[rng.random_range(0..ALPHABET.len())];
        if tx.blocking_send(c).is_err() {
            break;
        }
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        // Keep the fast-moving low 64 bits of the nanosecond count.
        .map(|d| (d.as_nanos() & u128::from(u64::MAX)) as u64)
        .unwrap_or_default()
}

// =========================================================================
// Tests
// =========================================================================
