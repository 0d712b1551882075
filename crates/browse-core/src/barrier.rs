//! Fan-in primitive: collect N completion signals, finalize exactly once.
//!
//! Signals may arrive from any number of tasks or threads in any order.  Each
//! signal first claims a slot, records its (optional) result, and only then
//! counts itself complete.  The invocation whose completion brings the count
//! to N takes the accumulated results and runs the finalize callback; nobody
//! else ever sees the callback.
//!
//! ```text
//!  signal ──claim slot──▶ slot < N ? ──push result──▶ completed += 1 ──▶ == N ? finalize
//!                              │
//!                              └─ slot ≥ N: ignored (excess signal)
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

type Finalizer<T> = Box<dyn FnOnce(Vec<T>) + Send>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BarrierError {
    #[error("completion barrier needs at least one expected signal")]
    ZeroExpected,
}

/// What a single `signal` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Counted; `remaining` more signals are needed.
    Pending { remaining: usize },
    /// This call completed the Nth signal and ran the finalizer.
    Finalized,
    /// The barrier had already received N signals; the call had no effect.
    Ignored,
}

pub struct CompletionBarrier<T> {
    expected: usize,
    /// Slots handed out, including excess claims.
    claimed: AtomicUsize,
    /// Signals whose result has been recorded.
    completed: AtomicUsize,
    results: Mutex<Vec<T>>,
    finalize: Mutex<Option<Finalizer<T>>>,
}

impl<T: Send> CompletionBarrier<T> {
    pub fn new<F>(expected: usize, finalize: F) -> Result<Self, BarrierError>
    where
        F: FnOnce(Vec<T>) + Send + 'static,
    {
        if expected == 0 {
            return Err(BarrierError::ZeroExpected);
        }
        Ok(Self {
            expected,
            claimed: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            results: Mutex::new(Vec::with_capacity(expected)),
            finalize: Mutex::new(Some(Box::new(finalize))),
        })
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Number of counted signals so far (never exceeds `expected`).
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn is_finalized(&self) -> bool {
        self.completed() == self.expected
    }

    /// Deliver one completion, with a result on success or `None` on failure.
    pub fn signal(&self, result: Option<T>) -> Signal {
        let slot = self.claimed.fetch_add(1, Ordering::AcqRel);
        if slot >= self.expected {
            warn!(
                "CompletionBarrier: ignoring signal {} beyond expected {}",
                slot + 1,
                self.expected
            );
            return Signal::Ignored;
        }

        if let Some(value) = result {
            lock(&self.results).push(value);
        }

        let done = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        if done < self.expected {
            return Signal::Pending {
                remaining: self.expected - done,
            };
        }

        let results = std::mem::take(&mut *lock(&self.results));
        let finalize = lock(&self.finalize).take();
        match finalize {
            Some(f) => {
                debug!(
                    "CompletionBarrier: {}/{} signals in, finalizing with {} result(s)",
                    done,
                    self.expected,
                    results.len()
                );
                f(results);
            }
            None => warn!("CompletionBarrier: finalizer already consumed"),
        }
        Signal::Finalized
    }
}

impl<T> std::fmt::Debug for CompletionBarrier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionBarrier")
            .field("expected", &self.expected)
            .field("completed", &self.completed.load(Ordering::Relaxed))
            .finish()
    }
}

// A panicking finalizer must not wedge later signals.
fn lock<V>(m: &Mutex<V>) -> MutexGuard<'_, V> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
