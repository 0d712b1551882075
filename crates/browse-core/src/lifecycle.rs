//! "Is the owning view still there?"
//!
//! Deferred work asks a [`LifecycleGuard`] before touching anything visible.
//! [`ViewLifecycle`] is the stock implementation: a cancellation token that
//! the view closes when it goes away.  In-flight probes also watch the token
//! so they stop waiting on the server once nobody will see the answer.

use tokio_util::sync::CancellationToken;
use tracing::info;

pub trait LifecycleGuard: Send + Sync {
    fn is_active(&self) -> bool;
}

impl<F> LifecycleGuard for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_active(&self) -> bool {
        self()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewLifecycle {
    token: CancellationToken,
}

impl ViewLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the view as gone.  Idempotent.
    pub fn close(&self) {
        if !self.token.is_cancelled() {
            info!("lifecycle: view closed");
        }
        self.token.cancel();
    }

    /// Token that fires when the view closes.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl LifecycleGuard for ViewLifecycle {
    fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}
