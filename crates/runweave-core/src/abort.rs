// Cooperative abort signal
//
// A one-shot binary flag shared by a run and all its descendants. Setting it
// is sticky; waiters are woken exactly once and late waiters return
// immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    aborted: AtomicBool,
    notify: Notify,
}

/// Cancellable one-shot flag checked at every suspension point
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    inner: Arc<Inner>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn set(&self) {
        self.inner.aborted.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Wait until the signal is set. Returns immediately if already set.
    pub async fn aborted(&self) {
        loop {
            if self.is_aborted() {
                return;
            }
            let notified = self.inner.notify.notified();
            // Re-check after registering to close the race with set()
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_wakes_waiters() {
        let signal = AbortSignal::new();
        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.aborted().await });
        tokio::task::yield_now().await;
        signal.set();
        handle.await.unwrap();
        assert!(signal.is_aborted());
    }

    #[tokio::test]
    async fn late_waiter_returns_immediately() {
        let signal = AbortSignal::new();
        signal.set();
        signal.aborted().await;
    }
}
