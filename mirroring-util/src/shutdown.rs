//! A reference-counted drain coordinator.
//!
//! Named and shaped after the `ShutdownSender`/completion-handle pairing the
//! teacher workspace uses for the same problem: a counter of outstanding
//! asynchronous work, plus a notification that fires once the count returns
//! to zero, so that `close()` can be awaited without a reentrant lock.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

struct Inner {
    /// Outstanding asynchronous operations, plus one for "table open" until `close` is called.
    count: AtomicUsize,
    closed: AtomicBool,
    zero: Notify,
}

/// Tracks outstanding asynchronous work for one [`MirroringTable`](../../mirroring_client/struct.MirroringTable.html)
/// or [`MirroringScanner`](../../mirroring_client/struct.MirroringScanner.html), and signals
/// completion for graceful close.
#[derive(Clone)]
pub struct ReferenceCounter {
    inner: Arc<Inner>,
}

impl Default for ReferenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceCounter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                count: AtomicUsize::new(1),
                closed: AtomicBool::new(false),
                zero: Notify::new(),
            }),
        }
    }

    /// Increments the count and returns a guard that decrements it (and wakes any waiter on
    /// [`close`](Self::close) if the count reaches zero) when dropped.
    pub fn hold(&self) -> ReferenceGuard {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        ReferenceGuard {
            inner: self.inner.clone(),
        }
    }

    /// Holds a reference for the duration of `fut`.
    pub async fn hold_until_completion<F: Future>(&self, fut: F) -> F::Output {
        let _guard = self.hold();
        fut.await
    }

    /// Number of outstanding holds, including the implicit "table open" one if not yet closed.
    pub fn outstanding(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Releases the "table open" reservation and returns a handle that resolves once every
    /// outstanding hold has been released. Idempotent: every caller, including ones after the
    /// first, gets a handle to the same drain.
    pub fn close(&self) -> Completion {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            release(&self.inner);
        }
        Completion {
            inner: self.inner.clone(),
        }
    }
}

fn release(inner: &Inner) {
    let previous = inner.count.fetch_sub(1, Ordering::SeqCst);
    if previous == 1 {
        inner.zero.notify_waiters();
    }
}

/// A held reference to a [`ReferenceCounter`]. Dropping it releases the reference.
pub struct ReferenceGuard {
    inner: Arc<Inner>,
}

impl Drop for ReferenceGuard {
    fn drop(&mut self) {
        release(&self.inner);
    }
}

/// The completion handle returned by [`ReferenceCounter::close`]. Resolves once the count drains
/// to zero; cheap to clone and await from multiple callers.
#[derive(Clone)]
pub struct Completion {
    inner: Arc<Inner>,
}

impl Completion {
    pub async fn wait(&self) {
        loop {
            if self.inner.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            let notified = self.inner.zero.notified();
            // Re-check after registering interest to avoid missing a notification that fired
            // between the load above and `notified()` subscribing.
            if self.inner.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn close_with_no_outstanding_work_completes_immediately() {
        let counter = ReferenceCounter::new();
        counter.close().wait().await;
    }

    #[tokio::test]
    async fn close_waits_for_outstanding_holds() {
        let counter = ReferenceCounter::new();
        let guard = counter.hold();
        let completion = counter.close();

        let finished = tokio::time::timeout(Duration::from_millis(50), completion.wait()).await;
        assert!(finished.is_err(), "completion resolved before the hold was released");

        drop(guard);
        tokio::time::timeout(Duration::from_millis(50), completion.wait())
            .await
            .expect("completion should resolve once the hold is released");
    }

    #[tokio::test]
    async fn repeated_close_returns_an_equivalent_handle() {
        let counter = ReferenceCounter::new();
        let guard = counter.hold();
        let first = counter.close();
        let second = counter.close();
        assert_eq!(counter.outstanding(), 1);

        drop(guard);
        first.wait().await;
        second.wait().await;
    }

    #[tokio::test]
    async fn hold_until_completion_releases_after_future_resolves() {
        let counter = ReferenceCounter::new();
        counter.hold_until_completion(async {}).await;
        assert!(!counter.is_closed());
        assert_eq!(counter.outstanding(), 1);
    }
}
