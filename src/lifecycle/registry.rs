//! Background task registry.
//!
//! Counts outstanding units of work that must finish before the process
//! exits. Request handlers register work with [`TaskRegistry::add`] (or the
//! [`TaskRegistry::track`] guard, or [`TaskRegistry::spawn`]) and the
//! lifecycle controller waits for the count to reach zero while draining.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct Inner {
    count: AtomicUsize,
    zero: Notify,
}

/// Concurrency-safe counter with wait-for-zero semantics.
///
/// Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<Inner>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one unit of work. Call before the work starts.
    pub fn add(&self) {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Mark one unit of work as finished.
    ///
    /// An unmatched call is a caller bug; the count stays at zero.
    pub fn done(&self) {
        let previous = self
            .inner
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));

        match previous {
            Ok(1) => self.inner.zero.notify_waiters(),
            Ok(_) => {}
            Err(_) => tracing::warn!("TaskRegistry::done called without a matching add"),
        }
    }

    /// Current number of outstanding units.
    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Resolve once the count is zero.
    pub async fn wait_for_zero(&self) {
        loop {
            let notified = self.inner.zero.notified();
            tokio::pin!(notified);
            // Register interest before reading the count so a concurrent
            // `done` between the check and the await is not missed.
            notified.as_mut().enable();

            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Register one unit of work released when the guard drops.
    pub fn track(&self) -> TaskGuard {
        self.add();
        TaskGuard {
            registry: self.clone(),
        }
    }

    /// Spawn `future` on the runtime, registered for its whole lifetime.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = self.track();
        tokio::spawn(async move {
            let _guard = guard;
            future.await
        })
    }
}

/// Guard that keeps one unit registered.
/// Calls [`TaskRegistry::done`] when dropped, including on panic unwind.
#[derive(Debug)]
pub struct TaskGuard {
    registry: TaskRegistry,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.registry.done();
    }
}
