//! Shutdown coordination.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::lifecycle::signals::ShutdownSignal;

/// Single-slot shutdown channel.
///
/// Every signal source (OS signals, listener failure, callers) holds a clone.
/// Only the first [`trigger`](ShutdownHandle::trigger) is delivered; the
/// slot is then empty and later signals are discarded.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    slot: Arc<Mutex<Option<oneshot::Sender<ShutdownSignal>>>>,
}

impl ShutdownHandle {
    /// Create the handle and the receiving end owned by the coordinator.
    pub(crate) fn channel() -> (Self, oneshot::Receiver<ShutdownSignal>) {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (handle, rx)
    }

    /// Deliver `signal`. Returns `false` if a signal was already delivered.
    pub fn trigger(&self, signal: ShutdownSignal) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            Some(tx) => tx.send(signal).is_ok(),
            None => {
                tracing::debug!(signal = %signal, "Shutdown already in progress, signal discarded");
                false
            }
        }
    }

    /// Whether a signal has already been delivered.
    pub fn is_triggered(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
