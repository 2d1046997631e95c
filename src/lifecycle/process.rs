//! Server process lifecycle controller.
//!
//! # State Transitions
//! ```text
//! Starting → Listening: listener bound, accept loop spawned
//! Listening → Draining: first ShutdownSignal (OS, listener failure, handle)
//! Draining → Stopped:   listener drained AND registry at zero before deadline
//! Draining → Failed:    deadline elapsed first
//! ```

use std::io;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};

use crate::lifecycle::registry::TaskRegistry;
use crate::lifecycle::shutdown::ShutdownHandle;
use crate::lifecycle::signals::{self, ShutdownSignal};
use crate::net;

/// Default upper bound on the graceful drain.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle state of a [`ServerProcess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Listening,
    Draining,
    Stopped,
    Failed,
}

/// Errors returned by [`ServerProcess::run`].
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The listener could not be bound.
    #[error("can't start listener: {0}")]
    Startup(#[source] io::Error),

    /// The listener stopped serving before a stop signal arrived.
    #[error("listener failed: {0}")]
    Listener(#[source] io::Error),

    /// Drain did not complete before the deadline.
    #[error("graceful shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),
}

/// Owns the listener, the shutdown channel and the drain sequence.
pub struct ServerProcess {
    router: Router,
    registry: TaskRegistry,
    shutdown_timeout: Duration,
    handle: ShutdownHandle,
    signal_rx: oneshot::Receiver<ShutdownSignal>,
    state: watch::Sender<LifecycleState>,
    os_signals: bool,
}

impl ServerProcess {
    /// Create a process serving `router` with the default drain deadline.
    pub fn new(router: Router) -> Self {
        let (handle, signal_rx) = ShutdownHandle::channel();
        let (state, _) = watch::channel(LifecycleState::Starting);

        Self {
            router,
            registry: TaskRegistry::new(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            handle,
            signal_rx,
            state,
            os_signals: true,
        }
    }

    /// Set the drain deadline.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Use an existing registry (e.g. one already shared with handlers).
    pub fn with_registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Do not subscribe to SIGINT/SIGTERM; only the handle and listener
    /// failures can start the drain.
    pub fn without_os_signals(mut self) -> Self {
        self.os_signals = false;
        self
    }

    pub fn registry(&self) -> TaskRegistry {
        self.registry.clone()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.handle.clone()
    }

    /// Subscribe to lifecycle state changes.
    pub fn state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Bind `address` (`host:port` or `:port`) and serve until stopped.
    pub async fn run(self, address: &str) -> Result<(), LifecycleError> {
        let listener = match net::bind(address).await {
            Ok(listener) => listener,
            Err(e) => {
                self.state.send_replace(LifecycleState::Failed);
                return Err(LifecycleError::Startup(e));
            }
        };
        self.serve(listener).await
    }

    /// Serve on an already bound listener until stopped.
    pub async fn serve(self, listener: TcpListener) -> Result<(), LifecycleError> {
        let ServerProcess {
            router,
            registry,
            shutdown_timeout,
            handle,
            signal_rx,
            state,
            os_signals,
        } = self;

        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                state.send_replace(LifecycleState::Failed);
                return Err(LifecycleError::Startup(e));
            }
        };

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn({
            let handle = handle.clone();
            async move {
                let result = axum::serve(listener, router.into_make_service())
                    .with_graceful_shutdown(async move {
                        let _ = stop_rx.await;
                    })
                    .await;
                // Discarded if the drain was already started by another signal.
                handle.trigger(ShutdownSignal::ListenerFailure);
                result
            }
        });
        let server_abort = server.abort_handle();

        let os_watcher = os_signals.then(|| {
            let handle = handle.clone();
            tokio::spawn(async move {
                match signals::os_signal().await {
                    Ok(signal) => {
                        handle.trigger(signal);
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to install signal handlers"),
                }
            })
        });

        state.send_replace(LifecycleState::Listening);
        tracing::info!(address = %local_addr, "Listening for connections");

        let signal = signal_rx.await.unwrap_or(ShutdownSignal::ListenerFailure);
        state.send_replace(LifecycleState::Draining);
        tracing::info!(
            signal = %signal,
            timeout = ?shutdown_timeout,
            pending_tasks = registry.count(),
            "Received stop signal, draining"
        );

        // Stop accepting before waiting on background work.
        let _ = stop_tx.send(());

        let drain = async {
            let (served, ()) = tokio::join!(server, registry.wait_for_zero());
            served
        };

        let outcome = tokio::select! {
            biased;
            _ = tokio::time::sleep(shutdown_timeout) => {
                server_abort.abort();
                Err(LifecycleError::ShutdownTimeout(shutdown_timeout))
            }
            served = drain => match (signal, served) {
                (_, Err(e)) => Err(LifecycleError::Listener(io::Error::other(e))),
                (ShutdownSignal::ListenerFailure, Ok(Err(e))) => Err(LifecycleError::Listener(e)),
                (ShutdownSignal::ListenerFailure, Ok(Ok(()))) => Err(LifecycleError::Listener(
                    io::Error::other("listener stopped unexpectedly"),
                )),
                (_, Ok(Err(e))) => {
                    tracing::warn!(error = %e, "Listener error while draining");
                    Ok(())
                }
                (_, Ok(Ok(()))) => Ok(()),
            },
        };

        if let Some(watcher) = os_watcher {
            watcher.abort();
        }

        match &outcome {
            Ok(()) => {
                state.send_replace(LifecycleState::Stopped);
                tracing::info!("Drain completed");
            }
            Err(LifecycleError::ShutdownTimeout(_)) => {
                state.send_replace(LifecycleState::Failed);
                tracing::error!(
                    pending_tasks = registry.count(),
                    "Drain deadline elapsed, abandoning remaining work"
                );
            }
            Err(e) => {
                state.send_replace(LifecycleState::Failed);
                tracing::error!(error = %e, "Listener failed");
            }
        }

        outcome
    }
}
