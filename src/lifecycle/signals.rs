//! OS signal handling.
//!
//! Translates SIGINT and SIGTERM into [`ShutdownSignal`] values. On
//! non-unix targets only ctrl-c is observed.

use std::fmt;

/// Reason the drain sequence was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT / ctrl-c.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// The listener stopped serving on its own.
    ListenerFailure,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownSignal::Interrupt => "interrupt",
            ShutdownSignal::Terminate => "terminate",
            ShutdownSignal::ListenerFailure => "listener failure",
        };
        f.write_str(name)
    }
}

/// Wait for the first interrupt or terminate signal.
#[cfg(unix)]
pub async fn os_signal() -> std::io::Result<ShutdownSignal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    let received = tokio::select! {
        _ = interrupt.recv() => ShutdownSignal::Interrupt,
        _ = terminate.recv() => ShutdownSignal::Terminate,
    };
    Ok(received)
}

/// Wait for ctrl-c.
#[cfg(not(unix))]
pub async fn os_signal() -> std::io::Result<ShutdownSignal> {
    tokio::signal::ctrl_c().await?;
    Ok(ShutdownSignal::Interrupt)
}
