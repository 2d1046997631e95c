//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Metrics, Storage, Auth, Client → Router → ServerProcess
//!
//! Run (process.rs):
//!     Bind → Listening → first ShutdownSignal → Draining
//!     → stop accepting, then wait for in-flight requests AND registry zero
//!     → Stopped, or Failed when the deadline wins
//!
//! Signals (signals.rs, shutdown.rs):
//!     SIGINT/SIGTERM/listener failure → single-slot ShutdownHandle
//! ```
//!
//! # Design Decisions
//! - Only the first signal starts the drain; later ones are discarded
//! - Shutdown has a deadline; it takes priority over late completion
//! - Background work must register with the TaskRegistry to be waited on

pub mod process;
pub mod registry;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use process::{LifecycleError, LifecycleState, ServerProcess, DEFAULT_SHUTDOWN_TIMEOUT};
pub use registry::{TaskGuard, TaskRegistry};
pub use shutdown::ShutdownHandle;
pub use signals::ShutdownSignal;
pub use startup::{build, Application, StartupError};
