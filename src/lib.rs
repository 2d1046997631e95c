//! Network service bootstrap.
//!
//! Starts an HTTP listener, waits for a stop signal and drains outstanding
//! work within a deadline. Data-access and outbound calls can be wrapped to
//! record their latency into an explicitly constructed metrics registry.

pub mod client;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;
pub mod storage;

pub use config::schema::ServiceConfig;
pub use http::AppState;
pub use lifecycle::{LifecycleError, ServerProcess, ShutdownHandle, ShutdownSignal, TaskRegistry};
pub use observability::{cursor_with_metrics, query_with_metrics, MetricSink, Metrics};
