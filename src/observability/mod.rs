//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Subsystems produce:
//!     → logging.rs (structured log events)
//!     → reporting.rs (errors to Sentry, when configured)
//!     → instrument.rs (timed calls)
//!         → metrics.rs (MetricSink → Prometheus summaries)
//!
//! Consumers:
//!     → stdout (text or JSON)
//!     → GET /metrics (Prometheus scrape)
//!     → Sentry
//! ```
//!
//! # Design Decisions
//! - The metrics registry is constructed explicitly and injected
//! - Only successful calls contribute latency samples

pub mod instrument;
pub mod logging;
pub mod metrics;
pub mod reporting;

pub use instrument::{cursor_with_metrics, observe_with, query_with_metrics, Instrumented, LatencyProbe};
pub use metrics::{LatencySample, MetricSink, Metrics, PrometheusSink};
