//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define the sink interface the instrumentation layer records into
//! - Own an explicitly constructed Prometheus recorder (no global install)
//! - Render the exposition text for the `/metrics` route
//!
//! # Metrics
//! - `db_access_latency` (summary): data-access latency by `query`
//! - `db_access_latency_failures_total` (counter): failed data-access calls by `query`
//! - outbound client latency (summary): by response `code`, name chosen by caller
//!
//! # Design Decisions
//! - Latency is exported as a summary with 0.5/0.95/0.99 quantiles
//! - Quantiles are computed over a rolling window (default one hour)

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use metrics::Label;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Metric name for data-access latency.
pub const DB_ACCESS_LATENCY: &str = "db_access_latency";

/// Metric name for outbound HTTP call latency.
pub const HTTP_CLIENT_LATENCY: &str = "http_client_latency";

const QUANTILES: &[f64] = &[0.5, 0.95, 0.99];

/// How often buffered observations are folded into the summaries.
pub const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Number of buckets the rolling summary window is split into.
const WINDOW_BUCKETS: u32 = 6;

/// Label set attached to one observation, e.g. `[("query", "list_users")]`.
pub type Labels = [(&'static str, String)];

/// One latency observation.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySample {
    pub labels: Vec<(&'static str, String)>,
    pub seconds: f64,
}

impl LatencySample {
    /// Value of the label with the given key.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Destination for latency observations.
pub trait MetricSink: Send + Sync {
    /// Record a successful call that took `seconds`.
    fn record(&self, labels: &Labels, seconds: f64);

    /// Record a failed call. Sinks that do not track failures ignore it.
    fn record_failure(&self, _labels: &Labels) {}
}

impl<S: MetricSink + ?Sized> MetricSink for Arc<S> {
    fn record(&self, labels: &Labels, seconds: f64) {
        (**self).record(labels, seconds)
    }

    fn record_failure(&self, labels: &Labels) {
        (**self).record_failure(labels)
    }
}

/// Process-wide metrics registry, constructed once at startup and injected.
#[derive(Clone)]
pub struct Metrics {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
}

impl Metrics {
    /// Build a registry whose summaries cover the last `max_age`.
    pub fn new(max_age: Duration) -> Result<Self, BuildError> {
        let bucket_duration = (max_age / WINDOW_BUCKETS).max(Duration::from_secs(1));
        let recorder = PrometheusBuilder::new()
            .set_quantiles(QUANTILES)?
            .set_bucket_duration(bucket_duration)?
            .set_bucket_count(NonZeroU32::new(WINDOW_BUCKETS).unwrap_or(NonZeroU32::MIN))
            .build_recorder();
        let handle = recorder.handle();

        Ok(Self {
            recorder: Arc::new(recorder),
            handle,
        })
    }

    /// A sink recording into the metric `name`.
    pub fn sink(&self, name: &'static str) -> PrometheusSink {
        PrometheusSink {
            recorder: Arc::clone(&self.recorder),
            name,
            failures: format!("{}_failures_total", name),
        }
    }

    /// Render the Prometheus exposition text.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Fold buffered observations into the summaries and expire old buckets.
    /// Rendering does the same; without a scraper this must run periodically.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }

    /// Run [`run_upkeep`](Self::run_upkeep) every `period` until the task is aborted.
    pub fn spawn_upkeep(&self, period: Duration) -> JoinHandle<()> {
        let handle = self.handle.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                handle.run_upkeep();
            }
        })
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

/// [`MetricSink`] backed by the registry's Prometheus recorder.
#[derive(Clone)]
pub struct PrometheusSink {
    recorder: Arc<PrometheusRecorder>,
    name: &'static str,
    failures: String,
}

fn to_labels(labels: &Labels) -> Vec<Label> {
    labels
        .iter()
        .map(|(k, v)| Label::new(*k, v.clone()))
        .collect()
}

impl MetricSink for PrometheusSink {
    fn record(&self, labels: &Labels, seconds: f64) {
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::histogram!(self.name, to_labels(labels)).record(seconds);
        });
    }

    fn record_failure(&self, labels: &Labels) {
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::counter!(self.failures.clone(), to_labels(labels)).increment(1);
        });
    }
}
