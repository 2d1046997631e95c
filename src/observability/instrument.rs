//! Latency instrumentation for data-access and outbound calls.
//!
//! Wraps a callable so that every successful invocation is timed and the
//! elapsed seconds are handed to a [`MetricSink`]. The wrapped callable keeps
//! its exact input and output: values and errors pass through untouched, and
//! nothing is ever retried.
//!
//! Two call shapes are wrapped the same way:
//! - populate: run a query and return the populated destination
//! - cursor: open a row stream; only the opening is timed, not the draining
//!
//! ```ignore
//! let list_users = query_with_metrics(sink, "list_users", |limit: i64| {
//!     let pool = pool.clone();
//!     async move { sqlx::query_as::<_, User>(SQL).bind(limit).fetch_all(&pool).await }
//! });
//! let users = list_users.call(50).await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;

use crate::observability::metrics::{Labels, MetricSink};

/// Label key used for data-access observations.
pub const QUERY_LABEL: &str = "query";

/// Label key used for outbound HTTP observations.
pub const CODE_LABEL: &str = "code";

/// Times futures and records their latency under a fixed label set.
#[derive(Clone)]
pub struct LatencyProbe {
    sink: Option<Arc<dyn MetricSink>>,
    labels: Vec<(&'static str, String)>,
    record_failures: bool,
}

impl LatencyProbe {
    /// Probe recording under `{"query": label}`.
    pub fn query(sink: Arc<dyn MetricSink>, label: impl Into<String>) -> Self {
        Self {
            sink: Some(sink),
            labels: vec![(QUERY_LABEL, label.into())],
            record_failures: false,
        }
    }

    /// Probe that records nothing.
    pub fn disabled() -> Self {
        Self {
            sink: None,
            labels: Vec::new(),
            record_failures: false,
        }
    }

    /// Also report failed calls through [`MetricSink::record_failure`].
    /// Failed calls never contribute to the latency series.
    pub fn record_failures(mut self, enabled: bool) -> Self {
        self.record_failures = enabled;
        self
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Await `call`, recording its latency if it resolved to `Ok`.
    pub async fn observe<Fut, T, E>(&self, call: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let result = call.await;

        if let Some(sink) = &self.sink {
            match &result {
                Ok(_) => sink.record(&self.labels, start.elapsed().as_secs_f64()),
                Err(_) if self.record_failures => sink.record_failure(&self.labels),
                Err(_) => {}
            }
        }

        result
    }
}

impl std::fmt::Debug for LatencyProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyProbe")
            .field("enabled", &self.sink.is_some())
            .field("labels", &self.labels)
            .field("record_failures", &self.record_failures)
            .finish()
    }
}

/// Await `call` and, on success, record its latency under labels derived
/// from the returned value.
pub async fn observe_with<Fut, T, E, L>(sink: Option<&dyn MetricSink>, labels: L, call: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    L: FnOnce(&T) -> Vec<(&'static str, String)>,
{
    let start = Instant::now();
    let result = call.await;

    if let (Some(sink), Ok(value)) = (sink, &result) {
        let elapsed = start.elapsed().as_secs_f64();
        sink.record(&labels(value), elapsed);
    }

    result
}

/// A callable wrapped with a [`LatencyProbe`].
#[derive(Clone)]
pub struct Instrumented<F> {
    function: F,
    probe: LatencyProbe,
}

impl<F> Instrumented<F> {
    /// Wrap `function` without recording anything.
    pub fn passthrough(function: F) -> Self {
        Self {
            function,
            probe: LatencyProbe::disabled(),
        }
    }

    pub fn record_failures(mut self, enabled: bool) -> Self {
        self.probe = self.probe.record_failures(enabled);
        self
    }

    pub fn probe(&self) -> &LatencyProbe {
        &self.probe
    }

    /// Invoke the wrapped callable.
    pub async fn call<A, Fut, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.probe.observe((self.function)(args)).await
    }
}

/// Wrap a query that populates and returns its destination.
pub fn query_with_metrics<F>(sink: Arc<dyn MetricSink>, label: impl Into<String>, function: F) -> Instrumented<F> {
    Instrumented {
        function,
        probe: LatencyProbe::query(sink, label),
    }
}

/// Wrap a call that opens a row cursor. Latency covers opening the cursor.
pub fn cursor_with_metrics<F>(sink: Arc<dyn MetricSink>, label: impl Into<String>, function: F) -> Instrumented<F> {
    Instrumented {
        function,
        probe: LatencyProbe::query(sink, label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::observability::metrics::LatencySample;

    #[derive(Default)]
    struct Capture {
        samples: Mutex<Vec<LatencySample>>,
        failures: Mutex<Vec<Vec<(&'static str, String)>>>,
    }

    impl MetricSink for Capture {
        fn record(&self, labels: &Labels, seconds: f64) {
            self.samples.lock().unwrap().push(LatencySample {
                labels: labels.to_vec(),
                seconds,
            });
        }

        fn record_failure(&self, labels: &Labels) {
            self.failures.lock().unwrap().push(labels.to_vec());
        }
    }

    #[derive(Debug, PartialEq)]
    struct QueryError(&'static str);

    #[tokio::test(start_paused = true)]
    async fn records_success_latency_under_label() {
        let capture = Arc::new(Capture::default());
        let find = query_with_metrics(capture.clone(), "find_user", |id: u32| async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Ok::<_, QueryError>(format!("user-{}", id))
        });

        let user = find.call(7).await;

        assert_eq!(user, Ok("user-7".to_string()));
        let samples = capture.samples.lock().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].label(QUERY_LABEL), Some("find_user"));
        assert!(samples[0].seconds >= 0.040);
    }

    #[tokio::test]
    async fn failure_passes_through_without_sample() {
        let capture = Arc::new(Capture::default());
        let find = query_with_metrics(capture.clone(), "find_user", |_: u32| async {
            Err::<String, _>(QueryError("no rows"))
        });

        assert_eq!(find.call(1).await, Err(QueryError("no rows")));
        assert!(capture.samples.lock().unwrap().is_empty());
        assert!(capture.failures.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_counter_is_opt_in() {
        let capture = Arc::new(Capture::default());
        let find = query_with_metrics(capture.clone(), "find_user", |_: u32| async {
            Err::<String, _>(QueryError("timeout"))
        })
        .record_failures(true);

        assert_eq!(find.call(1).await, Err(QueryError("timeout")));
        assert!(capture.samples.lock().unwrap().is_empty());
        let failures = capture.failures.lock().unwrap();
        assert_eq!(failures.as_slice(), &[vec![(QUERY_LABEL, "find_user".to_string())]]);
    }

    #[tokio::test]
    async fn cursor_is_returned_unchanged() {
        let capture = Arc::new(Capture::default());
        let open = cursor_with_metrics(capture.clone(), "scan_events", |batch: usize| async move {
            Ok::<_, QueryError>((0..batch).collect::<Vec<_>>().into_iter())
        });

        let rows: Vec<_> = open.call(3).await.unwrap().collect();

        assert_eq!(rows, vec![0, 1, 2]);
        assert_eq!(capture.samples.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn passthrough_records_nothing() {
        let wrapped = Instrumented::passthrough(|x: i32| async move { Ok::<_, QueryError>(x * 2) });
        assert_eq!(wrapped.call(21).await, Ok(42));
        assert!(wrapped.probe().labels().is_empty());
    }

    #[tokio::test]
    async fn observe_with_derives_labels_from_result() {
        let capture = Capture::default();

        let status = observe_with(
            Some(&capture as &dyn MetricSink),
            |code: &u16| vec![(CODE_LABEL, code.to_string())],
            async { Ok::<_, QueryError>(503u16) },
        )
        .await;

        assert_eq!(status, Ok(503));
        let samples = capture.samples.lock().unwrap();
        assert_eq!(samples[0].label(CODE_LABEL), Some("503"));
    }
}
